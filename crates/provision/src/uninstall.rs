//! The uninstall pipeline.

use crate::install::Steps;
use crate::Provisioner;
use std::fmt;
use tracing::{info, warn};
use wte_common::fs::{remove_dir_if_empty, remove_if_exists};
use wte_common::Result;
use wte_config::ServiceConfig;
use wte_gost::{ConfigRenderer, CredentialsReport};
use wte_security::remove_certificates;
use wte_system::ServiceController;

const UNINSTALL_STEPS: usize = 8;

/// What happened to one removal target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    NotFound,
    Skipped,
    Failed(String),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Done => f.write_str("done"),
            StepOutcome::NotFound => f.write_str("not found"),
            StepOutcome::Skipped => f.write_str("skipped"),
            StepOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

impl From<Result<bool>> for StepOutcome {
    fn from(result: Result<bool>) -> Self {
        match result {
            Ok(true) => StepOutcome::Done,
            Ok(false) => StepOutcome::NotFound,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallStep {
    pub name: &'static str,
    pub outcome: StepOutcome,
}

/// Per-step results of an uninstall.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub steps: Vec<UninstallStep>,
}

impl UninstallReport {
    fn record(&mut self, name: &'static str, outcome: StepOutcome) {
        match &outcome {
            StepOutcome::Done => info!("{}: done", name),
            StepOutcome::NotFound => info!("{}: not found", name),
            StepOutcome::Skipped => info!("{}: skipped", name),
            StepOutcome::Failed(reason) => warn!("{}: {}", name, reason),
        }
        self.steps.push(UninstallStep { name, outcome });
    }

    pub fn failures(&self) -> impl Iterator<Item = &UninstallStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    pub fn outcome(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == name).map(|s| &s.outcome)
    }
}

impl Provisioner {
    /// Remove everything an install created.
    ///
    /// Missing targets count as success. Failures are recorded per step and
    /// never stop the remaining steps.
    pub async fn uninstall(&self, cfg: &ServiceConfig, keep_credentials: bool) -> UninstallReport {
        let mut steps = Steps::new(UNINSTALL_STEPS);
        let mut report = UninstallReport::default();
        let service = self.service();

        let status = if service.is_installed() {
            service.status().await.ok()
        } else {
            None
        };

        steps.begin("Stopping service");
        let outcome: StepOutcome = match &status {
            Some(s) if s.is_active => service.stop().await.map(|_| true).into(),
            _ => StepOutcome::NotFound,
        };
        report.record("stop service", outcome);

        steps.begin("Disabling service");
        let outcome: StepOutcome = match &status {
            Some(s) if s.is_enabled => service.disable().await.map(|_| true).into(),
            _ => StepOutcome::NotFound,
        };
        report.record("disable service", outcome);

        steps.begin("Removing systemd service");
        report.record("remove unit", service.remove_unit().await.into());

        steps.begin("Removing GOST binary");
        report.record("remove binary", self.installer(cfg).uninstall().into());

        steps.begin("Removing GOST configuration");
        report.record("remove daemon config", ConfigRenderer::new(cfg).remove().into());

        steps.begin("Removing TLS certificates");
        report.record(
            "remove certificates",
            remove_certificates(&cfg.https.cert_path, &cfg.https.key_path).into(),
        );
        if let Ok(true) = remove_dir_if_empty(&cfg.daemon.config_dir) {
            info!("Removed {}", cfg.daemon.config_dir.display());
        }

        steps.begin("Removing credentials file");
        let outcome: StepOutcome = if keep_credentials {
            StepOutcome::Skipped
        } else {
            CredentialsReport::remove(&self.paths.credentials_file).into()
        };
        report.record("remove credentials", outcome);

        steps.begin("Removing tool configuration");
        report.record(
            "remove tool config",
            remove_if_exists(&self.paths.tool_config).into(),
        );

        report
    }
}
