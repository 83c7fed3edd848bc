//! The installation pipeline.

use crate::options::InstallOptions;
use crate::Provisioner;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use wte_common::Result;
use wte_config::defaults::PASSWORD_LENGTH;
use wte_config::ServiceConfig;
use wte_gost::{ConfigRenderer, CredentialsReport};
use wte_security::{generate_password, issue_certificate, CertificateOptions};
use wte_system::firewall::{open_required_ports, FirewallReport};
use wte_system::network::is_placeholder;
use wte_system::{PlatformInfo, ServiceController, ServiceStatus};

const INSTALL_STEPS: usize = 9;

/// Step counter for progress lines.
pub(crate) struct Steps {
    total: usize,
    current: usize,
    succeeded: usize,
}

impl Steps {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            current: 0,
            succeeded: 0,
        }
    }

    pub(crate) fn begin(&mut self, title: &str) {
        self.current += 1;
        info!("[{}/{}] {}", self.current, self.total, title);
    }

    pub(crate) fn succeed(&mut self) {
        self.succeeded += 1;
    }
}

/// Everything a completed installation produced.
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Final configuration, including generated passwords.
    pub config: ServiceConfig,
    pub platform: PlatformInfo,
    pub public_ip: String,
    pub installed_version: String,
    pub previous_install: bool,
    pub config_backup: Option<PathBuf>,
    pub service: Option<ServiceStatus>,
    pub firewall: Option<FirewallReport>,
    pub credentials_file: Option<PathBuf>,
    pub warnings: Vec<String>,
    pub steps_total: usize,
    pub steps_succeeded: usize,
    pub elapsed: Duration,
}

impl InstallReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl Provisioner {
    /// Install and start the proxy.
    ///
    /// `base` supplies everything the options leave unset. Any step failing
    /// aborts the sequence, except firewall setup and saving the credentials
    /// report, which only add warnings.
    pub async fn install(&self, base: ServiceConfig, opts: &InstallOptions) -> Result<InstallReport> {
        let started = Instant::now();
        let mut steps = Steps::new(INSTALL_STEPS);
        let mut warnings = Vec::new();

        steps.begin("Detecting operating system");
        let platform = self.detect_platform()?;
        info!(
            "Detected {} {} on {} ({})",
            platform.os_id, platform.os_version, platform.raw_arch, platform.artifact_arch
        );
        if !platform.is_officially_supported {
            warnings.push(format!("OS '{}' is not officially tested", platform.os_id));
        }
        steps.succeed();

        steps.begin("Detecting public IP address");
        let public_ip = self.public_ip().await;
        if is_placeholder(&public_ip) {
            warn!("Could not detect the public IP address");
            warnings.push(format!(
                "Public IP unknown, replace {} in the credentials report",
                public_ip
            ));
        } else {
            info!("Public IP detected: {}", public_ip);
            steps.succeed();
        }

        steps.begin("Preparing configuration");
        let mut cfg = base;
        opts.apply_to(&mut cfg);
        let generated = cfg.fill_missing_passwords(|| generate_password(PASSWORD_LENGTH));
        for key in &generated {
            info!("Generated {}", key);
        }
        // Reject conflicting ports before anything is downloaded.
        wte_config::validate(&cfg)?;
        steps.succeed();

        steps.begin("Checking existing installation");
        let installer = self.installer(&cfg);
        let service = self.service();
        let previous_install = installer.is_installed();
        let mut config_backup = None;
        if previous_install {
            warn!("Existing GOST installation detected");
            if service.is_installed() && service.status().await.map(|s| s.is_active).unwrap_or(false) {
                if let Err(e) = service.stop().await {
                    warnings.push(format!("Could not stop the running service: {}", e));
                } else {
                    info!("Stopped existing service");
                }
            }
            match ConfigRenderer::new(&cfg).backup() {
                Ok(Some(path)) => {
                    info!("Configuration backed up: {}", path.display());
                    config_backup = Some(path);
                }
                Ok(None) => {}
                Err(e) => warnings.push(format!("Could not back up the configuration: {}", e)),
            }
        } else {
            info!("No existing installation found");
        }
        steps.succeed();

        steps.begin("Installing GOST");
        let installed_version = installer
            .install(&cfg.daemon.version, platform.artifact_arch, &opts.verification())
            .await?;
        info!("Installed {}", installed_version);
        steps.succeed();

        steps.begin("Generating TLS certificates");
        if cfg.https.enabled {
            let cert = CertificateOptions::for_server(
                &public_ip,
                &cfg.https.cert_path,
                &cfg.https.key_path,
            );
            issue_certificate(&cert)?;
            info!("TLS certificate generated: {}", cfg.https.cert_path.display());
        } else {
            info!("HTTPS disabled, skipping certificate generation");
        }
        steps.succeed();

        steps.begin("Generating GOST configuration");
        ConfigRenderer::new(&cfg).generate()?;
        wte_config::save(&cfg, &self.paths.tool_config)?;
        info!("Tool configuration saved: {}", self.paths.tool_config.display());
        steps.succeed();

        steps.begin("Creating systemd service");
        service.create_unit(&cfg).await?;
        service.daemon_reload().await?;
        service.enable().await?;
        service.start().await?;
        let status = match service.status().await {
            Ok(status) => Some(status),
            Err(e) => {
                warnings.push(format!("Could not query service status: {}", e));
                None
            }
        };
        info!("Service started");
        steps.succeed();

        steps.begin("Configuring firewall");
        let firewall = if cfg.firewall.auto_configure {
            let controller = self.firewall().await;
            info!("Detected firewall: {}", controller.backend());
            let report = open_required_ports(controller.as_ref(), &cfg.required_ports()).await;
            if report.is_clean() {
                steps.succeed();
            }
            warnings.extend(report.warnings.iter().cloned());
            Some(report)
        } else {
            info!("Firewall configuration skipped");
            steps.succeed();
            None
        };

        let credentials_file = match CredentialsReport::new(&cfg, &public_ip)
            .save(&self.paths.credentials_file)
        {
            Ok(()) => {
                info!("Credentials saved to {}", self.paths.credentials_file.display());
                Some(self.paths.credentials_file.clone())
            }
            Err(e) => {
                warnings.push(format!("Could not save the credentials file: {}", e));
                None
            }
        };

        Ok(InstallReport {
            config: cfg,
            platform,
            public_ip,
            installed_version,
            previous_install,
            config_backup,
            service: status,
            firewall,
            credentials_file,
            warnings,
            steps_total: steps.total,
            steps_succeeded: steps.succeeded,
            elapsed: started.elapsed(),
        })
    }
}
