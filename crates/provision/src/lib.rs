//! Provisioning sequences for the GOST proxy.
//!
//! [`Provisioner`] ties the host adapters, the daemon tooling and the
//! configuration together into the linear install and uninstall pipelines
//! plus the smaller maintenance operations the CLI exposes.

pub mod install;
pub mod maintenance;
pub mod options;
pub mod uninstall;

pub use install::InstallReport;
pub use options::InstallOptions;
pub use uninstall::{StepOutcome, UninstallReport, UninstallStep};

use std::path::PathBuf;
use std::sync::Arc;
use wte_common::Result;
use wte_config::{Paths, ServiceConfig};
use wte_gost::installer::RELEASE_BASE_URL;
use wte_gost::ArtifactInstaller;
use wte_system::firewall::{self, FirewallController};
use wte_system::{
    ArtifactArch, CommandRunner, Fetcher, PlatformInfo, PublicIpResolver, SystemdController,
};
use wte_updater::Updater;

/// Runs provisioning operations against one host.
pub struct Provisioner {
    paths: Paths,
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
    machine: String,
    release_base_url: String,
}

impl Provisioner {
    pub fn new(paths: Paths, runner: Arc<dyn CommandRunner>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            paths,
            runner,
            fetcher,
            machine: std::env::consts::ARCH.to_string(),
            release_base_url: RELEASE_BASE_URL.to_string(),
        }
    }

    /// Override the machine architecture reported by the host.
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = machine.into();
        self
    }

    pub fn with_release_base_url(mut self, url: impl Into<String>) -> Self {
        self.release_base_url = url.into();
        self
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn detect_platform(&self) -> Result<PlatformInfo> {
        PlatformInfo::detect_with(
            &self.paths.os_release,
            &self.paths.legacy_release,
            &self.machine,
        )
    }

    pub async fn public_ip(&self) -> String {
        PublicIpResolver::new(self.fetcher.clone()).public_ip().await
    }

    pub fn service(&self) -> SystemdController {
        SystemdController::new(self.runner.clone(), &self.paths.unit_file)
    }

    pub fn installer(&self, cfg: &ServiceConfig) -> ArtifactInstaller {
        ArtifactInstaller::new(
            self.fetcher.clone(),
            self.runner.clone(),
            &cfg.daemon.binary_path,
        )
        .with_base_url(&self.release_base_url)
    }

    pub async fn firewall(&self) -> Box<dyn FirewallController> {
        firewall::detect(self.runner.clone(), &self.paths).await
    }

    /// Updater for the running build.
    pub fn updater(&self, current_version: &str) -> Result<Updater> {
        let arch = ArtifactArch::from_machine(&self.machine)?;
        Ok(Updater::new(current_version, arch, self.fetcher.clone()))
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.paths.credentials_file.clone()
    }
}
