//! Subcommand handlers.

pub mod config;
pub mod credentials;
pub mod install;
pub mod service;
pub mod uninstall;
pub mod update;
pub mod version;

use anyhow::Context as _;
use std::path::PathBuf;
use std::sync::Arc;
use wte_common::Error;
use wte_config::{Paths, ServiceConfig};
use wte_provision::Provisioner;
use wte_system::{is_root, HttpFetcher, LocalRunner};

/// Everything a command needs: the loaded configuration and a provisioner
/// wired to the real host.
pub struct Context {
    pub config_path: PathBuf,
    pub cfg: ServiceConfig,
    pub provisioner: Provisioner,
}

impl Context {
    /// Wire `cfg`, loaded from `config_path`, to the local host.
    pub fn new(config_path: PathBuf, cfg: ServiceConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
        let provisioner = Provisioner::new(
            Paths::system().with_tool_config(&config_path),
            Arc::new(LocalRunner::new()),
            Arc::new(fetcher),
        );

        Ok(Self {
            config_path,
            cfg,
            provisioner,
        })
    }
}

/// Fail unless running with effective root privileges.
pub fn require_root() -> anyhow::Result<()> {
    if !is_root() {
        return Err(Error::NotRoot.into());
    }
    Ok(())
}
