//! Systemd supervision of the GOST daemon.

use crate::CommandRunner;
use async_trait::async_trait;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};
use wte_common::fs::{remove_if_exists, write_file_with_mode};
use wte_common::{Error, Result};
use wte_config::defaults::SERVICE_NAME;
use wte_config::ServiceConfig;

const UNIT_TEMPLATE: &str = r#"# ============================================================================
# GOST Proxy Server - Systemd Service Unit
# ============================================================================
# Managed by WTE
# Do not edit manually - changes may be overwritten
# ============================================================================

[Unit]
Description=GOST Proxy Server (WTE)
Documentation=https://gost.run/
After=network.target network-online.target
Wants=network-online.target

[Service]
Type=simple
ExecStart={{binary}} -C {{config_file}}
Restart=always
RestartSec=5
LimitNOFILE=65535

# Security Hardening
NoNewPrivileges=true
ProtectSystem=strict
ProtectHome=true
ReadWritePaths={{config_dir}}
PrivateTmp=true
PrivateDevices=true
ProtectKernelTunables=true
ProtectKernelModules=true
ProtectControlGroups=true

[Install]
WantedBy=multi-user.target
"#;

#[derive(Serialize)]
struct UnitContext {
    binary: String,
    config_file: String,
    config_dir: String,
}

/// Render the unit file for the configured daemon paths.
pub fn render_unit(cfg: &ServiceConfig) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    let context = UnitContext {
        binary: cfg.daemon.binary_path.display().to_string(),
        config_file: cfg.daemon.config_file.display().to_string(),
        config_dir: cfg.daemon.config_dir.display().to_string(),
    };

    handlebars
        .render_template(UNIT_TEMPLATE, &context)
        .map_err(|e| Error::Template(e.to_string()))
}

/// Point-in-time service state, always re-queried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub is_active: bool,
    pub is_enabled: bool,
    pub main_pid: Option<u32>,
    /// Resident memory, formatted as `<n>MB`.
    pub memory_usage: Option<String>,
    pub active_state: String,
    pub sub_state: String,
    pub load_state: String,
}

impl ServiceStatus {
    /// Fill state fields from `systemctl show` output.
    fn apply_properties(&mut self, output: &str) {
        for line in output.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "ActiveState" => self.active_state = value.to_string(),
                "SubState" => self.sub_state = value.to_string(),
                "LoadState" => self.load_state = value.to_string(),
                "MainPID" => self.main_pid = value.parse().ok().filter(|pid| *pid != 0),
                "MemoryCurrent" => {
                    self.memory_usage = value
                        .parse::<u64>()
                        .ok()
                        .map(|bytes| format!("{}MB", bytes / 1024 / 1024));
                }
                _ => {}
            }
        }
    }
}

/// Trait for the init system managing the daemon.
#[async_trait]
pub trait ServiceController: Send + Sync {
    fn name(&self) -> &str;

    /// Write the unit file for `cfg`.
    async fn create_unit(&self, cfg: &ServiceConfig) -> Result<()>;

    async fn daemon_reload(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn restart(&self) -> Result<()>;
    async fn enable(&self) -> Result<()>;
    async fn disable(&self) -> Result<()>;

    async fn status(&self) -> Result<ServiceStatus>;

    /// The last `lines` journal lines.
    async fn logs(&self, lines: usize) -> Result<String>;

    /// Stream the journal to the terminal until it ends or the user interrupts.
    async fn follow_logs(&self) -> Result<()>;

    fn is_installed(&self) -> bool;

    /// Stop, disable and delete the unit. Returns whether a unit existed.
    async fn remove_unit(&self) -> Result<bool>;
}

/// [`ServiceController`] driving `systemctl` and `journalctl`.
pub struct SystemdController {
    runner: Arc<dyn CommandRunner>,
    unit_name: String,
    unit_path: PathBuf,
}

impl SystemdController {
    pub fn new(runner: Arc<dyn CommandRunner>, unit_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            unit_name: SERVICE_NAME.to_string(),
            unit_path: unit_path.into(),
        }
    }

    async fn systemctl(&self, action: &str) -> Result<()> {
        self.runner
            .run_checked("systemctl", &[action, &self.unit_name])
            .await?;
        Ok(())
    }

    async fn check(&self, query: &str) -> bool {
        self.runner
            .run("systemctl", &[query, "--quiet", &self.unit_name])
            .await
            .map(|o| o.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ServiceController for SystemdController {
    fn name(&self) -> &str {
        &self.unit_name
    }

    async fn create_unit(&self, cfg: &ServiceConfig) -> Result<()> {
        let unit = render_unit(cfg)?;
        write_file_with_mode(&self.unit_path, unit.as_bytes(), 0o644)?;
        info!("Service unit created: {}", self.unit_path.display());
        Ok(())
    }

    async fn daemon_reload(&self) -> Result<()> {
        self.runner.run_checked("systemctl", &["daemon-reload"]).await?;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.systemctl("start").await
    }

    async fn stop(&self) -> Result<()> {
        self.systemctl("stop").await
    }

    async fn restart(&self) -> Result<()> {
        self.systemctl("restart").await
    }

    async fn enable(&self) -> Result<()> {
        self.systemctl("enable").await
    }

    async fn disable(&self) -> Result<()> {
        self.systemctl("disable").await
    }

    async fn status(&self) -> Result<ServiceStatus> {
        let mut status = ServiceStatus {
            name: self.unit_name.clone(),
            is_active: self.check("is-active").await,
            is_enabled: self.check("is-enabled").await,
            ..Default::default()
        };

        let output = self
            .runner
            .run(
                "systemctl",
                &[
                    "show",
                    &self.unit_name,
                    "--property=ActiveState,SubState,LoadState,MainPID,MemoryCurrent",
                ],
            )
            .await?;
        if output.success() {
            status.apply_properties(&output.stdout);
        }

        Ok(status)
    }

    async fn logs(&self, lines: usize) -> Result<String> {
        let lines = lines.to_string();
        let output = self
            .runner
            .run_checked("journalctl", &["-u", &self.unit_name, "-n", &lines, "--no-pager"])
            .await?;
        Ok(output.stdout)
    }

    async fn follow_logs(&self) -> Result<()> {
        let args = ["-u", self.unit_name.as_str(), "-f", "--no-pager"];
        let mut child = Command::new("journalctl")
            .args(args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::command("journalctl", &args, e.to_string()))?;

        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            status = child.wait() => {
                debug!("journalctl exited: {:?}", status?);
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, stopping journalctl");
                child.kill().await?;
            }
            _ = terminate.recv() => {
                debug!("Terminated, stopping journalctl");
                child.kill().await?;
            }
        }

        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.unit_path.exists()
    }

    async fn remove_unit(&self) -> Result<bool> {
        if !self.is_installed() {
            return Ok(false);
        }

        // The service may already be stopped or disabled.
        let _ = self.stop().await;
        let _ = self.disable().await;

        remove_if_exists(&self.unit_path)?;
        self.daemon_reload().await?;
        Ok(true)
    }
}
