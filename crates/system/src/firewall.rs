//! Host firewall backends.

use crate::CommandRunner;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wte_common::fs::write_file_with_mode;
use wte_common::Result;
use wte_config::{Paths, PortRequirement, Protocol};

/// Firewall tool managing the host, in detection precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallBackend {
    Ufw,
    Firewalld,
    Iptables,
    None,
}

impl fmt::Display for FirewallBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FirewallBackend::Ufw => "ufw",
            FirewallBackend::Firewalld => "firewalld",
            FirewallBackend::Iptables => "iptables",
            FirewallBackend::None => "none",
        };
        f.write_str(name)
    }
}

/// Result of making opened ports effective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Rules are live and survive a reboot.
    Applied,
    /// Rules are live but will be lost on reboot.
    SessionOnly,
}

/// Trait for one firewall backend.
#[async_trait]
pub trait FirewallController: Send + Sync {
    fn backend(&self) -> FirewallBackend;

    /// Allow inbound traffic on a port. Runs exactly one command.
    async fn open_port(&self, port: u16, protocol: Protocol) -> Result<()>;

    async fn close_port(&self, port: u16, protocol: Protocol) -> Result<()>;

    /// Make previously opened ports effective and persistent.
    async fn apply(&self) -> Result<ApplyOutcome>;

    /// Human-readable rule listing.
    async fn status(&self) -> Result<String>;
}

fn port_spec(port: u16, protocol: Protocol) -> String {
    format!("{}/{}", port, protocol)
}

/// Simple allow-list firewall (Ubuntu/Debian). Rules are live immediately.
pub struct Ufw {
    runner: Arc<dyn CommandRunner>,
}

impl Ufw {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl FirewallController for Ufw {
    fn backend(&self) -> FirewallBackend {
        FirewallBackend::Ufw
    }

    async fn open_port(&self, port: u16, protocol: Protocol) -> Result<()> {
        let spec = port_spec(port, protocol);
        self.runner.run_checked("ufw", &["allow", &spec]).await?;
        Ok(())
    }

    async fn close_port(&self, port: u16, protocol: Protocol) -> Result<()> {
        let spec = port_spec(port, protocol);
        self.runner.run_checked("ufw", &["delete", "allow", &spec]).await?;
        Ok(())
    }

    async fn apply(&self) -> Result<ApplyOutcome> {
        Ok(ApplyOutcome::Applied)
    }

    async fn status(&self) -> Result<String> {
        let output = self.runner.run_checked("ufw", &["status", "verbose"]).await?;
        Ok(output.stdout.trim().to_string())
    }
}

/// Zone-based firewall managed by the firewalld daemon.
pub struct Firewalld {
    runner: Arc<dyn CommandRunner>,
}

impl Firewalld {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl FirewallController for Firewalld {
    fn backend(&self) -> FirewallBackend {
        FirewallBackend::Firewalld
    }

    async fn open_port(&self, port: u16, protocol: Protocol) -> Result<()> {
        let spec = port_spec(port, protocol);
        self.runner
            .run_checked("firewall-cmd", &["--permanent", "--add-port", &spec])
            .await?;
        Ok(())
    }

    async fn close_port(&self, port: u16, protocol: Protocol) -> Result<()> {
        let spec = port_spec(port, protocol);
        self.runner
            .run_checked("firewall-cmd", &["--permanent", "--remove-port", &spec])
            .await?;
        Ok(())
    }

    async fn apply(&self) -> Result<ApplyOutcome> {
        self.runner.run_checked("firewall-cmd", &["--reload"]).await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn status(&self) -> Result<String> {
        let output = self.runner.run_checked("firewall-cmd", &["--list-all"]).await?;
        Ok(output.stdout.trim().to_string())
    }
}

/// Raw packet filter. Persistence is best effort.
pub struct Iptables {
    runner: Arc<dyn CommandRunner>,
    rules_dir: PathBuf,
}

impl Iptables {
    pub fn new(runner: Arc<dyn CommandRunner>, rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            rules_dir: rules_dir.into(),
        }
    }

    async fn rule(&self, action: &str, port: u16, protocol: Protocol) -> Result<()> {
        let port = port.to_string();
        self.runner
            .run_checked(
                "iptables",
                &[action, "INPUT", "-p", protocol.as_str(), "--dport", &port, "-j", "ACCEPT"],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FirewallController for Iptables {
    fn backend(&self) -> FirewallBackend {
        FirewallBackend::Iptables
    }

    async fn open_port(&self, port: u16, protocol: Protocol) -> Result<()> {
        self.rule("-A", port, protocol).await
    }

    async fn close_port(&self, port: u16, protocol: Protocol) -> Result<()> {
        self.rule("-D", port, protocol).await
    }

    async fn apply(&self) -> Result<ApplyOutcome> {
        if self.runner.command_exists("netfilter-persistent") {
            self.runner
                .run_checked("netfilter-persistent", &["save"])
                .await?;
            return Ok(ApplyOutcome::Applied);
        }

        if self.rules_dir.is_dir() {
            let dump = self.runner.run_checked("iptables-save", &[]).await?;
            let target = self.rules_dir.join("rules.v4");
            write_file_with_mode(&target, dump.stdout.as_bytes(), 0o644)?;
            debug!("Saved iptables rules to {:?}", target);
            return Ok(ApplyOutcome::Applied);
        }

        Ok(ApplyOutcome::SessionOnly)
    }

    async fn status(&self) -> Result<String> {
        let output = self.runner.run_checked("iptables", &["-L", "-n"]).await?;
        Ok(output.stdout.trim().to_string())
    }
}

/// No firewall detected: every operation succeeds without effect.
pub struct NoFirewall;

#[async_trait]
impl FirewallController for NoFirewall {
    fn backend(&self) -> FirewallBackend {
        FirewallBackend::None
    }

    async fn open_port(&self, _port: u16, _protocol: Protocol) -> Result<()> {
        Ok(())
    }

    async fn close_port(&self, _port: u16, _protocol: Protocol) -> Result<()> {
        Ok(())
    }

    async fn apply(&self) -> Result<ApplyOutcome> {
        Ok(ApplyOutcome::Applied)
    }

    async fn status(&self) -> Result<String> {
        Ok("No firewall detected".to_string())
    }
}

/// Detect the active firewall.
///
/// Precedence: ufw, then firewalld (only while its daemon is active), then
/// iptables, else none.
pub async fn detect_backend(runner: &dyn CommandRunner) -> FirewallBackend {
    if runner.command_exists("ufw") {
        return FirewallBackend::Ufw;
    }

    if runner.command_exists("firewall-cmd") {
        let active = runner
            .run("systemctl", &["is-active", "--quiet", "firewalld"])
            .await
            .map(|o| o.success())
            .unwrap_or(false);
        if active {
            return FirewallBackend::Firewalld;
        }
    }

    if runner.command_exists("iptables") {
        return FirewallBackend::Iptables;
    }

    FirewallBackend::None
}

/// Detect the firewall and build its controller.
pub async fn detect(runner: Arc<dyn CommandRunner>, paths: &Paths) -> Box<dyn FirewallController> {
    let backend = detect_backend(runner.as_ref()).await;
    debug!("Detected firewall backend: {}", backend);

    match backend {
        FirewallBackend::Ufw => Box::new(Ufw::new(runner)),
        FirewallBackend::Firewalld => Box::new(Firewalld::new(runner)),
        FirewallBackend::Iptables => Box::new(Iptables::new(runner, &paths.iptables_rules_dir)),
        FirewallBackend::None => Box::new(NoFirewall),
    }
}

/// Outcome of opening every required port.
#[derive(Debug, Clone)]
pub struct FirewallReport {
    pub backend: FirewallBackend,
    pub opened: Vec<PortRequirement>,
    pub warnings: Vec<String>,
}

impl FirewallReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Open all ports then apply, collecting failures as warnings.
pub async fn open_required_ports(
    firewall: &dyn FirewallController,
    ports: &[PortRequirement],
) -> FirewallReport {
    let mut report = FirewallReport {
        backend: firewall.backend(),
        opened: Vec::new(),
        warnings: Vec::new(),
    };

    if report.backend == FirewallBackend::None {
        report
            .warnings
            .push("No firewall detected, make sure the proxy ports are reachable".to_string());
        return report;
    }

    for requirement in ports {
        match firewall.open_port(requirement.port, requirement.protocol).await {
            Ok(()) => {
                info!(
                    "Opened port {}/{} ({})",
                    requirement.port, requirement.protocol, requirement.service_label
                );
                report.opened.push(requirement.clone());
            }
            Err(e) => {
                warn!("Failed to open port {}/{}: {}", requirement.port, requirement.protocol, e);
                report.warnings.push(format!(
                    "Failed to open port {}/{} for {}: {}",
                    requirement.port, requirement.protocol, requirement.service_label, e
                ));
            }
        }
    }

    match firewall.apply().await {
        Ok(ApplyOutcome::Applied) => {}
        Ok(ApplyOutcome::SessionOnly) => report.warnings.push(
            "Firewall rules could not be persisted and will be lost on reboot".to_string(),
        ),
        Err(e) => report
            .warnings
            .push(format!("Failed to apply firewall rules: {}", e)),
    }

    report
}
