//! Service lifecycle commands.

use super::Context;
use crate::ui;
use wte_common::Error;
use wte_config::ServiceConfig;
use wte_system::{is_port_listening, ServiceController, SystemdController};

/// The service controller, or `NotInstalled` when no unit exists yet.
fn installed_service(ctx: &Context) -> anyhow::Result<SystemdController> {
    let service = ctx.provisioner.service();
    if !service.is_installed() {
        ui::action("Run 'wte install' first");
        return Err(Error::NotInstalled("GOST service".to_string()).into());
    }
    Ok(service)
}

pub async fn start(ctx: &Context) -> anyhow::Result<()> {
    installed_service(ctx)?.start().await?;
    ui::success("Service started");
    Ok(())
}

pub async fn stop(ctx: &Context) -> anyhow::Result<()> {
    installed_service(ctx)?.stop().await?;
    ui::success("Service stopped");
    Ok(())
}

pub async fn restart(ctx: &Context) -> anyhow::Result<()> {
    installed_service(ctx)?.restart().await?;
    ui::success("Service restarted");
    Ok(())
}

pub async fn status(ctx: &Context) -> anyhow::Result<()> {
    let service = ctx.provisioner.service();
    if !service.is_installed() {
        ui::warning("GOST service is not installed, run 'wte install' first");
        return Ok(());
    }

    let status = service.status().await?;
    ui::header("Service");
    if status.is_active {
        ui::success(format!("{} is running ({})", status.name, status.sub_state));
    } else {
        ui::warning(format!("{} is {}", status.name, status.active_state));
    }
    ui::detail("Enabled", if status.is_enabled { "yes" } else { "no" });
    if let Some(pid) = status.main_pid {
        ui::detail("PID", pid.to_string());
    }
    if let Some(memory) = &status.memory_usage {
        ui::detail("Memory", memory);
    }

    ui::header("Ports");
    for req in ctx.cfg.required_ports() {
        let state = if is_port_listening(req.port).await {
            "LISTENING"
        } else {
            "NOT LISTENING"
        };
        ui::detail(
            &format!("{} {}/{}", req.service_label, req.port, req.protocol),
            state,
        );
    }

    ui::header("Configuration");
    for (label, value) in summary(&ctx.cfg) {
        ui::detail(label, value);
    }
    ui::detail("Config file", ctx.config_path.display().to_string());
    Ok(())
}

/// One line per service plus the daemon version.
fn summary(cfg: &ServiceConfig) -> Vec<(&'static str, String)> {
    fn toggle(enabled: bool, detail: String) -> String {
        if enabled {
            detail
        } else {
            "disabled".to_string()
        }
    }

    let http_auth = if cfg.http.auth.enabled {
        format!("auth as {}", cfg.http.auth.username)
    } else {
        "no auth".to_string()
    };
    vec![
        ("GOST version", cfg.daemon.version.clone()),
        (
            "HTTP",
            toggle(cfg.http.enabled, format!("port {}, {}", cfg.http.port, http_auth)),
        ),
        (
            "HTTPS",
            toggle(cfg.https.enabled, format!("port {}", cfg.https.port)),
        ),
        (
            "Shadowsocks",
            toggle(
                cfg.shadowsocks.enabled,
                format!("port {}, {}", cfg.shadowsocks.port, cfg.shadowsocks.method),
            ),
        ),
    ]
}

pub async fn logs(ctx: &Context, follow: bool, lines: usize) -> anyhow::Result<()> {
    let service = ctx.provisioner.service();
    if follow {
        service.follow_logs().await?;
    } else {
        ui::plain(service.logs(lines).await?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use wte_config::Paths;
    use wte_provision::Provisioner;
    use wte_system::testing::{ScriptedRunner, StaticFetcher};

    fn rooted_context(root: &std::path::Path, runner: Arc<ScriptedRunner>) -> Context {
        let paths = Paths::rooted(root);
        Context {
            config_path: paths.tool_config.clone(),
            cfg: ServiceConfig::default(),
            provisioner: Provisioner::new(paths, runner, Arc::new(StaticFetcher::new())),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_requires_installed_unit() {
        let temp = assert_fs::TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new().with_programs(&["systemctl"]));
        let ctx = rooted_context(temp.path(), runner.clone());

        for result in [start(&ctx).await, stop(&ctx).await, restart(&ctx).await] {
            let err = result.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<Error>(),
                Some(Error::NotInstalled(_))
            ));
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_with_installed_unit() {
        let temp = assert_fs::TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new().with_programs(&["systemctl"]));
        let ctx = rooted_context(temp.path(), runner.clone());
        let unit = &ctx.provisioner.paths().unit_file;
        std::fs::create_dir_all(unit.parent().unwrap()).unwrap();
        std::fs::write(unit, "[Unit]\n").unwrap();

        start(&ctx).await.unwrap();
        assert!(runner.was_called("systemctl start gost"));
    }

    #[test]
    fn test_summary() {
        let mut cfg = ServiceConfig::default();
        cfg.http.auth.enabled = false;
        let lines = summary(&cfg);

        assert_eq!(lines[1], ("HTTP", "port 8080, no auth".to_string()));
        assert_eq!(lines[2], ("HTTPS", "disabled".to_string()));
        assert_eq!(
            lines[3],
            ("Shadowsocks", "port 9500, aes-128-gcm".to_string())
        );
    }
}
