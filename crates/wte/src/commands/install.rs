use super::Context;
use crate::ui;
use wte_gost::{ConfigRenderer, CredentialsReport};
use wte_provision::{InstallOptions, InstallReport};

pub async fn run(ctx: Context, opts: InstallOptions) -> anyhow::Result<()> {
    ui::header("Installing GOST proxy server");
    let report = ctx.provisioner.install(ctx.cfg, &opts).await?;
    print_summary(&report);
    Ok(())
}

fn service_lines(report: &InstallReport) -> Vec<String> {
    let cfg = &report.config;
    let ip = &report.public_ip;
    let mut lines = vec![
        format!("Server IP:    {}", ip),
        format!("GOST:         {}", report.installed_version),
    ];

    if cfg.http.enabled {
        let auth = if cfg.http.auth.enabled {
            format!("user {}", cfg.http.auth.username)
        } else {
            "no auth".to_string()
        };
        lines.push(format!("HTTP:         {}:{} ({})", ip, cfg.http.port, auth));
    }
    if cfg.https.enabled {
        lines.push(format!("HTTPS:        {}:{} (self-signed)", ip, cfg.https.port));
    }
    if cfg.shadowsocks.enabled {
        lines.push(format!(
            "Shadowsocks:  {}:{} ({})",
            ip, cfg.shadowsocks.port, cfg.shadowsocks.method
        ));
    }
    lines
}

fn print_summary(report: &InstallReport) {
    let title = if report.is_clean() {
        "Installation complete"
    } else {
        "Installation completed with warnings"
    };
    ui::print_box(title, &service_lines(report));

    if report.previous_install {
        ui::info("An existing installation was replaced");
    }
    if let Some(backup) = &report.config_backup {
        ui::detail("Config backup", backup.display().to_string());
    }
    if let Some(status) = &report.service {
        if status.is_active {
            ui::success("Service is running");
        } else {
            ui::warning(format!("Service state: {}", status.active_state));
        }
    }
    if let Some(firewall) = &report.firewall {
        let ports: Vec<String> = firewall
            .opened
            .iter()
            .map(|p| format!("{}/{}", p.port, p.protocol))
            .collect();
        if !ports.is_empty() {
            ui::success(format!("Firewall ({}): opened {}", firewall.backend, ports.join(", ")));
        }
    }

    ui::header("Connection");
    let cfg = &report.config;
    if cfg.http.enabled {
        ui::detail(
            "HTTP proxy",
            CredentialsReport::new(cfg, &report.public_ip).http_url(),
        );
    }
    if let Some(uri) = ConfigRenderer::new(cfg).shadowsocks_uri(&report.public_ip) {
        ui::detail("Shadowsocks", uri);
    }
    if let Some(path) = &report.credentials_file {
        ui::detail("Credentials", path.display().to_string());
    }

    for warning in &report.warnings {
        ui::warning(warning);
    }
    ui::info(format!(
        "{}/{} steps succeeded in {:.1}s",
        report.steps_succeeded,
        report.steps_total,
        report.elapsed.as_secs_f64()
    ));
    ui::action("Run 'wte status' to check the service, 'wte creds' to show credentials");
}
