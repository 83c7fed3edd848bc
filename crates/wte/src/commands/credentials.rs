use super::Context;
use crate::ui;
use anyhow::bail;
use wte_gost::{ConfigRenderer, CredentialsReport};

pub async fn run(mut ctx: Context, regenerate: bool, uri: bool) -> anyhow::Result<()> {
    let server_ip = ctx.provisioner.public_ip().await;

    if uri {
        let Some(link) = ConfigRenderer::new(&ctx.cfg).shadowsocks_uri(&server_ip) else {
            bail!("Shadowsocks is not enabled");
        };
        ui::plain(link);
        return Ok(());
    }

    if regenerate {
        let warnings = ctx
            .provisioner
            .regenerate_credentials(&mut ctx.cfg, &ctx.config_path, &server_ip)
            .await?;
        for warning in &warnings {
            ui::warning(warning);
        }
        ui::success("New credentials generated and service restarted");
    }

    ui::plain(CredentialsReport::new(&ctx.cfg, &server_ip).render()?);
    Ok(())
}
