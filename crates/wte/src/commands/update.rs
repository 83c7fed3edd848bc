use super::{require_root, Context};
use crate::ui;
use anyhow::Context as _;
use tracing::debug;

pub async fn run(ctx: &Context, check: bool, force: bool, skip_verify: bool) -> anyhow::Result<()> {
    let updater = ctx.provisioner.updater(env!("CARGO_PKG_VERSION"))?;

    ui::action("Checking for updates");
    let (release, newer) = updater.check_for_update().await?;
    ui::detail("Current version", updater.current_version());
    ui::detail("Latest version", release.version());

    if newer {
        ui::info(format!("Update available: {}", release.version()));
        if let Some(notes) = release.notes() {
            ui::header("Release notes");
            ui::plain(notes);
        }
    } else {
        ui::success("wte is up to date");
    }
    if check {
        if newer {
            ui::action("Run 'wte update' to install it");
        }
        return Ok(());
    }
    // --force reinstalls the latest release even when already on it.
    if !newer && !force {
        return Ok(());
    }

    if !force && !ui::confirm(&format!("Update to {}?", release.version()))? {
        ui::info("Update cancelled");
        return Ok(());
    }
    require_root()?;

    let executable = std::env::current_exe().context("Cannot locate the running executable")?;
    debug!("Replacing {}", executable.display());
    ctx.provisioner
        .self_update(updater.current_version(), &release, &executable, skip_verify)
        .await?;
    ui::success(format!("Updated to {}", release.version()));
    Ok(())
}
