use super::Context;
use crate::ui;

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    ui::plain(format!("wte {}", env!("CARGO_PKG_VERSION")));

    let installer = ctx.provisioner.installer(&ctx.cfg);
    let gost = if installer.is_installed() {
        installer
            .version()
            .await
            .unwrap_or_else(|e| format!("unknown ({})", e))
    } else {
        "not installed".to_string()
    };
    ui::detail("GOST", gost);

    match ctx.provisioner.detect_platform() {
        Ok(platform) => ui::detail(
            "Platform",
            format!("{} ({}/{})", platform.pretty_name, std::env::consts::OS, platform.raw_arch),
        ),
        Err(_) => ui::detail(
            "Platform",
            format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        ),
    }
    Ok(())
}
