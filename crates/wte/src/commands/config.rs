//! `wte config` subcommands.

use super::Context;
use crate::ui;
use anyhow::{bail, Context as _};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;
use wte_config::ServiceConfig;

const FALLBACK_EDITORS: &[&str] = &["nano", "vi", "vim"];

pub fn show(ctx: &Context, reveal: bool) -> anyhow::Result<()> {
    let cfg = if reveal {
        ctx.cfg.clone()
    } else {
        ctx.cfg.redacted()
    };
    ui::info(format!("Configuration file: {}", ctx.config_path.display()));
    ui::plain(serde_yaml::to_string(&cfg)?);
    Ok(())
}

/// The editor command line: `$EDITOR`, then `$VISUAL`, then the first
/// fallback found on `PATH`.
fn editor_command(
    env: impl Fn(&str) -> Option<String>,
    lookup: impl Fn(&str) -> Option<PathBuf>,
) -> Option<Vec<String>> {
    let from_env = ["EDITOR", "VISUAL"]
        .into_iter()
        .filter_map(|var| env(var))
        .map(|value| value.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .find(|parts| !parts.is_empty());
    if from_env.is_some() {
        return from_env;
    }

    FALLBACK_EDITORS
        .iter()
        .find_map(|name| lookup(*name))
        .map(|path| vec![path.display().to_string()])
}

pub fn edit(ctx: &Context) -> anyhow::Result<()> {
    if !ctx.config_path.exists() {
        wte_config::save(&ctx.cfg, &ctx.config_path)?;
        ui::info(format!("Created {}", ctx.config_path.display()));
    }

    let Some(editor) = editor_command(
        |var| std::env::var(var).ok(),
        |name| which::which(name).ok(),
    ) else {
        bail!("No editor found, set $EDITOR");
    };

    debug!("Launching editor {:?}", editor);
    let status = Command::new(&editor[0])
        .args(&editor[1..])
        .arg(&ctx.config_path)
        .status()
        .with_context(|| format!("Failed to launch {}", editor[0]))?;
    if !status.success() {
        bail!("Editor exited with {}", status);
    }

    let cfg = wte_config::load(&ctx.config_path)?;
    match wte_config::validate(&cfg) {
        Ok(()) => {
            ui::success("Configuration saved");
            ui::action("Run 'wte config apply' to apply the changes");
        }
        Err(e) => ui::warning(format!("Configuration is invalid: {}", e)),
    }
    Ok(())
}

/// Set one key on `cfg`, refusing values that leave it invalid.
fn set_value(cfg: &mut ServiceConfig, key: &str, value: &str) -> anyhow::Result<()> {
    cfg.set(key, value)?;
    wte_config::validate(cfg).with_context(|| format!("Refusing to set {}", key))?;
    Ok(())
}

pub fn set(mut ctx: Context, key: &str, value: &str) -> anyhow::Result<()> {
    set_value(&mut ctx.cfg, key, value)?;
    wte_config::save(&ctx.cfg, &ctx.config_path)?;

    if key.contains("password") {
        ui::success(format!("{} updated", key));
    } else {
        ui::success(format!("{} = {}", key, value));
    }
    ui::action("Run 'wte config apply' to apply the changes");
    Ok(())
}

pub fn reset(ctx: &Context, force: bool) -> anyhow::Result<()> {
    if !force && !ui::confirm("Reset the configuration to defaults with new passwords?")? {
        ui::info("Reset cancelled");
        return Ok(());
    }

    ctx.provisioner.reset_config(&ctx.config_path)?;
    ui::success(format!("Configuration reset: {}", ctx.config_path.display()));
    ui::action("Run 'wte config apply' to apply the changes");
    Ok(())
}

pub async fn apply(ctx: &Context) -> anyhow::Result<()> {
    ctx.provisioner.apply(&ctx.cfg).await?;
    ui::success("Configuration applied and service restarted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_editor_prefers_environment() {
        let editor = editor_command(
            |var| (var == "VISUAL").then(|| "code --wait".to_string()),
            |_| Some(PathBuf::from("/usr/bin/nano")),
        );
        assert_eq!(
            editor,
            Some(vec!["code".to_string(), "--wait".to_string()])
        );
    }

    #[test]
    fn test_editor_falls_back_to_path() {
        let editor = editor_command(
            |_| None,
            |name| (name == "vi").then(|| PathBuf::from("/bin/vi")),
        );
        assert_eq!(editor, Some(vec!["/bin/vi".to_string()]));
        assert_eq!(editor_command(|_| None, |_| None), None);
    }

    #[test]
    fn test_set_value_rejects_port_conflict() {
        let mut cfg = ServiceConfig::default();
        set_value(&mut cfg, "http.port", "3128").unwrap();
        assert_eq!(cfg.http.port, 3128);

        let err = set_value(&mut cfg, "shadowsocks.port", "3128").unwrap_err();
        assert!(format!("{:#}", err).contains("Port 3128 conflict"));
    }

    #[test]
    fn test_set_value_unknown_key() {
        let mut cfg = ServiceConfig::default();
        assert!(set_value(&mut cfg, "http.color", "blue").is_err());
    }
}
