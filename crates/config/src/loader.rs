//! Loading and persisting the tool configuration.

use crate::defaults;
use crate::model::CONFIG_KEYS;
use crate::ServiceConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use wte_common::fs::write_file_with_mode;
use wte_common::{Error, Result};

/// Fixed host locations wte reads and writes outside the daemon's own paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub tool_config: PathBuf,
    pub unit_file: PathBuf,
    pub credentials_file: PathBuf,
    pub os_release: PathBuf,
    pub legacy_release: PathBuf,
    pub iptables_rules_dir: PathBuf,
}

impl Paths {
    /// The real system locations.
    pub fn system() -> Self {
        Self {
            tool_config: PathBuf::from(defaults::TOOL_CONFIG_FILE),
            unit_file: PathBuf::from(defaults::SYSTEMD_UNIT_FILE),
            credentials_file: PathBuf::from(defaults::CREDENTIALS_FILE),
            os_release: PathBuf::from(defaults::OS_RELEASE),
            legacy_release: PathBuf::from(defaults::LEGACY_RELEASE),
            iptables_rules_dir: PathBuf::from(defaults::IPTABLES_RULES_DIR),
        }
    }

    /// The system layout re-rooted under `root`.
    pub fn rooted(root: &Path) -> Self {
        let system = Self::system();
        let under = |p: PathBuf| root.join(p.strip_prefix("/").unwrap_or(&p));
        Self {
            tool_config: under(system.tool_config),
            unit_file: under(system.unit_file),
            credentials_file: under(system.credentials_file),
            os_release: under(system.os_release),
            legacy_release: under(system.legacy_release),
            iptables_rules_dir: under(system.iptables_rules_dir),
        }
    }

    pub fn with_tool_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_config = path.into();
        self
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::system()
    }
}

/// Pick the config file to use.
///
/// An explicit path always wins. Otherwise the system file is used, falling
/// back to `./config.yaml` when only that one exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let system = PathBuf::from(defaults::TOOL_CONFIG_FILE);
    let local = PathBuf::from("config.yaml");
    if !system.exists() && local.exists() {
        debug!("Using local configuration file {:?}", local);
        return local;
    }
    system
}

/// Load configuration: defaults, then the file, then `WTE_*` environment.
pub fn load(path: &Path) -> Result<ServiceConfig> {
    load_with_env(path, std::env::vars())
}

/// Like [`load`] but with an explicit environment.
pub fn load_with_env(
    path: &Path,
    env: impl IntoIterator<Item = (String, String)>,
) -> Result<ServiceConfig> {
    let mut cfg = read_file(path)?;
    apply_env_overrides(&mut cfg, env)?;
    Ok(cfg)
}

fn read_file(path: &Path) -> Result<ServiceConfig> {
    if !path.exists() {
        debug!("Configuration file {:?} not found, using defaults", path);
        return Ok(ServiceConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(ServiceConfig::default());
    }

    serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
}

/// Environment variable overriding a dotted key (`http.port` → `WTE_HTTP_PORT`).
pub fn env_var_name(key: &str) -> String {
    format!(
        "{}{}",
        defaults::ENV_PREFIX,
        key.replace('.', "_").to_ascii_uppercase()
    )
}

/// Apply `WTE_*` overrides for every known key.
pub fn apply_env_overrides(
    cfg: &mut ServiceConfig,
    env: impl IntoIterator<Item = (String, String)>,
) -> Result<()> {
    let env: HashMap<String, String> = env
        .into_iter()
        .filter(|(k, _)| k.starts_with(defaults::ENV_PREFIX))
        .collect();
    if env.is_empty() {
        return Ok(());
    }

    for key in CONFIG_KEYS {
        if let Some(value) = env.get(&env_var_name(key)) {
            debug!("Overriding {} from environment", key);
            cfg.set(key, value)?;
        }
    }
    Ok(())
}

/// Persist the whole configuration, readable by the owner only.
pub fn save(cfg: &ServiceConfig, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(cfg)?;
    write_file_with_mode(path, yaml.as_bytes(), 0o600)?;
    debug!("Configuration saved to {:?}", path);
    Ok(())
}
