//! Tool configuration model.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use wte_common::{Error, Result};

/// Every settable leaf key, in the order they appear in the YAML file.
pub const CONFIG_KEYS: &[&str] = &[
    "gost.version",
    "gost.binary_path",
    "gost.config_dir",
    "gost.config_file",
    "http.enabled",
    "http.port",
    "http.auth.enabled",
    "http.auth.username",
    "http.auth.password",
    "https.enabled",
    "https.port",
    "https.cert_path",
    "https.key_path",
    "https.auth.enabled",
    "https.auth.username",
    "https.auth.password",
    "shadowsocks.enabled",
    "shadowsocks.port",
    "shadowsocks.method",
    "shadowsocks.password",
    "firewall.auto_configure",
    "logging.level",
];

/// The complete tool configuration.
///
/// Every file wte generates is derived from this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// The managed GOST daemon.
    #[serde(rename = "gost", alias = "daemon")]
    pub daemon: DaemonConfig,
    pub http: HttpConfig,
    pub https: HttpsConfig,
    pub shadowsocks: ShadowsocksConfig,
    pub firewall: FirewallConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub version: String,
    pub binary_path: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            version: defaults::GOST_VERSION.to_string(),
            binary_path: PathBuf::from(defaults::GOST_BINARY_PATH),
            config_dir: PathBuf::from(defaults::GOST_CONFIG_DIR),
            config_file: PathBuf::from(defaults::GOST_CONFIG_FILE),
        }
    }
}

/// Proxy authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub username: String,
    /// Empty until generated.
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            username: defaults::USERNAME.to_string(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub port: u16,
    pub auth: AuthConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: defaults::HTTP_PORT,
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpsConfig {
    pub enabled: bool,
    pub port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Falls back to the HTTP credentials while the password is empty.
    pub auth: AuthConfig,
}

impl Default for HttpsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: defaults::HTTPS_PORT,
            cert_path: PathBuf::from(defaults::GOST_CERT_PATH),
            key_path: PathBuf::from(defaults::GOST_KEY_PATH),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowsocksConfig {
    pub enabled: bool,
    pub port: u16,
    pub method: String,
    pub password: String,
}

impl Default for ShadowsocksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: defaults::SHADOWSOCKS_PORT,
            method: defaults::SHADOWSOCKS_METHOD.to_string(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    pub auto_configure: bool,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            auto_configure: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

/// Transport protocol of a port that must be reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port one of the enabled services listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRequirement {
    pub port: u16,
    pub protocol: Protocol,
    pub service_label: String,
}

impl PortRequirement {
    fn new(port: u16, protocol: Protocol, service_label: &str) -> Self {
        Self {
            port,
            protocol,
            service_label: service_label.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Ports the firewall must open for the enabled services.
    ///
    /// Shadowsocks needs the same port on both TCP and UDP.
    pub fn required_ports(&self) -> Vec<PortRequirement> {
        let mut ports = Vec::new();

        if self.http.enabled {
            ports.push(PortRequirement::new(self.http.port, Protocol::Tcp, "HTTP Proxy"));
        }
        if self.https.enabled {
            ports.push(PortRequirement::new(self.https.port, Protocol::Tcp, "HTTPS Proxy"));
        }
        if self.shadowsocks.enabled {
            ports.push(PortRequirement::new(self.shadowsocks.port, Protocol::Tcp, "Shadowsocks"));
            ports.push(PortRequirement::new(self.shadowsocks.port, Protocol::Udp, "Shadowsocks"));
        }

        ports
    }

    /// Credentials the HTTPS service actually uses.
    pub fn effective_https_auth(&self) -> &AuthConfig {
        if self.https.auth.password.is_empty() {
            &self.http.auth
        } else {
            &self.https.auth
        }
    }

    /// Fill every empty password an enabled service needs.
    ///
    /// Returns the keys that received a new value.
    pub fn fill_missing_passwords(
        &mut self,
        mut generate: impl FnMut() -> String,
    ) -> Vec<&'static str> {
        let mut filled = Vec::new();

        if self.http.enabled && self.http.auth.enabled && self.http.auth.password.is_empty() {
            self.http.auth.password = generate();
            filled.push("http.auth.password");
        }
        // HTTPS with an empty password reuses the HTTP credentials.
        if self.https.enabled
            && self.https.auth.enabled
            && !self.http.auth.enabled
            && self.https.auth.password.is_empty()
        {
            self.https.auth.password = generate();
            filled.push("https.auth.password");
        }
        if self.shadowsocks.enabled && self.shadowsocks.password.is_empty() {
            self.shadowsocks.password = generate();
            filled.push("shadowsocks.password");
        }

        filled
    }

    /// Replace every password with a fresh value, keeping empty HTTPS reuse.
    pub fn regenerate_passwords(&mut self, mut generate: impl FnMut() -> String) {
        self.http.auth.password = generate();
        self.shadowsocks.password = generate();
        if !self.https.auth.password.is_empty() {
            self.https.auth.password = generate();
        }
    }

    /// A copy with every non-empty password masked, for display.
    pub fn redacted(&self) -> Self {
        fn mask(secret: &mut String) {
            if !secret.is_empty() {
                *secret = "********".to_string();
            }
        }

        let mut copy = self.clone();
        mask(&mut copy.http.auth.password);
        mask(&mut copy.https.auth.password);
        mask(&mut copy.shadowsocks.password);
        copy
    }

    /// Set a single leaf value from its dotted key.
    ///
    /// `daemon.*` is accepted as an alias of `gost.*`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = key.trim().to_ascii_lowercase();
        let normalized = match normalized.strip_prefix("daemon.") {
            Some(rest) => format!("gost.{}", rest),
            None => normalized,
        };

        match normalized.as_str() {
            "gost.version" => self.daemon.version = value.trim_start_matches('v').to_string(),
            "gost.binary_path" => self.daemon.binary_path = parse_path(key, value)?,
            "gost.config_dir" => self.daemon.config_dir = parse_path(key, value)?,
            "gost.config_file" => self.daemon.config_file = parse_path(key, value)?,

            "http.enabled" => self.http.enabled = parse_bool(key, value)?,
            "http.port" => self.http.port = parse_port(key, value)?,
            "http.auth.enabled" => self.http.auth.enabled = parse_bool(key, value)?,
            "http.auth.username" => self.http.auth.username = value.to_string(),
            "http.auth.password" => self.http.auth.password = value.to_string(),

            "https.enabled" => self.https.enabled = parse_bool(key, value)?,
            "https.port" => self.https.port = parse_port(key, value)?,
            "https.cert_path" => self.https.cert_path = parse_path(key, value)?,
            "https.key_path" => self.https.key_path = parse_path(key, value)?,
            "https.auth.enabled" => self.https.auth.enabled = parse_bool(key, value)?,
            "https.auth.username" => self.https.auth.username = value.to_string(),
            "https.auth.password" => self.https.auth.password = value.to_string(),

            "shadowsocks.enabled" => self.shadowsocks.enabled = parse_bool(key, value)?,
            "shadowsocks.port" => self.shadowsocks.port = parse_port(key, value)?,
            "shadowsocks.method" => self.shadowsocks.method = parse_method(key, value)?,
            "shadowsocks.password" => self.shadowsocks.password = value.to_string(),

            "firewall.auto_configure" => self.firewall.auto_configure = parse_bool(key, value)?,
            "logging.level" => self.logging.level = parse_level(key, value)?,

            _ => return Err(Error::UnknownConfigKey(key.to_string())),
        }

        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Parse a boolean written as `true/false`, `1/0` or `yes/no`.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

/// Parse a non-zero TCP/UDP port.
pub fn parse_port(key: &str, value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(invalid(key, value)),
    }
}

/// Accept only a cipher listed in [`defaults::SHADOWSOCKS_METHODS`].
pub fn parse_method(key: &str, value: &str) -> Result<String> {
    let method = value.trim().to_ascii_lowercase();
    if defaults::SHADOWSOCKS_METHODS.contains(&method.as_str()) {
        Ok(method)
    } else {
        Err(invalid(key, value))
    }
}

fn parse_path(key: &str, value: &str) -> Result<PathBuf> {
    if value.trim().is_empty() {
        return Err(invalid(key, value));
    }
    Ok(PathBuf::from(value.trim()))
}

fn parse_level(key: &str, value: &str) -> Result<String> {
    let level = value.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(level),
        _ => Err(invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.daemon.version, "3.0.0-rc10");
        assert_eq!(cfg.http.port, 8080);
        assert!(cfg.http.auth.enabled);
        assert!(!cfg.https.enabled);
        assert!(cfg.shadowsocks.enabled);
        assert_eq!(cfg.shadowsocks.method, "aes-128-gcm");
        assert!(cfg.firewall.auto_configure);
    }

    #[test]
    fn test_required_ports_shadowsocks_uses_both_protocols() {
        let mut cfg = ServiceConfig::default();
        cfg.https.enabled = true;

        let ports = cfg.required_ports();
        let summary: Vec<(u16, Protocol)> = ports.iter().map(|p| (p.port, p.protocol)).collect();
        assert_eq!(
            summary,
            vec![
                (8080, Protocol::Tcp),
                (8443, Protocol::Tcp),
                (9500, Protocol::Tcp),
                (9500, Protocol::Udp),
            ]
        );
        assert_eq!(ports[3].service_label, "Shadowsocks");
    }

    #[test]
    fn test_set_leaf_keys() {
        let mut cfg = ServiceConfig::default();
        cfg.set("http.port", "3128").unwrap();
        cfg.set("shadowsocks.enabled", "no").unwrap();
        cfg.set("daemon.version", "v3.0.0").unwrap();
        cfg.set("firewall.auto_configure", "0").unwrap();
        cfg.set("HTTPS.Auth.Username", "alice").unwrap();

        assert_eq!(cfg.http.port, 3128);
        assert!(!cfg.shadowsocks.enabled);
        assert_eq!(cfg.daemon.version, "3.0.0");
        assert!(!cfg.firewall.auto_configure);
        assert_eq!(cfg.https.auth.username, "alice");
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut cfg = ServiceConfig::default();
        assert!(matches!(
            cfg.set("http.colour", "blue"),
            Err(Error::UnknownConfigKey(_))
        ));
        assert!(matches!(
            cfg.set("http.port", "0"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("http.port", "70000"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("http.enabled", "maybe"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("logging.level", "loud"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("shadowsocks.method", "aes-128-gcm\n# injected"),
            Err(Error::InvalidValue { .. })
        ));
        assert_eq!(cfg.shadowsocks.method, "aes-128-gcm");
    }

    #[test]
    fn test_set_shadowsocks_method() {
        let mut cfg = ServiceConfig::default();
        cfg.set("shadowsocks.method", "CHACHA20-IETF-POLY1305").unwrap();
        assert_eq!(cfg.shadowsocks.method, "chacha20-ietf-poly1305");
    }

    #[test]
    fn test_every_listed_key_is_settable() {
        let sample = |key: &str| -> &'static str {
            if key.ends_with("enabled") || key.ends_with("auto_configure") {
                "true"
            } else if key.ends_with("port") {
                "1080"
            } else if key == "logging.level" {
                "debug"
            } else {
                "/tmp/value"
            }
        };

        let mut cfg = ServiceConfig::default();
        for key in CONFIG_KEYS {
            cfg.set(key, sample(key)).unwrap();
        }
    }

    #[test]
    fn test_fill_missing_passwords() {
        let mut cfg = ServiceConfig::default();
        cfg.https.enabled = true;
        let mut n = 0;
        let filled = cfg.fill_missing_passwords(|| {
            n += 1;
            format!("secret{}", n)
        });

        assert_eq!(filled, vec!["http.auth.password", "shadowsocks.password"]);
        assert_eq!(cfg.http.auth.password, "secret1");
        assert_eq!(cfg.shadowsocks.password, "secret2");
        // HTTPS reuses HTTP credentials.
        assert!(cfg.https.auth.password.is_empty());
        assert_eq!(cfg.effective_https_auth().password, "secret1");
    }

    #[test]
    fn test_redacted_masks_only_set_passwords() {
        let mut cfg = ServiceConfig::default();
        cfg.http.auth.password = "hunter2".to_string();

        let shown = cfg.redacted();
        assert_eq!(shown.http.auth.password, "********");
        assert_eq!(shown.shadowsocks.password, "");
        assert_eq!(cfg.http.auth.password, "hunter2");
    }
}
