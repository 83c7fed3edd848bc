//! Built-in default values.

/// GOST release installed when no version is requested.
pub const GOST_VERSION: &str = "3.0.0-rc10";
pub const GOST_BINARY_PATH: &str = "/usr/local/bin/gost";
pub const GOST_CONFIG_DIR: &str = "/etc/gost";
pub const GOST_CONFIG_FILE: &str = "/etc/gost/config.yaml";
pub const GOST_CERT_PATH: &str = "/etc/gost/cert.pem";
pub const GOST_KEY_PATH: &str = "/etc/gost/key.pem";

pub const HTTP_PORT: u16 = 8080;
pub const HTTPS_PORT: u16 = 8443;
pub const SHADOWSOCKS_PORT: u16 = 9500;
pub const SHADOWSOCKS_METHOD: &str = "aes-128-gcm";
/// Ciphers GOST accepts for Shadowsocks.
pub const SHADOWSOCKS_METHODS: &[&str] = &[
    "aes-128-gcm",
    "aes-192-gcm",
    "aes-256-gcm",
    "chacha20-ietf-poly1305",
    "2022-blake3-aes-128-gcm",
    "2022-blake3-aes-256-gcm",
    "2022-blake3-chacha20-poly1305",
];
pub const USERNAME: &str = "proxyuser";
pub const LOG_LEVEL: &str = "info";

/// Length of every generated proxy password.
pub const PASSWORD_LENGTH: usize = 16;

pub const TOOL_CONFIG_DIR: &str = "/etc/wte";
pub const TOOL_CONFIG_FILE: &str = "/etc/wte/config.yaml";
pub const CREDENTIALS_FILE: &str = "/root/proxy-credentials.txt";
pub const SYSTEMD_UNIT_FILE: &str = "/etc/systemd/system/gost.service";
pub const SERVICE_NAME: &str = "gost";

pub const OS_RELEASE: &str = "/etc/os-release";
pub const LEGACY_RELEASE: &str = "/etc/redhat-release";
pub const IPTABLES_RULES_DIR: &str = "/etc/iptables";

/// Prefix of environment variables overriding configuration keys.
pub const ENV_PREFIX: &str = "WTE_";
