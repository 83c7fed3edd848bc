//! Configuration for wte.
//!
//! This crate defines the tool configuration that every generated artifact
//! (daemon config, systemd unit, credentials report, certificates) is derived
//! from, along with its defaults, loading, persistence and validation.

pub mod defaults;
pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load, load_with_env, resolve_config_path, save, Paths};
pub use model::{
    AuthConfig, DaemonConfig, FirewallConfig, HttpConfig, HttpsConfig, LoggingConfig,
    PortRequirement, Protocol, ServiceConfig, ShadowsocksConfig, CONFIG_KEYS,
};
pub use validation::validate;
