//! Configuration validation.

use crate::{defaults, ServiceConfig};
use std::collections::HashMap;
use wte_common::{Error, Result};

/// Check that the configuration can be rendered into a working daemon config.
///
/// At least one service must be enabled, and no two enabled services may
/// share a port. Services claim ports in the order HTTP, HTTPS, Shadowsocks;
/// a conflict names the later service first and the earlier claimant second.
/// An enabled Shadowsocks service must use a supported cipher.
pub fn validate(cfg: &ServiceConfig) -> Result<()> {
    let services = [
        ("HTTP", cfg.http.enabled, cfg.http.port),
        ("HTTPS", cfg.https.enabled, cfg.https.port),
        ("Shadowsocks", cfg.shadowsocks.enabled, cfg.shadowsocks.port),
    ];

    if !services.iter().any(|(_, enabled, _)| *enabled) {
        return Err(Error::NoServiceEnabled);
    }

    let mut claimed: HashMap<u16, &str> = HashMap::new();
    for (name, enabled, port) in services {
        if !enabled {
            continue;
        }
        if let Some(existing) = claimed.get(&port) {
            return Err(Error::PortConflict {
                port,
                service: name.to_string(),
                existing: existing.to_string(),
            });
        }
        claimed.insert(port, name);
    }

    if cfg.shadowsocks.enabled
        && !defaults::SHADOWSOCKS_METHODS.contains(&cfg.shadowsocks.method.as_str())
    {
        return Err(Error::InvalidValue {
            key: "shadowsocks.method".to_string(),
            value: cfg.shadowsocks.method.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_unsupported_shadowsocks_method() {
        let mut cfg = ServiceConfig::default();
        cfg.shadowsocks.method = "aes-128-gcm\nservices: []".to_string();
        assert!(matches!(
            validate(&cfg).unwrap_err(),
            Error::InvalidValue { ref key, .. } if key == "shadowsocks.method"
        ));

        cfg.shadowsocks.enabled = false;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_no_service_enabled() {
        let mut cfg = ServiceConfig::default();
        cfg.http.enabled = false;
        cfg.shadowsocks.enabled = false;

        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, Error::NoServiceEnabled));
    }

    #[test]
    fn test_conflict_names_first_claimant() {
        let mut cfg = ServiceConfig::default();
        cfg.https.enabled = true;
        cfg.https.port = 8080;

        let err = validate(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "Port 8080 conflict: HTTPS and HTTP");
    }

    #[test]
    fn test_conflict_with_shadowsocks() {
        let mut cfg = ServiceConfig::default();
        cfg.http.enabled = false;
        cfg.https.enabled = true;
        cfg.shadowsocks.port = cfg.https.port;

        match validate(&cfg).unwrap_err() {
            Error::PortConflict {
                port,
                service,
                existing,
            } => {
                assert_eq!(port, 8443);
                assert_eq!(service, "Shadowsocks");
                assert_eq!(existing, "HTTPS");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_disabled_services_do_not_claim_ports() {
        let mut cfg = ServiceConfig::default();
        cfg.https.port = 8080;
        assert!(validate(&cfg).is_ok());
    }
}
