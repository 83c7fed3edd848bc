//! Operator choices for a fresh installation.

use wte_config::ServiceConfig;
use wte_gost::Verification;

/// Overrides applied on top of the base configuration during install.
///
/// `None` keeps the base value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub gost_version: Option<String>,

    pub http_port: Option<u16>,
    pub http_user: Option<String>,
    pub http_pass: Option<String>,
    pub http_no_auth: bool,

    pub ss_enabled: bool,
    pub ss_port: Option<u16>,
    pub ss_password: Option<String>,
    pub ss_method: Option<String>,

    pub https_enabled: bool,
    pub https_port: Option<u16>,

    pub skip_firewall: bool,

    /// Expected SHA-256 of the release archive.
    pub gost_sha256: Option<String>,
    pub skip_verify: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            gost_version: None,
            http_port: None,
            http_user: None,
            http_pass: None,
            http_no_auth: false,
            ss_enabled: true,
            ss_port: None,
            ss_password: None,
            ss_method: None,
            https_enabled: false,
            https_port: None,
            skip_firewall: false,
            gost_sha256: None,
            skip_verify: false,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl InstallOptions {
    /// Write the overrides into `cfg`. Passwords left empty are generated later.
    pub fn apply_to(&self, cfg: &mut ServiceConfig) {
        if let Some(version) = non_empty(&self.gost_version) {
            cfg.daemon.version = version.trim_start_matches('v').to_string();
        }

        cfg.http.enabled = true;
        if let Some(port) = self.http_port {
            cfg.http.port = port;
        }
        if let Some(user) = non_empty(&self.http_user) {
            cfg.http.auth.username = user.to_string();
        }
        cfg.http.auth.enabled = !self.http_no_auth;
        cfg.http.auth.password = match non_empty(&self.http_pass) {
            Some(pass) if cfg.http.auth.enabled => pass.to_string(),
            _ => String::new(),
        };

        cfg.shadowsocks.enabled = self.ss_enabled;
        if let Some(port) = self.ss_port {
            cfg.shadowsocks.port = port;
        }
        if let Some(method) = non_empty(&self.ss_method) {
            cfg.shadowsocks.method = method.to_string();
        }
        cfg.shadowsocks.password = non_empty(&self.ss_password)
            .map(str::to_string)
            .unwrap_or_default();

        // HTTPS shares the HTTP credentials; an empty password means reuse.
        cfg.https.enabled = self.https_enabled;
        if let Some(port) = self.https_port {
            cfg.https.port = port;
        }
        cfg.https.auth.enabled = cfg.http.auth.enabled;
        cfg.https.auth.username = cfg.http.auth.username.clone();
        cfg.https.auth.password.clear();

        cfg.firewall.auto_configure = !self.skip_firewall;
    }

    pub fn verification(&self) -> Verification {
        if let Some(digest) = non_empty(&self.gost_sha256) {
            Verification::Pinned(digest.to_lowercase())
        } else if self.skip_verify {
            Verification::Skip
        } else {
            Verification::ReleaseChecksums
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_keep_base_values() {
        let mut cfg = ServiceConfig::default();
        InstallOptions::default().apply_to(&mut cfg);

        assert_eq!(cfg.http.port, 8080);
        assert!(cfg.http.auth.enabled);
        assert!(cfg.http.auth.password.is_empty());
        assert!(cfg.shadowsocks.enabled);
        assert!(!cfg.https.enabled);
        assert!(cfg.firewall.auto_configure);
    }

    #[test]
    fn test_overrides() {
        let mut cfg = ServiceConfig::default();
        let opts = InstallOptions {
            gost_version: Some("v3.0.0".to_string()),
            http_port: Some(3128),
            http_user: Some("admin".to_string()),
            http_pass: Some("given".to_string()),
            ss_enabled: false,
            https_enabled: true,
            https_port: Some(4443),
            skip_firewall: true,
            ..Default::default()
        };
        opts.apply_to(&mut cfg);

        assert_eq!(cfg.daemon.version, "3.0.0");
        assert_eq!(cfg.http.port, 3128);
        assert_eq!(cfg.http.auth.username, "admin");
        assert_eq!(cfg.http.auth.password, "given");
        assert!(!cfg.shadowsocks.enabled);
        assert_eq!(cfg.https.port, 4443);
        assert_eq!(cfg.https.auth.username, "admin");
        assert_eq!(cfg.effective_https_auth().password, "given");
        assert!(!cfg.firewall.auto_configure);
    }

    #[test]
    fn test_no_auth_drops_given_password() {
        let mut cfg = ServiceConfig::default();
        let opts = InstallOptions {
            http_no_auth: true,
            http_pass: Some("ignored".to_string()),
            https_enabled: true,
            ..Default::default()
        };
        opts.apply_to(&mut cfg);

        assert!(!cfg.http.auth.enabled);
        assert!(cfg.http.auth.password.is_empty());
        assert!(!cfg.https.auth.enabled);
    }

    #[test]
    fn test_verification_choice() {
        let pinned = InstallOptions {
            gost_sha256: Some("ABCD".to_string()),
            skip_verify: true,
            ..Default::default()
        };
        assert_eq!(pinned.verification(), Verification::Pinned("abcd".to_string()));

        let skip = InstallOptions {
            skip_verify: true,
            ..Default::default()
        };
        assert_eq!(skip.verification(), Verification::Skip);
        assert_eq!(
            InstallOptions::default().verification(),
            Verification::ReleaseChecksums
        );
    }
}
