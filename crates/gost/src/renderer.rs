//! Rendering of the GOST daemon configuration file.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use handlebars::Handlebars;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use wte_common::fs::{remove_dir_if_empty, remove_if_exists, write_file_with_mode};
use wte_common::{Error, Result, Timestamp};
use wte_config::{AuthConfig, ServiceConfig};

// Every `{{value}}` is emitted as a double-quoted YAML scalar; `{{{value}}}`
// is emitted raw and only used inside comments.
const TEMPLATE: &str = r#"# ============================================================================
# GOST Proxy Server Configuration
# ============================================================================
# Generated: {{{generated_at}}}
# Generator: WTE
# Documentation: https://gost.run/
# ============================================================================

services:
{{#if http}}
  # HTTP proxy, authentication {{{http.auth_state}}}
  - name: http-proxy
    addr: {{http.addr}}
    handler:
      type: http
{{#if http.auth}}
      auth:
        username: {{http.auth.username}}
        password: {{http.auth.password}}
{{/if}}
    listener:
      type: tcp
{{/if}}
{{#if https}}
  # HTTPS proxy (TLS), authentication {{{https.auth_state}}}
  - name: https-proxy
    addr: {{https.addr}}
    handler:
      type: http
{{#if https.auth}}
      auth:
        username: {{https.auth.username}}
        password: {{https.auth.password}}
{{/if}}
    listener:
      type: tls
      tls:
        certFile: {{https.cert_file}}
        keyFile: {{https.key_file}}
{{/if}}
{{#if shadowsocks}}
  # Shadowsocks, method {{shadowsocks.method}}
  - name: shadowsocks
    addr: {{shadowsocks.addr}}
    handler:
      type: ss
      auth:
        username: {{shadowsocks.method}}
        password: {{shadowsocks.password}}
    listener:
      type: tcp
{{/if}}
"#;

/// Quote a value as a double-quoted YAML scalar.
fn yaml_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[derive(Serialize)]
struct AuthContext<'a> {
    username: &'a str,
    password: &'a str,
}

impl<'a> AuthContext<'a> {
    fn from_config(auth: &'a AuthConfig) -> Option<Self> {
        auth.enabled.then_some(Self {
            username: &auth.username,
            password: &auth.password,
        })
    }
}

fn auth_state(auth: &Option<AuthContext<'_>>) -> &'static str {
    if auth.is_some() {
        "enabled"
    } else {
        "disabled"
    }
}

#[derive(Serialize)]
struct HttpContext<'a> {
    addr: String,
    auth_state: &'static str,
    auth: Option<AuthContext<'a>>,
}

#[derive(Serialize)]
struct HttpsContext<'a> {
    addr: String,
    auth_state: &'static str,
    auth: Option<AuthContext<'a>>,
    cert_file: String,
    key_file: String,
}

#[derive(Serialize)]
struct ShadowsocksContext<'a> {
    addr: String,
    method: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RenderContext<'a> {
    generated_at: String,
    http: Option<HttpContext<'a>>,
    https: Option<HttpsContext<'a>>,
    shadowsocks: Option<ShadowsocksContext<'a>>,
}

/// Renders, backs up and removes the daemon configuration file.
pub struct ConfigRenderer<'a> {
    cfg: &'a ServiceConfig,
}

impl<'a> ConfigRenderer<'a> {
    pub fn new(cfg: &'a ServiceConfig) -> Self {
        Self { cfg }
    }

    pub fn config_file(&self) -> &Path {
        &self.cfg.daemon.config_file
    }

    /// Reject configurations with no service or with shared ports.
    pub fn validate(&self) -> Result<()> {
        wte_config::validate(self.cfg)
    }

    fn context(&self, generated_at: &Timestamp) -> RenderContext<'a> {
        let cfg = self.cfg;

        let http = cfg.http.enabled.then(|| {
            let auth = AuthContext::from_config(&cfg.http.auth);
            HttpContext {
                addr: format!(":{}", cfg.http.port),
                auth_state: auth_state(&auth),
                auth,
            }
        });

        let https = cfg.https.enabled.then(|| {
            let auth = AuthContext::from_config(cfg.effective_https_auth());
            HttpsContext {
                addr: format!(":{}", cfg.https.port),
                auth_state: auth_state(&auth),
                auth,
                cert_file: cfg.https.cert_path.display().to_string(),
                key_file: cfg.https.key_path.display().to_string(),
            }
        });

        let shadowsocks = cfg.shadowsocks.enabled.then(|| ShadowsocksContext {
            addr: format!(":{}", cfg.shadowsocks.port),
            method: &cfg.shadowsocks.method,
            password: &cfg.shadowsocks.password,
        });

        RenderContext {
            generated_at: generated_at.to_display(),
            http,
            https,
            shadowsocks,
        }
    }

    /// Render the configuration document.
    pub fn render(&self, generated_at: &Timestamp) -> Result<String> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(yaml_quote);
        handlebars
            .render_template(TEMPLATE, &self.context(generated_at))
            .map_err(|e| Error::Template(e.to_string()))
    }

    /// Validate, render and write the configuration, owner-readable only.
    pub fn generate(&self) -> Result<PathBuf> {
        self.validate()?;
        let document = self.render(&Timestamp::now())?;

        let path = self.config_file();
        write_file_with_mode(path, document.as_bytes(), 0o600)?;
        info!("Configuration file created: {}", path.display());
        self.log_summary();
        Ok(path.to_path_buf())
    }

    fn log_summary(&self) {
        let cfg = self.cfg;
        if cfg.http.enabled {
            let auth = if cfg.http.auth.enabled {
                format!("user={}", cfg.http.auth.username)
            } else {
                "no auth".to_string()
            };
            info!("  HTTP proxy: :{} ({})", cfg.http.port, auth);
        }
        if cfg.https.enabled {
            info!("  HTTPS proxy: :{}", cfg.https.port);
        }
        if cfg.shadowsocks.enabled {
            info!(
                "  Shadowsocks: :{} (method={})",
                cfg.shadowsocks.port, cfg.shadowsocks.method
            );
        }
    }

    fn backup_prefix(&self) -> String {
        format!(
            "{}.backup.",
            self.config_file()
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        )
    }

    /// Copy the current file to `<file>.backup.<YYYYMMDD_HHMMSS>`.
    ///
    /// Returns `None` when there is nothing to back up.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        let path = self.config_file();
        if !path.exists() {
            return Ok(None);
        }

        let backup = PathBuf::from(format!(
            "{}.backup.{}",
            path.display(),
            Timestamp::now().to_backup_suffix()
        ));
        let content = fs::read(path)?;
        write_file_with_mode(&backup, &content, 0o600)?;
        debug!("Configuration backed up to {:?}", backup);
        Ok(Some(backup))
    }

    /// Remove the file and its backups, then the directory if left empty.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self) -> Result<bool> {
        let path = self.config_file();
        let mut removed = remove_if_exists(path)?;

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            let prefix = self.backup_prefix();
            if let Ok(entries) = fs::read_dir(dir) {
                for entry in entries.flatten() {
                    if entry.file_name().to_string_lossy().starts_with(&prefix) {
                        removed |= remove_if_exists(&entry.path())?;
                    }
                }
            }
            if remove_dir_if_empty(dir)? {
                debug!("Removed empty directory {:?}", dir);
            }
        }

        Ok(removed)
    }

    /// `ss://` import URI, when Shadowsocks is enabled.
    pub fn shadowsocks_uri(&self, server_ip: &str) -> Option<String> {
        let ss = &self.cfg.shadowsocks;
        ss.enabled.then(|| {
            let user_info = STANDARD.encode(format!("{}:{}", ss.method, ss.password));
            format!("ss://{}@{}:{}#WTE-Proxy", user_info, server_ip, ss.port)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;

    fn configured(dir: &Path) -> ServiceConfig {
        let mut cfg = ServiceConfig::default();
        cfg.daemon.config_dir = dir.join("gost");
        cfg.daemon.config_file = dir.join("gost/config.yaml");
        cfg.http.auth.password = "Zq3xY7pLmN2vB8cD".to_string();
        cfg.shadowsocks.password = "s3cr3tPassw0rd42".to_string();
        cfg
    }

    fn services(document: &str) -> Vec<Value> {
        let parsed: Value = serde_yaml::from_str(document).unwrap();
        parsed["services"].as_sequence().cloned().unwrap_or_default()
    }

    #[test]
    fn test_render_default_services() {
        let cfg = configured(Path::new("/tmp"));
        let document = ConfigRenderer::new(&cfg).render(&Timestamp::now()).unwrap();
        let services = services(&document);

        assert_eq!(services.len(), 2);
        assert_eq!(services[0]["name"], "http-proxy");
        assert_eq!(services[0]["addr"], ":8080");
        assert_eq!(services[0]["handler"]["auth"]["username"], "proxyuser");
        assert_eq!(services[0]["handler"]["auth"]["password"], "Zq3xY7pLmN2vB8cD");
        assert_eq!(services[0]["listener"]["type"], "tcp");

        assert_eq!(services[1]["name"], "shadowsocks");
        assert_eq!(services[1]["handler"]["type"], "ss");
        assert_eq!(services[1]["handler"]["auth"]["username"], "aes-128-gcm");
        assert_eq!(services[1]["handler"]["auth"]["password"], "s3cr3tPassw0rd42");
    }

    #[test]
    fn test_https_reuses_http_credentials() {
        let mut cfg = configured(Path::new("/tmp"));
        cfg.https.enabled = true;

        let document = ConfigRenderer::new(&cfg).render(&Timestamp::now()).unwrap();
        let services = services(&document);
        let https = &services[1];

        assert_eq!(https["name"], "https-proxy");
        assert_eq!(https["addr"], ":8443");
        assert_eq!(https["handler"]["auth"]["password"], "Zq3xY7pLmN2vB8cD");
        assert_eq!(https["listener"]["type"], "tls");
        assert_eq!(https["listener"]["tls"]["certFile"], "/etc/gost/cert.pem");
        assert_eq!(https["listener"]["tls"]["keyFile"], "/etc/gost/key.pem");

        cfg.https.auth.password = "own-https-pass".to_string();
        let document = ConfigRenderer::new(&cfg).render(&Timestamp::now()).unwrap();
        assert_eq!(
            self::services(&document)[1]["handler"]["auth"]["password"],
            "own-https-pass"
        );
    }

    #[test]
    fn test_no_auth_block_when_disabled() {
        let mut cfg = configured(Path::new("/tmp"));
        cfg.http.auth.enabled = false;
        cfg.shadowsocks.enabled = false;

        let document = ConfigRenderer::new(&cfg).render(&Timestamp::now()).unwrap();
        let services = services(&document);
        assert_eq!(services.len(), 1);
        assert!(services[0]["handler"].get("auth").is_none());
    }

    #[test]
    fn test_special_characters_stay_literal() {
        let mut cfg = configured(Path::new("/tmp"));
        cfg.http.auth.password = "a\"b: #c\\d".to_string();

        let document = ConfigRenderer::new(&cfg).render(&Timestamp::now()).unwrap();
        assert_eq!(
            services(&document)[0]["handler"]["auth"]["password"],
            "a\"b: #c\\d"
        );
    }

    #[test]
    fn test_generate_validates_and_restricts_permissions() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut cfg = configured(temp.path());

        let path = ConfigRenderer::new(&cfg).generate().unwrap();
        temp.child("gost/config.yaml")
            .assert(predicate::str::contains("name: http-proxy"));
        assert_eq!(wte_common::fs::mode_of(&path), Some(0o600));

        cfg.https.enabled = true;
        cfg.https.port = 9500;
        let err = ConfigRenderer::new(&cfg).generate().unwrap_err();
        assert_eq!(err.to_string(), "Port 9500 conflict: Shadowsocks and HTTPS");
    }

    #[test]
    fn test_backup_and_remove_sweep() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cfg = configured(temp.path());
        let renderer = ConfigRenderer::new(&cfg);

        assert_eq!(renderer.backup().unwrap(), None);
        assert!(!renderer.remove().unwrap());

        renderer.generate().unwrap();
        let backup = renderer.backup().unwrap().unwrap();
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("config.yaml.backup."));
        assert_eq!(fs::read(&backup).unwrap(), fs::read(renderer.config_file()).unwrap());

        assert!(renderer.remove().unwrap());
        assert!(!backup.exists());
        temp.child("gost").assert(predicate::path::missing());
    }

    #[test]
    fn test_remove_keeps_unrelated_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cfg = configured(temp.path());
        let renderer = ConfigRenderer::new(&cfg);
        renderer.generate().unwrap();
        temp.child("gost/cert.pem").write_str("cert").unwrap();

        renderer.remove().unwrap();
        temp.child("gost/cert.pem").assert(predicate::path::exists());
    }

    #[test]
    fn test_shadowsocks_uri() {
        let mut cfg = ServiceConfig::default();
        cfg.shadowsocks.password = "pass".to_string();

        let uri = ConfigRenderer::new(&cfg).shadowsocks_uri("203.0.113.7").unwrap();
        // base64("aes-128-gcm:pass")
        assert_eq!(uri, "ss://YWVzLTEyOC1nY206cGFzcw==@203.0.113.7:9500#WTE-Proxy");

        cfg.shadowsocks.enabled = false;
        assert_eq!(ConfigRenderer::new(&cfg).shadowsocks_uri("203.0.113.7"), None);
    }
}
