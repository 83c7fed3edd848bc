//! Plaintext connection report handed to proxy users.

use crate::renderer::ConfigRenderer;
use handlebars::{no_escape, Handlebars};
use serde::Serialize;
use std::path::Path;
use tracing::debug;
use wte_common::fs::{remove_if_exists, write_file_with_mode};
use wte_common::{Error, Result, Timestamp};
use wte_config::ServiceConfig;

const TEMPLATE: &str = r#"================================================================================
  PROXY SERVER CREDENTIALS
================================================================================
  Generated: {{generated_at}}
  Server IP: {{server_ip}}
  Generator: WTE
{{#if http}}

--- HTTP PROXY -----------------------------------------------------------------
  Host:     {{server_ip}}
  Port:     {{http.port}}
{{#if http.auth}}
  Username: {{http.auth.username}}
  Password: {{http.auth.password}}
{{else}}
  Authentication: Disabled
{{/if}}
  Full URL: {{http.url}}

  Test command:
  curl -x {{http.url}} https://ifconfig.me
{{/if}}
{{#if https}}

--- HTTPS PROXY (TLS) ----------------------------------------------------------
  Host:     {{server_ip}}
  Port:     {{https.port}}
{{#if https.auth}}
  Username: {{https.auth.username}}
  Password: {{https.auth.password}}
{{/if}}
  Certificate: {{https.cert_path}} (self-signed, clients may warn)
{{/if}}
{{#if shadowsocks}}

--- SHADOWSOCKS ----------------------------------------------------------------
  Server:   {{server_ip}}
  Port:     {{shadowsocks.port}}
  Password: {{shadowsocks.password}}
  Method:   {{shadowsocks.method}}

  SS URI (for import):
  {{shadowsocks.uri}}

  Clients: Shadowrocket (iOS), v2rayNG (Android), v2rayN (Windows),
           ShadowsocksX-NG (macOS), shadowsocks-rust (Linux)
{{/if}}

--- MANAGEMENT -----------------------------------------------------------------
  Check status:     wte status
  View logs:        wte logs -f
  Restart service:  wte restart
  Stop service:     wte stop
  Edit config:      wte config edit
  Show this report: wte credentials
  Uninstall:        wte uninstall
================================================================================
"#;

#[derive(Serialize)]
struct Auth<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct HttpSection<'a> {
    port: u16,
    auth: Option<Auth<'a>>,
    url: String,
}

#[derive(Serialize)]
struct HttpsSection<'a> {
    port: u16,
    auth: Option<Auth<'a>>,
    cert_path: String,
}

#[derive(Serialize)]
struct ShadowsocksSection<'a> {
    port: u16,
    method: &'a str,
    password: &'a str,
    uri: String,
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    server_ip: &'a str,
    http: Option<HttpSection<'a>>,
    https: Option<HttpsSection<'a>>,
    shadowsocks: Option<ShadowsocksSection<'a>>,
}

/// Connection details for every enabled service.
pub struct CredentialsReport<'a> {
    cfg: &'a ServiceConfig,
    server_ip: &'a str,
}

impl<'a> CredentialsReport<'a> {
    pub fn new(cfg: &'a ServiceConfig, server_ip: &'a str) -> Self {
        Self { cfg, server_ip }
    }

    /// `http://user:pass@ip:port`, or without credentials when auth is off.
    pub fn http_url(&self) -> String {
        let http = &self.cfg.http;
        if http.auth.enabled {
            format!(
                "http://{}:{}@{}:{}",
                http.auth.username, http.auth.password, self.server_ip, http.port
            )
        } else {
            format!("http://{}:{}", self.server_ip, http.port)
        }
    }

    fn report(&self, generated_at: &Timestamp) -> Report<'_> {
        let cfg = self.cfg;

        let http = cfg.http.enabled.then(|| HttpSection {
            port: cfg.http.port,
            auth: cfg.http.auth.enabled.then(|| Auth {
                username: &cfg.http.auth.username,
                password: &cfg.http.auth.password,
            }),
            url: self.http_url(),
        });

        let https = cfg.https.enabled.then(|| {
            let auth = cfg.effective_https_auth();
            HttpsSection {
                port: cfg.https.port,
                auth: auth.enabled.then(|| Auth {
                    username: &auth.username,
                    password: &auth.password,
                }),
                cert_path: cfg.https.cert_path.display().to_string(),
            }
        });

        let shadowsocks = ConfigRenderer::new(cfg)
            .shadowsocks_uri(self.server_ip)
            .map(|uri| ShadowsocksSection {
                port: cfg.shadowsocks.port,
                method: &cfg.shadowsocks.method,
                password: &cfg.shadowsocks.password,
                uri,
            });

        Report {
            generated_at: generated_at.to_display(),
            server_ip: self.server_ip,
            http,
            https,
            shadowsocks,
        }
    }

    pub fn render(&self) -> Result<String> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars
            .render_template(TEMPLATE, &self.report(&Timestamp::now()))
            .map_err(|e| Error::Template(e.to_string()))
    }

    /// Write the report, readable by root only.
    pub fn save(&self, path: &Path) -> Result<()> {
        let report = self.render()?;
        write_file_with_mode(path, report.as_bytes(), 0o600)?;
        debug!("Credentials saved to {:?}", path);
        Ok(())
    }

    /// Delete a saved report. Returns whether it existed.
    pub fn remove(path: &Path) -> Result<bool> {
        remove_if_exists(path)
    }
}
