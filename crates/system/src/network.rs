//! Public IP discovery and local port checks.

use crate::Fetcher;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// IP echo services, queried in this order.
pub const IP_ECHO_SERVICES: &[&str] = &[
    "https://ifconfig.me",
    "https://icanhazip.com",
    "https://ipinfo.io/ip",
    "https://api.ipify.org",
    "https://ipecho.net/plain",
];

/// Written into generated files when the public IP is unknown.
pub const PUBLIC_IP_PLACEHOLDER: &str = "YOUR_SERVER_IP";

static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").unwrap());

/// Finds the host's public IPv4 address through external echo services.
pub struct PublicIpResolver {
    fetcher: Arc<dyn Fetcher>,
    endpoints: Vec<String>,
    timeout: Duration,
}

impl PublicIpResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            endpoints: IP_ECHO_SERVICES.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// First valid address from the echo services, if any answered.
    pub async fn try_public_ip(&self) -> Option<String> {
        for endpoint in &self.endpoints {
            match self.fetcher.get_text(endpoint, self.timeout).await {
                Ok(body) => {
                    let candidate = body.trim();
                    if IPV4.is_match(candidate) {
                        return Some(candidate.to_string());
                    }
                    debug!("{} returned an invalid address", endpoint);
                }
                Err(e) => debug!("{} failed: {}", endpoint, e),
            }
        }
        None
    }

    /// Public address, or [`PUBLIC_IP_PLACEHOLDER`] when every service failed.
    pub async fn public_ip(&self) -> String {
        self.try_public_ip()
            .await
            .unwrap_or_else(|| PUBLIC_IP_PLACEHOLDER.to_string())
    }
}

pub fn is_placeholder(ip: &str) -> bool {
    ip == PUBLIC_IP_PLACEHOLDER
}

/// Whether something accepts TCP connections on `127.0.0.1:port`.
pub async fn is_port_listening(port: u16) -> bool {
    let connect = TcpStream::connect(("127.0.0.1", port));
    matches!(
        tokio::time::timeout(Duration::from_secs(1), connect).await,
        Ok(Ok(_))
    )
}
