//! Host adapters for wte.
//!
//! Everything that touches the operating system goes through the narrow
//! seams defined here: [`CommandRunner`] for external tools and [`Fetcher`]
//! for HTTP. Platform and network probing, the firewall backends and the
//! systemd supervisor are built on top of them.

pub mod executor;
pub mod fetch;
pub mod firewall;
pub mod network;
pub mod platform;
pub mod systemd;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use executor::{CommandOutput, CommandRunner, LocalRunner};
pub use fetch::{Fetcher, HttpFetcher};
pub use firewall::{ApplyOutcome, FirewallBackend, FirewallController, FirewallReport};
pub use network::{is_port_listening, PublicIpResolver, PUBLIC_IP_PLACEHOLDER};
pub use platform::{is_root, ArtifactArch, PackageManager, PlatformInfo};
pub use systemd::{ServiceController, ServiceStatus, SystemdController};
