//! Management of the GOST proxy daemon: installing its release binary,
//! rendering its configuration and producing the credentials report.

pub mod credentials;
pub mod installer;
pub mod renderer;

pub use credentials::CredentialsReport;
pub use installer::{ArtifactInstaller, Verification};
pub use renderer::ConfigRenderer;
