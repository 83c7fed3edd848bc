//! Common error types for wte.

use thiserror::Error;

/// Common error type for wte operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Unable to detect operating system: {0}")]
    OsDetection(String),

    #[error("Download failed: {url} - {reason}")]
    Download { url: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("At least one service must be enabled")]
    NoServiceEnabled,

    #[error("Port {port} conflict: {service} and {existing}")]
    PortConflict {
        port: u16,
        service: String,
        existing: String,
    },

    #[error("Unknown configuration key: {0}")]
    UnknownConfigKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Command execution failed: {cmd} - {reason}")]
    CommandExecution { cmd: String, reason: String },

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("No checksum available for {0} (use --skip-verify to install anyway)")]
    ChecksumUnavailable(String),

    #[error("{0} not found in archive")]
    NotFoundInArchive(String),

    #[error("No release asset found for {os}/{arch}")]
    AssetNotFound { os: String, arch: String },

    #[error("Failed to replace executable: {0}")]
    Swap(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("This command must be run as root")]
    NotRoot,

    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

impl Error {
    /// Build a `CommandExecution` error from a program and its arguments.
    pub fn command(program: &str, args: &[&str], reason: impl Into<String>) -> Self {
        let cmd = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        Error::CommandExecution {
            cmd,
            reason: reason.into(),
        }
    }
}
