//! Timestamp utilities.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A wrapper around the local wall-clock time used in generated artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Local>);

impl Timestamp {
    /// Create a new timestamp from the current time.
    pub fn now() -> Self {
        Timestamp(Local::now())
    }

    /// Create a timestamp from a DateTime<Local>.
    pub fn from_datetime(dt: DateTime<Local>) -> Self {
        Timestamp(dt)
    }

    /// Format for headers of generated files (`2024-01-31 13:05:09`).
    pub fn to_display(&self) -> String {
        self.0.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Format for backup file suffixes (`20240131_130509`).
    pub fn to_backup_suffix(&self) -> String {
        self.0.format("%Y%m%d_%H%M%S").to_string()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display())
    }
}
