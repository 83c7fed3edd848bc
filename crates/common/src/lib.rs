//! Common utilities and types shared across wte crates.

pub mod archive;
pub mod error;
pub mod fs;
pub mod hash;
pub mod timestamp;

pub use error::{Error, Result};
pub use timestamp::Timestamp;
