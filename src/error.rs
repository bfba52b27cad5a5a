//! Crate-level error types.

use std::fmt;

use crate::renderer::BakeError;

/// Errors produced by the passbake crate.
#[derive(Debug)]
pub enum PassbakeError {
    /// The pass chain could not be baked; the previous schedule stays.
    Bake(BakeError),
    /// TOML configuration parsing/serialization failure.
    ConfigParse(String),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// GPU device or adapter could not be acquired.
    Device(String),
}

impl fmt::Display for PassbakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bake(e) => write!(f, "bake failed: {e}"),
            Self::ConfigParse(msg) => {
                write!(f, "config parse error: {msg}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Device(msg) => write!(f, "GPU device error: {msg}"),
        }
    }
}

impl std::error::Error for PassbakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bake(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BakeError> for PassbakeError {
    fn from(e: BakeError) -> Self {
        Self::Bake(e)
    }
}

impl From<std::io::Error> for PassbakeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
