//! Error types for packbind

use std::fmt;

/// Main error type for packbind operations
#[derive(Debug)]
pub enum PackError {
    /// A source payload could not be read at build time
    BuildInput(String),

    /// Container format error (bad magic/version, out-of-range entry)
    Format(String),

    /// Carrier template missing or not a usable executable image
    Assembly(String),

    /// Failed to extract a payload to a temp file
    Extraction(String),

    /// Every launch strategy for a payload was exhausted
    Launch(String),

    /// IO error
    IoError(std::io::Error),

    /// JSON parsing error
    JsonError(serde_json::Error),

    /// Generic error with message
    Generic(String),
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackError::BuildInput(msg) => write!(f, "Build input error: {msg}"),
            PackError::Format(msg) => write!(f, "Format error: {msg}"),
            PackError::Assembly(msg) => write!(f, "Assembly error: {msg}"),
            PackError::Extraction(msg) => write!(f, "Extraction error: {msg}"),
            PackError::Launch(msg) => write!(f, "Launch error: {msg}"),
            PackError::IoError(err) => write!(f, "IO error: {err}"),
            PackError::JsonError(err) => write!(f, "JSON error: {err}"),
            PackError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PackError {}

impl From<std::io::Error> for PackError {
    fn from(err: std::io::Error) -> Self {
        PackError::IoError(err)
    }
}

impl From<serde_json::Error> for PackError {
    fn from(err: serde_json::Error) -> Self {
        PackError::JsonError(err)
    }
}

impl From<anyhow::Error> for PackError {
    fn from(err: anyhow::Error) -> Self {
        PackError::Generic(err.to_string())
    }
}

/// Result type for packbind operations
pub type Result<T> = std::result::Result<T, PackError>;
