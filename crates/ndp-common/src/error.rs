//! Error types for NDP

use thiserror::Error;

/// Result type alias for NDP operations
pub type Result<T> = std::result::Result<T, NdpError>;

/// Main error type for NDP
#[derive(Error, Debug)]
pub enum NdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unrecognized chromosome: {0}")]
    UnknownChromosome(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
