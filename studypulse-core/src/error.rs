//! Error types for studypulse-core
//!
//! The analytics computation itself never fails; these errors belong to the
//! surrounding surface (configuration, record sources, filters, logging).

use thiserror::Error;

/// Main error type for the studypulse-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed record export
    #[error("parse error in {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// File watcher error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid filter expression
    #[error("invalid filter: {0}")]
    Filter(String),
}

/// Result type alias for studypulse-core
pub type Result<T> = std::result::Result<T, Error>;
