//! Crate-level error type.
//!
//! Format parsing has its own `PeError`; this type wraps it together with
//! file and configuration failures for callers that drive the
//! whole pipeline.

use thiserror::Error;

use crate::formats::pe::PeError;
use crate::io::error::IoError;

/// Main error type for listing operations.
#[derive(Debug, Error)]
pub enum ListingError {
    /// PE structure errors
    #[error(transparent)]
    Pe(#[from] PeError),

    /// Input loading and report writing errors
    #[error(transparent)]
    Io(#[from] IoError),

    /// Raw file errors outside `SafeReader`
    #[error("I/O error: {0}")]
    StdIo(#[from] std::io::Error),

    /// Invalid configuration file
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for listing operations
pub type Result<T> = std::result::Result<T, ListingError>;
