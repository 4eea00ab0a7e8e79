//! Error types for AtlasDBM
//!
//! Provides the caller-facing error taxonomy. Engine failures arrive as a
//! call-scoped [`EngineError`] and are translated here, right at the call
//! site, into one of the variants below.

use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

use crate::storage::{EngineError, EngineErrorCode};

/// Result type alias using DbmError
pub type Result<T> = std::result::Result<T, DbmError>;

/// Unified error type for AtlasDBM operations
#[derive(Debug, Error)]
pub enum DbmError {
    // -------------------------------------------------------------------------
    // Open Errors
    // -------------------------------------------------------------------------
    #[error("Invalid access mode: {0:?} (expected one of r, w, c, n)")]
    InvalidMode(String),

    #[error("Failed to open {}: {source}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Key already exists")]
    KeyExists,

    #[error("Key not found")]
    NotFound,

    #[error("Write not permitted: {operation} on a read-only handle")]
    WriteNotPermitted { operation: &'static str },

    #[error("Value is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Engine error: {0}")]
    Engine(EngineError),
}

impl DbmError {
    /// Translate an engine failure from the named operation
    pub(crate) fn from_engine(operation: &'static str, err: EngineError) -> Self {
        match err.code() {
            EngineErrorCode::ItemNotFound => DbmError::NotFound,
            EngineErrorCode::CannotReplace => DbmError::KeyExists,
            EngineErrorCode::ReaderCantStore
            | EngineErrorCode::ReaderCantDelete
            | EngineErrorCode::ReaderCantReorganize => DbmError::WriteNotPermitted { operation },
            _ => DbmError::Engine(err),
        }
    }

    /// Wrap an engine failure raised while opening `path`
    pub(crate) fn open_failed(path: impl Into<PathBuf>, source: EngineError) -> Self {
        DbmError::OpenFailed {
            path: path.into(),
            source,
        }
    }
}
