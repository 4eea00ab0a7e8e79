//! Engine error codes
//!
//! Every engine call reports its own failure. There is no shared
//! "last error" slot, so an error always belongs to the call that raised it.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failure codes reported by a storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorCode {
    BlockSizeError,
    FileOpenError,
    FileWriteError,
    FileSeekError,
    FileReadError,
    FileSyncError,
    BadMagic,
    UnsupportedVersion,
    EmptyDatabase,
    Corrupted,
    ReaderCantStore,
    ReaderCantDelete,
    ReaderCantReorganize,
    CannotReplace,
    ItemNotFound,
    RecordTooLarge,
    ReorganizeFailed,
}

impl EngineErrorCode {
    /// Human-readable rendering of the code
    pub fn message(self) -> &'static str {
        match self {
            EngineErrorCode::BlockSizeError => "Block size error",
            EngineErrorCode::FileOpenError => "File open error",
            EngineErrorCode::FileWriteError => "File write error",
            EngineErrorCode::FileSeekError => "File seek error",
            EngineErrorCode::FileReadError => "File read error",
            EngineErrorCode::FileSyncError => "File sync error",
            EngineErrorCode::BadMagic => "Bad magic number",
            EngineErrorCode::UnsupportedVersion => "Unsupported file format version",
            EngineErrorCode::EmptyDatabase => "Database file is empty",
            EngineErrorCode::Corrupted => "Database file is corrupted",
            EngineErrorCode::ReaderCantStore => "Reader can't store",
            EngineErrorCode::ReaderCantDelete => "Reader can't delete",
            EngineErrorCode::ReaderCantReorganize => "Reader can't reorganize",
            EngineErrorCode::CannotReplace => "Cannot replace",
            EngineErrorCode::ItemNotFound => "Item not found",
            EngineErrorCode::RecordTooLarge => "Record too large",
            EngineErrorCode::ReorganizeFailed => "Reorganize failed",
        }
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A failure from one engine call
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineError {
    code: EngineErrorCode,
    message: String,
    #[source]
    source: Option<io::Error>,
}

impl EngineError {
    pub fn new(code: EngineErrorCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
            source: None,
        }
    }

    /// Error with extra context appended to the code's message
    pub fn with_detail(code: EngineErrorCode, detail: impl fmt::Display) -> Self {
        Self {
            code,
            message: format!("{}: {}", code.message(), detail),
            source: None,
        }
    }

    /// Error caused by an I/O failure
    pub fn io(code: EngineErrorCode, source: io::Error) -> Self {
        Self {
            code,
            message: format!("{}: {}", code.message(), source),
            source: Some(source),
        }
    }

    pub fn code(&self) -> EngineErrorCode {
        self.code
    }

    /// Underlying I/O error kind, if this error came from the OS
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        self.source.as_ref().map(io::Error::kind)
    }
}
