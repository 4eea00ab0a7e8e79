//! Storage Module
//!
//! The contract between a database handle and the engine that owns the
//! file, plus the bundled single-file engine.
//!
//! ## Responsibilities
//! - Open or create the file according to an access flag
//! - Store, fetch, test and delete records by key
//! - Flush to stable storage and reclaim dead space
//! - Report every failure as a call-scoped [`EngineError`]

mod error;
pub mod file;

use std::path::Path;

use crate::datum::Datum;

pub use error::{EngineError, EngineErrorCode, EngineResult};
pub use file::FileEngine;

/// How the engine opens the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessFlag {
    /// Read-only, file must exist
    Read,
    /// Read-write, file must exist
    Write,
    /// Read-write, create if missing
    WriteCreate,
    /// Read-write, always create empty (truncates)
    Truncate,
}

impl AccessFlag {
    pub fn is_writable(self) -> bool {
        !matches!(self, AccessFlag::Read)
    }
}

/// What `store` does when the key is already present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePolicy {
    /// Fail with [`EngineErrorCode::CannotReplace`]
    Insert,
    /// Overwrite the existing value
    Replace,
}

/// Options passed to [`StorageEngine::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub access: AccessFlag,
    /// Block size hint; 0 = filesystem default
    pub block_size: u32,
    /// Permission bits for a created file
    pub permissions: u32,
    /// Sync after every mutation
    pub sync_writes: bool,
}

/// Capabilities a storage engine provides to a database handle
///
/// One value of the implementing type is one open connection to a file.
/// Dropping it releases the connection; `close` does the same but reports
/// a failed final flush.
pub trait StorageEngine: Send + Sized {
    /// Open or create the file at `path`
    fn open(path: &Path, options: &EngineOptions) -> EngineResult<Self>;

    /// Flush and release the connection
    fn close(self) -> EngineResult<()>;

    /// Write a record according to `policy`
    fn store(&mut self, key: &[u8], value: &[u8], policy: StorePolicy) -> EngineResult<()>;

    /// Whether a live record exists for `key`
    fn exists(&mut self, key: &[u8]) -> EngineResult<bool>;

    /// Read the value stored for `key`
    fn fetch(&mut self, key: &[u8]) -> EngineResult<Datum>;

    /// Remove the record for `key`
    fn delete(&mut self, key: &[u8]) -> EngineResult<()>;

    /// Flush pending writes to stable storage
    fn sync(&mut self) -> EngineResult<()>;

    /// Compact the file, reclaiming space held by dead records
    fn reorganize(&mut self) -> EngineResult<()>;

    /// All live keys in ascending order
    fn keys(&self) -> Vec<Datum>;

    /// Number of live records
    fn count(&self) -> usize;
}
