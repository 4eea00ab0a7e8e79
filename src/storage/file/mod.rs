//! File Engine
//!
//! Append-only single-file record store with an in-memory key index.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (12 bytes, bincode fixed-int, little-endian)         │
//! │   Magic: "ADBM" (4) | Version: u16 (2) | BlockSize: u32 (4) │
//! │   Reserved: u16 (2)                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Records (variable, appended in write order)                 │
//! │   [LenCRC: u32][KeyLen: u32][ValLen: u32][CRC: u32]         │
//! │   [Key][Value]                                              │
//! │   ... repeated ...                                          │
//! │   (ValLen = u32::MAX means delete tombstone, no value)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The latest record for a key wins. Overwritten and deleted records stay
//! in the file as dead space until `reorganize` rewrites it.

mod engine;
mod record;
mod scan;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineErrorCode, EngineResult};

pub use engine::FileEngine;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying an AtlasDBM file
pub(crate) const MAGIC: [u8; 4] = *b"ADBM";

/// Current file format version
///
/// Version 2 added the separate checksum over record length fields.
pub(crate) const VERSION: u16 = 2;

/// Header size: Magic (4) + Version (2) + BlockSize (4) + Reserved (2)
pub(crate) const HEADER_SIZE: u64 = 12;

/// Smallest block size honored; smaller hints are raised to this
pub const MIN_BLOCK_SIZE: u32 = 512;

/// Largest block size accepted
pub const MAX_BLOCK_SIZE: u32 = 16 * 1024 * 1024;

/// Block size used when the filesystem doesn't report one
pub(crate) const FALLBACK_BLOCK_SIZE: u32 = 4096;

// =============================================================================
// File Header
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct FileHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub block_size: u32,
    pub reserved: u16,
}

impl FileHeader {
    pub fn new(block_size: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            block_size,
            reserved: 0,
        }
    }

    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| EngineError::with_detail(EngineErrorCode::FileWriteError, e))
    }

    /// Decode and validate a header
    pub fn decode(bytes: &[u8]) -> EngineResult<Self> {
        let header: FileHeader = bincode::deserialize(bytes)
            .map_err(|e| EngineError::with_detail(EngineErrorCode::BadMagic, e))?;

        if header.magic != MAGIC {
            return Err(EngineError::with_detail(
                EngineErrorCode::BadMagic,
                format!("expected {:?}, got {:?}", MAGIC, header.magic),
            ));
        }
        if header.version != VERSION {
            return Err(EngineError::with_detail(
                EngineErrorCode::UnsupportedVersion,
                header.version,
            ));
        }
        if header.block_size < MIN_BLOCK_SIZE || header.block_size > MAX_BLOCK_SIZE {
            return Err(EngineError::with_detail(
                EngineErrorCode::Corrupted,
                format!("stored block size {} out of range", header.block_size),
            ));
        }

        Ok(header)
    }
}

/// Location of a live value in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordPointer {
    /// Offset of the first value byte
    pub value_offset: u64,
    pub value_len: u32,
    /// Full on-disk size of the record holding the value
    pub record_len: u64,
}
