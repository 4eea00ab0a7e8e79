//! Record encoding
//!
//! `[LenCRC: u32][KeyLen: u32][ValLen: u32][CRC: u32][Key][Value]`, all
//! little-endian. `LenCRC` covers the two length fields alone, so a damaged
//! length is caught before it is used to size anything. `CRC` covers the
//! key and the value.

use crate::storage::error::{EngineError, EngineErrorCode, EngineResult};

/// Record header size: LenCRC (4) + KeyLen (4) + ValLen (4) + CRC (4)
pub(crate) const RECORD_HEADER_SIZE: u64 = 16;

/// Sentinel ValLen marking a delete tombstone
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Longest key or value that fits the length fields
pub(crate) const MAX_FIELD_LEN: usize = (u32::MAX - 1) as usize;

/// Parsed record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordHeader {
    pub len_crc: u32,
    pub key_len: u32,
    pub val_len: u32,
    pub crc: u32,
}

impl RecordHeader {
    pub fn parse(bytes: &[u8; RECORD_HEADER_SIZE as usize]) -> Self {
        let field =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            len_crc: field(0),
            key_len: field(4),
            val_len: field(8),
            crc: field(12),
        }
    }

    /// Whether the length fields match their own checksum
    pub fn lengths_intact(&self) -> bool {
        length_checksum(self.key_len, self.val_len) == self.len_crc
    }

    pub fn is_tombstone(&self) -> bool {
        self.val_len == TOMBSTONE_MARKER
    }

    /// Bytes following the header (key plus value, if any)
    pub fn body_len(&self) -> u64 {
        let value_len = if self.is_tombstone() { 0 } else { self.val_len as u64 };
        self.key_len as u64 + value_len
    }

    pub fn record_len(&self) -> u64 {
        RECORD_HEADER_SIZE + self.body_len()
    }
}

/// Reject keys or values whose length can't be encoded
pub(crate) fn check_field_len(data: &[u8]) -> EngineResult<()> {
    if data.len() > MAX_FIELD_LEN {
        return Err(EngineError::with_detail(
            EngineErrorCode::RecordTooLarge,
            format!("{} bytes exceeds {}", data.len(), MAX_FIELD_LEN),
        ));
    }
    Ok(())
}

/// Checksum over the two length fields
pub(crate) fn length_checksum(key_len: u32, val_len: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&key_len.to_le_bytes());
    hasher.update(&val_len.to_le_bytes());
    hasher.finalize()
}

/// Checksum over the key and value
pub(crate) fn checksum(key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Encode a record; `None` encodes a tombstone
///
/// Callers check field lengths first.
pub(crate) fn encode_record(key: &[u8], value: Option<&[u8]>) -> Vec<u8> {
    let key_len = key.len() as u32;
    let (val_len, body) = match value {
        Some(v) => (v.len() as u32, v),
        None => (TOMBSTONE_MARKER, &[][..]),
    };

    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE as usize + key.len() + body.len());
    record.extend_from_slice(&length_checksum(key_len, val_len).to_le_bytes());
    record.extend_from_slice(&key_len.to_le_bytes());
    record.extend_from_slice(&val_len.to_le_bytes());
    record.extend_from_slice(&checksum(key, body).to_le_bytes());
    record.extend_from_slice(key);
    record.extend_from_slice(body);
    record
}
