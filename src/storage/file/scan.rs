//! Open-time scan
//!
//! Walks every record after the header to rebuild the key index.
//!
//! A record cut short by the end of the file is a torn write from an
//! interrupted append; the scan stops there and reports the tail. Only a
//! tail shorter than a record header, or a record whose verified lengths
//! run past the end of the file, counts as torn. A header whose lengths
//! fail their checksum, or a record whose body checksum doesn't match, is
//! corruption.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::storage::error::{EngineError, EngineErrorCode, EngineResult};

use super::record::{checksum, RecordHeader, RECORD_HEADER_SIZE};
use super::{RecordPointer, HEADER_SIZE};

/// Outcome of scanning a database file
#[derive(Debug, Default)]
pub(crate) struct ScanResult {
    /// Live key → value location
    pub index: HashMap<Vec<u8>, RecordPointer>,

    /// Complete records read (values and tombstones)
    pub records_read: u64,

    /// Bytes held by overwritten records and tombstones
    pub dead_bytes: u64,

    /// Offset just past the last complete record
    pub valid_end: u64,

    /// Bytes after `valid_end` belonging to a torn record
    pub torn_bytes: u64,
}

/// Scan `file` (of length `file_len`) starting after the header
pub(crate) fn scan(file: &File, file_len: u64, buffer_size: usize) -> EngineResult<ScanResult> {
    let mut reader = BufReader::with_capacity(buffer_size, file);
    reader
        .seek(SeekFrom::Start(HEADER_SIZE))
        .map_err(|e| EngineError::io(EngineErrorCode::FileSeekError, e))?;

    let mut result = ScanResult {
        valid_end: HEADER_SIZE,
        ..ScanResult::default()
    };
    let mut offset = HEADER_SIZE;

    while offset < file_len {
        if file_len - offset < RECORD_HEADER_SIZE {
            break;
        }

        let mut header_bytes = [0u8; RECORD_HEADER_SIZE as usize];
        read_exact(&mut reader, &mut header_bytes)?;
        let header = RecordHeader::parse(&header_bytes);

        if !header.lengths_intact() {
            return Err(EngineError::with_detail(
                EngineErrorCode::Corrupted,
                format!("length checksum mismatch in record at offset {}", offset),
            ));
        }

        if offset + header.record_len() > file_len {
            break;
        }

        let mut key = vec![0u8; header.key_len as usize];
        read_exact(&mut reader, &mut key)?;

        let mut value = Vec::new();
        if !header.is_tombstone() {
            value.resize(header.val_len as usize, 0);
            read_exact(&mut reader, &mut value)?;
        }

        if checksum(&key, &value) != header.crc {
            return Err(EngineError::with_detail(
                EngineErrorCode::Corrupted,
                format!("checksum mismatch in record at offset {}", offset),
            ));
        }

        let record_len = header.record_len();
        if header.is_tombstone() {
            if let Some(old) = result.index.remove(&key) {
                result.dead_bytes += old.record_len;
            }
            result.dead_bytes += record_len;
        } else {
            let pointer = RecordPointer {
                value_offset: offset + RECORD_HEADER_SIZE + header.key_len as u64,
                value_len: header.val_len,
                record_len,
            };
            if let Some(old) = result.index.insert(key, pointer) {
                result.dead_bytes += old.record_len;
            }
        }

        offset += record_len;
        result.records_read += 1;
        result.valid_end = offset;
    }

    result.torn_bytes = file_len - result.valid_end;
    Ok(result)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> EngineResult<()> {
    reader
        .read_exact(buf)
        .map_err(|e| EngineError::io(EngineErrorCode::FileReadError, e))
}
