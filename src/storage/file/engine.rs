//! FileEngine
//!
//! The bundled [`StorageEngine`]: one open file, one in-memory index.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::datum::Datum;
use crate::storage::error::{EngineError, EngineErrorCode, EngineResult};
use crate::storage::{AccessFlag, EngineOptions, StorageEngine, StorePolicy};

use super::record::{check_field_len, encode_record, RECORD_HEADER_SIZE};
use super::scan::scan;
use super::{
    FileHeader, RecordPointer, FALLBACK_BLOCK_SIZE, HEADER_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};

/// Single-file storage engine
///
/// ## Layout in memory
/// - `index`: live key → location of its latest value
/// - `end_offset`: where the next record is appended
/// - `dead_bytes`: space `reorganize` would reclaim
pub struct FileEngine {
    /// Path of the database file
    path: PathBuf,

    /// Open file handle (read-only in `AccessFlag::Read`)
    file: File,

    /// Access flag the file was opened with
    access: AccessFlag,

    /// Block size recorded in the header
    block_size: u32,

    /// Sync after every append
    sync_writes: bool,

    index: HashMap<Vec<u8>, RecordPointer>,
    end_offset: u64,
    dead_bytes: u64,
}

impl FileEngine {
    /// Suffix of the scratch file written by `reorganize`
    const REORG_SUFFIX: &'static str = ".reorg";

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Logical file length (header plus all complete records)
    pub fn file_len(&self) -> u64 {
        self.end_offset
    }

    /// Bytes held by overwritten records and tombstones
    pub fn dead_bytes(&self) -> u64 {
        self.dead_bytes
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn open_file(path: &Path, options: &EngineOptions) -> EngineResult<File> {
        let mut open_options = OpenOptions::new();
        open_options.read(true);
        match options.access {
            AccessFlag::Read => {}
            AccessFlag::Write => {
                open_options.write(true);
            }
            AccessFlag::WriteCreate => {
                open_options.write(true).create(true);
            }
            AccessFlag::Truncate => {
                open_options.write(true).create(true).truncate(true);
            }
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open_options.mode(options.permissions);
        }

        open_options
            .open(path)
            .map_err(|e| EngineError::io(EngineErrorCode::FileOpenError, e))
    }

    /// Reject block size hints no file could be created with
    fn check_block_size_hint(hint: u32) -> EngineResult<()> {
        if hint > MAX_BLOCK_SIZE {
            return Err(EngineError::with_detail(
                EngineErrorCode::BlockSizeError,
                format!("{} exceeds maximum of {}", hint, MAX_BLOCK_SIZE),
            ));
        }
        Ok(())
    }

    /// Resolve a block size hint for a file being created
    fn resolve_block_size(hint: u32, file: &File) -> u32 {
        let size = if hint == 0 {
            Self::filesystem_block_size(file)
        } else {
            hint
        };
        size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)
    }

    #[cfg(unix)]
    fn filesystem_block_size(file: &File) -> u32 {
        use std::os::unix::fs::MetadataExt;

        file.metadata()
            .ok()
            .and_then(|m| u32::try_from(m.blksize()).ok())
            .filter(|&size| size > 0 && size <= MAX_BLOCK_SIZE)
            .unwrap_or(FALLBACK_BLOCK_SIZE)
    }

    #[cfg(not(unix))]
    fn filesystem_block_size(_file: &File) -> u32 {
        FALLBACK_BLOCK_SIZE
    }

    /// Write a fresh header into an empty file
    fn initialize(file: &mut File, block_size: u32) -> EngineResult<()> {
        let header = FileHeader::new(block_size).encode()?;
        file.write_all(&header)
            .map_err(|e| EngineError::io(EngineErrorCode::FileWriteError, e))?;
        file.sync_all()
            .map_err(|e| EngineError::io(EngineErrorCode::FileSyncError, e))
    }

    fn read_header(file: &mut File, file_len: u64) -> EngineResult<FileHeader> {
        if file_len < HEADER_SIZE {
            return Err(EngineError::with_detail(
                EngineErrorCode::BadMagic,
                format!("file is {} bytes, shorter than the header", file_len),
            ));
        }

        let mut bytes = [0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))
            .map_err(|e| EngineError::io(EngineErrorCode::FileSeekError, e))?;
        file.read_exact(&mut bytes)
            .map_err(|e| EngineError::io(EngineErrorCode::FileReadError, e))?;

        FileHeader::decode(&bytes)
    }

    /// Append an encoded record, returning its offset
    ///
    /// A failed write or sync is rolled back to the previous end of file,
    /// so the index, `end_offset` and the file stay in step.
    fn append(&mut self, record: &[u8]) -> EngineResult<u64> {
        self.append_with_sync(record, File::sync_data)
    }

    fn append_with_sync<F>(&mut self, record: &[u8], sync: F) -> EngineResult<u64>
    where
        F: FnOnce(&File) -> std::io::Result<()>,
    {
        let offset = self.end_offset;

        let written = self
            .file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| EngineError::io(EngineErrorCode::FileSeekError, e))
            .and_then(|_| {
                self.file
                    .write_all(record)
                    .map_err(|e| EngineError::io(EngineErrorCode::FileWriteError, e))
            });

        let synced = written.and_then(|_| {
            if self.sync_writes {
                sync(&self.file).map_err(|e| EngineError::io(EngineErrorCode::FileSyncError, e))
            } else {
                Ok(())
            }
        });

        if let Err(e) = synced {
            self.roll_back_append(offset);
            return Err(e);
        }

        self.end_offset = offset + record.len() as u64;
        Ok(offset)
    }

    fn roll_back_append(&mut self, offset: u64) {
        if let Err(rollback) = self.file.set_len(offset) {
            tracing::warn!(
                "Failed to roll back partial append at offset {} in {}: {}",
                offset,
                self.path.display(),
                rollback
            );
        }
        self.end_offset = offset;
    }

    fn read_value(&mut self, pointer: RecordPointer) -> EngineResult<Vec<u8>> {
        let mut value = vec![0u8; pointer.value_len as usize];
        self.file
            .seek(SeekFrom::Start(pointer.value_offset))
            .map_err(|e| EngineError::io(EngineErrorCode::FileSeekError, e))?;
        self.file
            .read_exact(&mut value)
            .map_err(|e| EngineError::io(EngineErrorCode::FileReadError, e))?;
        Ok(value)
    }

    fn reorg_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(Self::REORG_SUFFIX);
        PathBuf::from(name)
    }

    /// Write every live record, sorted by key, into a new file at `target`
    ///
    /// Returns the synced file (open read-write), its index and end offset.
    fn write_compacted(&mut self, target: &Path) -> EngineResult<Compacted> {
        let out = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(target)
            .map_err(|e| EngineError::io(EngineErrorCode::FileOpenError, e))?;

        let permissions = self
            .file
            .metadata()
            .map_err(|e| EngineError::io(EngineErrorCode::ReorganizeFailed, e))?
            .permissions();
        out.set_permissions(permissions)
            .map_err(|e| EngineError::io(EngineErrorCode::ReorganizeFailed, e))?;

        let mut writer = BufWriter::with_capacity(self.block_size as usize, out);
        writer
            .write_all(&FileHeader::new(self.block_size).encode()?)
            .map_err(|e| EngineError::io(EngineErrorCode::FileWriteError, e))?;

        let mut keys: Vec<Vec<u8>> = self.index.keys().cloned().collect();
        keys.sort();

        let mut index = HashMap::with_capacity(keys.len());
        let mut offset = HEADER_SIZE;

        for key in keys {
            let pointer = self.index[&key];
            let value = self.read_value(pointer)?;
            let record = encode_record(&key, Some(value.as_slice()));

            writer
                .write_all(&record)
                .map_err(|e| EngineError::io(EngineErrorCode::FileWriteError, e))?;

            let value_offset = offset + RECORD_HEADER_SIZE + key.len() as u64;
            index.insert(
                key,
                RecordPointer {
                    value_offset,
                    value_len: pointer.value_len,
                    record_len: record.len() as u64,
                },
            );
            offset += record.len() as u64;
        }

        let out = writer
            .into_inner()
            .map_err(|e| EngineError::io(EngineErrorCode::FileWriteError, e.into_error()))?;
        out.sync_all()
            .map_err(|e| EngineError::io(EngineErrorCode::FileSyncError, e))?;

        Ok(Compacted {
            file: out,
            index,
            end_offset: offset,
        })
    }
}

/// Output of `write_compacted`
struct Compacted {
    file: File,
    index: HashMap<Vec<u8>, RecordPointer>,
    end_offset: u64,
}

impl StorageEngine for FileEngine {
    /// Open or create the file
    ///
    /// On open:
    /// 1. Open the file per the access flag (create/truncate as needed)
    /// 2. Write a header into an empty file, or validate the existing one
    /// 3. Scan records to rebuild the index
    /// 4. Drop a torn trailing record (truncating it when writable)
    fn open(path: &Path, options: &EngineOptions) -> EngineResult<Self> {
        Self::check_block_size_hint(options.block_size)?;
        let mut file = Self::open_file(path, options)?;
        let file_len = file
            .metadata()
            .map_err(|e| EngineError::io(EngineErrorCode::FileOpenError, e))?
            .len();

        let block_size = if file_len == 0 {
            if !options.access.is_writable() {
                return Err(EngineError::new(EngineErrorCode::EmptyDatabase));
            }
            let block_size = Self::resolve_block_size(options.block_size, &file);
            Self::initialize(&mut file, block_size)?;
            tracing::debug!(
                "Initialized {} with block size {}",
                path.display(),
                block_size
            );
            block_size
        } else {
            Self::read_header(&mut file, file_len)?.block_size
        };

        let file_len = file_len.max(HEADER_SIZE);
        let result = scan(&file, file_len, block_size as usize)?;

        if result.torn_bytes > 0 {
            if options.access.is_writable() {
                tracing::warn!(
                    "Truncating {} torn bytes at offset {} in {}",
                    result.torn_bytes,
                    result.valid_end,
                    path.display()
                );
                file.set_len(result.valid_end)
                    .map_err(|e| EngineError::io(EngineErrorCode::FileWriteError, e))?;
            } else {
                tracing::warn!(
                    "Ignoring {} torn bytes at offset {} in read-only {}",
                    result.torn_bytes,
                    result.valid_end,
                    path.display()
                );
            }
        }

        tracing::debug!(
            "Opened {} ({:?}): {} records scanned, {} live keys, {} dead bytes",
            path.display(),
            options.access,
            result.records_read,
            result.index.len(),
            result.dead_bytes
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            access: options.access,
            block_size,
            sync_writes: options.sync_writes,
            index: result.index,
            end_offset: result.valid_end,
            dead_bytes: result.dead_bytes,
        })
    }

    fn close(self) -> EngineResult<()> {
        if self.access.is_writable() {
            self.file
                .sync_all()
                .map_err(|e| EngineError::io(EngineErrorCode::FileSyncError, e))?;
        }
        tracing::debug!("Closed {}", self.path.display());
        Ok(())
    }

    fn store(&mut self, key: &[u8], value: &[u8], policy: StorePolicy) -> EngineResult<()> {
        if !self.access.is_writable() {
            return Err(EngineError::new(EngineErrorCode::ReaderCantStore));
        }
        check_field_len(key)?;
        check_field_len(value)?;

        let previous = self.index.get(key).copied();
        if previous.is_some() && policy == StorePolicy::Insert {
            return Err(EngineError::new(EngineErrorCode::CannotReplace));
        }

        let record = encode_record(key, Some(value));
        let offset = self.append(&record)?;

        if let Some(old) = previous {
            self.dead_bytes += old.record_len;
        }
        self.index.insert(
            key.to_vec(),
            RecordPointer {
                value_offset: offset + RECORD_HEADER_SIZE + key.len() as u64,
                value_len: value.len() as u32,
                record_len: record.len() as u64,
            },
        );

        Ok(())
    }

    fn exists(&mut self, key: &[u8]) -> EngineResult<bool> {
        Ok(self.index.contains_key(key))
    }

    fn fetch(&mut self, key: &[u8]) -> EngineResult<Datum> {
        let pointer = self
            .index
            .get(key)
            .copied()
            .ok_or_else(|| EngineError::new(EngineErrorCode::ItemNotFound))?;

        self.read_value(pointer).map(Datum::from)
    }

    fn delete(&mut self, key: &[u8]) -> EngineResult<()> {
        if !self.access.is_writable() {
            return Err(EngineError::new(EngineErrorCode::ReaderCantDelete));
        }

        let previous = self
            .index
            .get(key)
            .copied()
            .ok_or_else(|| EngineError::new(EngineErrorCode::ItemNotFound))?;

        let tombstone = encode_record(key, None);
        self.append(&tombstone)?;

        self.index.remove(key);
        self.dead_bytes += previous.record_len + tombstone.len() as u64;

        Ok(())
    }

    fn sync(&mut self) -> EngineResult<()> {
        if !self.access.is_writable() {
            return Ok(());
        }
        self.file
            .sync_data()
            .map_err(|e| EngineError::io(EngineErrorCode::FileSyncError, e))
    }

    /// Rewrite the file with only live records
    ///
    /// Steps:
    /// 1. Write live records to `<path>.reorg` and sync it
    /// 2. Rename it over the original
    /// 3. Swap in the scratch file's handle and the new index
    ///
    /// Nothing is reopened after the rename; the handle that wrote the
    /// scratch file is the one that now names `path`.
    fn reorganize(&mut self) -> EngineResult<()> {
        if !self.access.is_writable() {
            return Err(EngineError::new(EngineErrorCode::ReaderCantReorganize));
        }

        let scratch = self.reorg_path();
        let compacted = match self.write_compacted(&scratch) {
            Ok(compacted) => compacted,
            Err(e) => {
                let _ = fs::remove_file(&scratch);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&scratch, &self.path) {
            let _ = fs::remove_file(&scratch);
            return Err(EngineError::io(EngineErrorCode::ReorganizeFailed, e));
        }

        let reclaimed = self.end_offset.saturating_sub(compacted.end_offset);
        self.file = compacted.file;
        self.index = compacted.index;
        self.end_offset = compacted.end_offset;
        self.dead_bytes = 0;

        tracing::info!(
            "Reorganized {}: {} live keys, {} bytes reclaimed",
            self.path.display(),
            self.index.len(),
            reclaimed
        );

        Ok(())
    }

    fn keys(&self) -> Vec<Datum> {
        let mut keys: Vec<&Vec<u8>> = self.index.keys().collect();
        keys.sort();
        keys.into_iter().map(|k| Datum::copy_from_slice(k)).collect()
    }

    fn count(&self) -> usize {
        self.index.len()
    }
}
