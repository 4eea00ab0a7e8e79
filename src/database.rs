//! Database Module
//!
//! The handle callers hold: one open engine connection plus the access
//! mode it was opened with.
//!
//! ## Responsibilities
//! - Map the requested access mode to an engine open flag
//! - Reject mutations on read-only handles
//! - Marshal keys and values into length-tagged bytes and back
//! - Translate each engine failure right where it happens

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::{DatabaseConfig, OpenMode};
use crate::datum::Datum;
use crate::error::{DbmError, Result};
use crate::storage::{FileEngine, StorageEngine, StorePolicy};

/// An open database file
///
/// ## Concurrency Model
///
/// Every engine call runs under one mutex per handle, so a call and the
/// error it produces are a single unit and a handle can be shared across
/// threads (`Arc<Database>`). Calls are synchronous and blocking.
///
/// ## Lifecycle
///
/// A handle exists only once the engine has opened the file. `close`
/// consumes it; dropping an unclosed handle releases the connection too,
/// without reporting a failed final flush.
pub struct Database<E: StorageEngine = FileEngine> {
    /// Path the handle was opened with
    path: PathBuf,

    /// Access mode, fixed for the handle's lifetime
    mode: OpenMode,

    /// The engine connection
    engine: Mutex<E>,
}

impl Database<FileEngine> {
    /// Open with a mode letter (`r`, `w`, `c`, `n`)
    ///
    /// Uses the filesystem's block size and permissions `0o666`.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        let mode: OpenMode = mode.parse()?;
        Self::open_with_config(path, DatabaseConfig::new(mode))
    }

    /// Open with a full configuration
    pub fn open_with_config(path: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        Self::open_with_engine(path, config)
    }
}

impl<E: StorageEngine> Database<E> {
    /// Open with an explicit engine type
    pub fn open_with_engine(path: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        let path = path.as_ref();
        let options = config.engine_options();

        let engine = E::open(path, &options).map_err(|e| DbmError::open_failed(path, e))?;

        tracing::debug!("Opened {} in {} mode", path.display(), config.mode);

        Ok(Self {
            path: path.to_path_buf(),
            mode: config.mode,
            engine: Mutex::new(engine),
        })
    }

    /// Flush and release the engine connection
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.engine
            .into_inner()
            .close()
            .map_err(|e| DbmError::from_engine("close", e))?;

        tracing::debug!("Closed {}", path.display());
        Ok(())
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Insert a new record; fails with `KeyExists` if the key is present
    pub fn insert(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.store("insert", key.as_ref(), value.as_ref(), StorePolicy::Insert)
    }

    /// Insert or overwrite a record
    pub fn replace(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.store("replace", key.as_ref(), value.as_ref(), StorePolicy::Replace)
    }

    /// Whether a record exists for `key`
    ///
    /// A failed lookup counts as absent.
    pub fn exists(&self, key: impl AsRef<[u8]>) -> bool {
        match self.engine.lock().exists(key.as_ref()) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("Lookup failed in {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Fetch the value stored for `key`
    pub fn fetch(&self, key: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        self.fetch_datum(key.as_ref()).map(Datum::into_vec)
    }

    /// Fetch the value stored for `key` as UTF-8 text
    pub fn fetch_string(&self, key: impl AsRef<[u8]>) -> Result<String> {
        Ok(self.fetch_datum(key.as_ref())?.into_string()?)
    }

    /// Remove the record for `key`
    ///
    /// Every failure is reported: `WriteNotPermitted` on a read-only
    /// handle, `NotFound` when the key is absent.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        self.ensure_writable("delete")?;
        self.engine
            .lock()
            .delete(key.as_ref())
            .map_err(|e| DbmError::from_engine("delete", e))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Flush pending writes to stable storage (no-op on a read-only handle)
    pub fn sync(&self) -> Result<()> {
        self.engine
            .lock()
            .sync()
            .map_err(|e| DbmError::from_engine("sync", e))
    }

    /// Compact the file, reclaiming space from replaced and deleted records
    pub fn reorganize(&self) -> Result<()> {
        self.ensure_writable("reorganize")?;
        self.engine
            .lock()
            .reorganize()
            .map_err(|e| DbmError::from_engine("reorganize", e))
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// All keys, in ascending byte order
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.engine
            .lock()
            .keys()
            .into_iter()
            .map(Datum::into_vec)
            .collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.engine.lock().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Access mode the handle was opened with
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Path the handle was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(DbmError::WriteNotPermitted { operation })
        }
    }

    fn store(
        &self,
        operation: &'static str,
        key: &[u8],
        value: &[u8],
        policy: StorePolicy,
    ) -> Result<()> {
        self.ensure_writable(operation)?;
        self.engine
            .lock()
            .store(key, value, policy)
            .map_err(|e| DbmError::from_engine(operation, e))
    }

    fn fetch_datum(&self, key: &[u8]) -> Result<Datum> {
        self.engine
            .lock()
            .fetch(key)
            .map_err(|e| DbmError::from_engine("fetch", e))
    }
}

impl<E: StorageEngine> std::fmt::Debug for Database<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
