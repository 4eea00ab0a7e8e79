//! Configuration for AtlasDBM
//!
//! Access modes and open-time configuration with sensible defaults.

use std::fmt;
use std::str::FromStr;

use crate::error::DbmError;
use crate::storage::{AccessFlag, EngineOptions};

/// Default permission bits for files created by the engine (before umask)
pub const DEFAULT_PERMISSIONS: u32 = 0o666;

/// Block size hint meaning "use the filesystem default"
pub const DEFAULT_BLOCK_SIZE: u32 = 0;

/// Access mode a database handle is opened with
///
/// Exactly one mode is active per handle, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Read-only; every mutation fails
    Reader,

    /// Read-write on an existing file
    Writer,

    /// Read-write; creates the file if absent
    WriteCreate,

    /// Read-write; always starts from a fresh, empty file
    NewDatabase,
}

impl OpenMode {
    /// Single-letter form (`r`, `w`, `c`, `n`)
    pub fn letter(self) -> char {
        match self {
            OpenMode::Reader => 'r',
            OpenMode::Writer => 'w',
            OpenMode::WriteCreate => 'c',
            OpenMode::NewDatabase => 'n',
        }
    }

    /// Whether handles in this mode may mutate the file
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::Reader)
    }

    /// Whether opening in this mode may create a file
    pub fn may_create(self) -> bool {
        matches!(self, OpenMode::WriteCreate | OpenMode::NewDatabase)
    }

    /// Engine open flag for this mode
    pub fn access_flag(self) -> AccessFlag {
        match self {
            OpenMode::Reader => AccessFlag::Read,
            OpenMode::Writer => AccessFlag::Write,
            OpenMode::WriteCreate => AccessFlag::WriteCreate,
            OpenMode::NewDatabase => AccessFlag::Truncate,
        }
    }
}

impl FromStr for OpenMode {
    type Err = DbmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "reader" => Ok(OpenMode::Reader),
            "w" | "writer" => Ok(OpenMode::Writer),
            "c" | "wrcreat" | "write-create" => Ok(OpenMode::WriteCreate),
            "n" | "newdb" | "new" => Ok(OpenMode::NewDatabase),
            other => Err(DbmError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpenMode::Reader => "reader",
            OpenMode::Writer => "writer",
            OpenMode::WriteCreate => "write-create",
            OpenMode::NewDatabase => "new-database",
        };
        f.write_str(name)
    }
}

/// Open-time configuration for a database handle
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    // -------------------------------------------------------------------------
    // Access
    // -------------------------------------------------------------------------
    /// Access mode (required)
    pub mode: OpenMode,

    // -------------------------------------------------------------------------
    // File Creation
    // -------------------------------------------------------------------------
    /// Block size hint in bytes; 0 means filesystem default.
    /// Only honored when a new file is created.
    pub block_size: u32,

    /// Permission bits for a newly created file
    pub permissions: u32,

    // -------------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------------
    /// fsync after every mutation
    pub sync_writes: bool,
}

impl DatabaseConfig {
    /// Config with default block size and permissions
    pub fn new(mode: OpenMode) -> Self {
        Self {
            mode,
            block_size: DEFAULT_BLOCK_SIZE,
            permissions: DEFAULT_PERMISSIONS,
            sync_writes: false,
        }
    }

    /// Create a new config builder
    pub fn builder(mode: OpenMode) -> ConfigBuilder {
        ConfigBuilder {
            config: Self::new(mode),
        }
    }

    /// Engine options equivalent to this config
    ///
    /// Permission bits only reach the engine in modes that may create the
    /// file; other modes pass the default.
    pub fn engine_options(&self) -> EngineOptions {
        let permissions = if self.mode.may_create() {
            self.permissions
        } else {
            DEFAULT_PERMISSIONS
        };

        EngineOptions {
            access: self.mode.access_flag(),
            block_size: self.block_size,
            permissions,
            sync_writes: self.sync_writes,
        }
    }
}

/// Builder for DatabaseConfig
pub struct ConfigBuilder {
    config: DatabaseConfig,
}

impl ConfigBuilder {
    /// Set the block size hint (0 = filesystem default)
    pub fn block_size(mut self, size: u32) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the permission bits used when a file is created
    pub fn permissions(mut self, mode: u32) -> Self {
        self.config.permissions = mode;
        self
    }

    /// Sync to disk after every insert/replace/delete
    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.config.sync_writes = enabled;
        self
    }

    pub fn build(self) -> DatabaseConfig {
        self.config
    }
}
