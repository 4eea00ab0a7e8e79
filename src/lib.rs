//! # AtlasDBM
//!
//! A dbm-style access layer over an embedded, single-file key-value store:
//! - Four access modes (reader, writer, write-create, new database)
//! - Insert / replace / fetch / exists / delete on opaque byte records
//! - Sync and reorganize (space reclamation) maintenance calls
//! - Call-scoped engine errors translated into one error taxonomy
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                             │
//! │        (access mode, mutex-serialized engine calls)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  &[u8] keys/values ──▶  ◀── Datum
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  StorageEngine (trait)                      │
//! │          open / store / fetch / delete / sync / ...         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!               ┌───────────────┐
//!               │  FileEngine   │
//!               │ (single file) │
//!               └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use atlasdbm::{Database, DbmError};
//!
//! let db = Database::open("/tmp/t.db", "c")?;
//! db.insert("a", "1")?;
//! assert_eq!(db.fetch_string("a")?, "1");
//! assert!(matches!(db.insert("a", "2"), Err(DbmError::KeyExists)));
//! db.replace("a", "2")?;
//! db.delete("a")?;
//! assert!(!db.exists("a"));
//! db.close()?;
//! # Ok::<(), DbmError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod datum;
pub mod storage;
pub mod database;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DbmError, Result};
pub use config::{DatabaseConfig, OpenMode};
pub use datum::Datum;
pub use database::Database;
pub use storage::{EngineError, EngineErrorCode, FileEngine, StorageEngine};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasDBM
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
