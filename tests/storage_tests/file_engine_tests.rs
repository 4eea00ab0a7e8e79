//! Tests for FileEngine
//!
//! These tests verify:
//! - Block size resolution and persistence in the header
//! - Permission bits on created files
//! - Torn trailing records (dropped, truncated when writable)
//! - Corruption and bad-magic detection
//! - Dead-space accounting and reorganize

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use atlasdbm::storage::file::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use atlasdbm::storage::{AccessFlag, EngineOptions, StorePolicy};
use atlasdbm::{EngineErrorCode, FileEngine, StorageEngine};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn options(access: AccessFlag) -> EngineOptions {
    EngineOptions {
        access,
        block_size: 0,
        permissions: 0o644,
        sync_writes: false,
    }
}

fn setup_temp_path() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.db");
    (temp_dir, path)
}

fn create_with_entries(path: &Path, entries: &[(&str, &str)]) {
    let mut engine = FileEngine::open(path, &options(AccessFlag::WriteCreate)).unwrap();
    for (key, value) in entries {
        engine
            .store(key.as_bytes(), value.as_bytes(), StorePolicy::Replace)
            .unwrap();
    }
    engine.close().unwrap();
}

fn append_bytes(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

// =============================================================================
// Open / Header Tests
// =============================================================================

#[test]
fn test_new_file_gets_header_only() {
    let (_temp, path) = setup_temp_path();

    let engine = FileEngine::open(&path, &options(AccessFlag::WriteCreate)).unwrap();

    assert_eq!(engine.count(), 0);
    assert_eq!(engine.file_len(), 12);
    assert_eq!(fs::metadata(&path).unwrap().len(), 12);
    assert_eq!(&fs::read(&path).unwrap()[0..4], b"ADBM");
}

#[test]
fn test_default_block_size_is_in_range() {
    let (_temp, path) = setup_temp_path();

    let engine = FileEngine::open(&path, &options(AccessFlag::WriteCreate)).unwrap();

    assert!(engine.block_size() >= MIN_BLOCK_SIZE);
    assert!(engine.block_size() <= MAX_BLOCK_SIZE);
}

#[test]
fn test_small_block_size_is_raised() {
    let (_temp, path) = setup_temp_path();
    let mut opts = options(AccessFlag::WriteCreate);
    opts.block_size = 100;

    let engine = FileEngine::open(&path, &opts).unwrap();

    assert_eq!(engine.block_size(), MIN_BLOCK_SIZE);
}

#[test]
fn test_block_size_only_applies_on_creation() {
    let (_temp, path) = setup_temp_path();
    let mut opts = options(AccessFlag::WriteCreate);
    opts.block_size = 8192;
    FileEngine::open(&path, &opts).unwrap().close().unwrap();

    opts.block_size = 1024;
    let engine = FileEngine::open(&path, &opts).unwrap();

    assert_eq!(engine.block_size(), 8192);
}

#[test]
fn test_oversized_block_size_is_rejected() {
    let (_temp, path) = setup_temp_path();
    let mut opts = options(AccessFlag::WriteCreate);
    opts.block_size = MAX_BLOCK_SIZE + 1;

    let err = FileEngine::open(&path, &opts).err().unwrap();

    assert_eq!(err.code(), EngineErrorCode::BlockSizeError);
    assert!(!path.exists());
}

#[cfg(unix)]
#[test]
fn test_created_file_uses_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, path) = setup_temp_path();
    let mut opts = options(AccessFlag::WriteCreate);
    opts.permissions = 0o600;

    FileEngine::open(&path, &opts).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_bad_magic_is_rejected() {
    let (_temp, path) = setup_temp_path();
    fs::write(&path, b"definitely not a database file").unwrap();

    let err = FileEngine::open(&path, &options(AccessFlag::Read)).err().unwrap();

    assert_eq!(err.code(), EngineErrorCode::BadMagic);
}

#[test]
fn test_short_file_is_rejected() {
    let (_temp, path) = setup_temp_path();
    fs::write(&path, b"ADBM").unwrap();

    let err = FileEngine::open(&path, &options(AccessFlag::Write)).err().unwrap();

    assert_eq!(err.code(), EngineErrorCode::BadMagic);
}

#[test]
fn test_empty_file_reader_vs_writer() {
    let (_temp, path) = setup_temp_path();
    fs::File::create(&path).unwrap();

    let err = FileEngine::open(&path, &options(AccessFlag::Read)).err().unwrap();
    assert_eq!(err.code(), EngineErrorCode::EmptyDatabase);

    let engine = FileEngine::open(&path, &options(AccessFlag::Write)).unwrap();
    assert_eq!(engine.count(), 0);
    assert_eq!(fs::metadata(&path).unwrap().len(), 12);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_torn_tail_truncated_when_writable() {
    let (_temp, path) = setup_temp_path();
    create_with_entries(&path, &[("a", "1"), ("b", "2")]);
    let clean_len = fs::metadata(&path).unwrap().len();

    // A complete record header whose body was cut short
    create_with_entries(&path, &[("torn", "value that never finished")]);
    let full_len = fs::metadata(&path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(full_len - 10)
        .unwrap();

    let mut engine = FileEngine::open(&path, &options(AccessFlag::Write)).unwrap();

    assert_eq!(engine.count(), 2);
    assert_eq!(engine.file_len(), clean_len);
    assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);
    assert_eq!(engine.fetch(b"b").unwrap().as_bytes(), b"2");

    engine.store(b"c", b"3", StorePolicy::Insert).unwrap();
    engine.close().unwrap();

    let mut engine = FileEngine::open(&path, &options(AccessFlag::Read)).unwrap();
    assert_eq!(engine.fetch(b"c").unwrap().as_bytes(), b"3");
}

#[test]
fn test_torn_tail_left_alone_when_read_only() {
    let (_temp, path) = setup_temp_path();
    create_with_entries(&path, &[("a", "1")]);
    append_bytes(&path, &[1, 2, 3, 4, 5]);
    let len_with_tail = fs::metadata(&path).unwrap().len();

    let mut engine = FileEngine::open(&path, &options(AccessFlag::Read)).unwrap();

    assert_eq!(engine.count(), 1);
    assert_eq!(engine.fetch(b"a").unwrap().as_bytes(), b"1");
    assert_eq!(fs::metadata(&path).unwrap().len(), len_with_tail);
}

#[test]
fn test_checksum_mismatch_fails_open() {
    let (_temp, path) = setup_temp_path();
    create_with_entries(&path, &[("a", "1"), ("b", "2")]);

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, &bytes).unwrap();

    let err = FileEngine::open(&path, &options(AccessFlag::Read)).err().unwrap();

    assert_eq!(err.code(), EngineErrorCode::Corrupted);
}

#[test]
fn test_damaged_length_fails_open_without_truncating() {
    let (_temp, path) = setup_temp_path();
    create_with_entries(&path, &[("a", "1"), ("b", "2"), ("c", "3")]);
    let len = fs::metadata(&path).unwrap().len();

    // High byte of the first record's KeyLen: file header (12) + LenCRC (4) + 3
    let mut bytes = fs::read(&path).unwrap();
    bytes[19] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let err = FileEngine::open(&path, &options(AccessFlag::Write)).err().unwrap();

    assert_eq!(err.code(), EngineErrorCode::Corrupted);
    assert_eq!(fs::metadata(&path).unwrap().len(), len);
    assert_eq!(fs::read(&path).unwrap(), bytes);
}

// =============================================================================
// Record Operation Tests
// =============================================================================

#[test]
fn test_reader_engine_refuses_writes() {
    let (_temp, path) = setup_temp_path();
    create_with_entries(&path, &[("a", "1")]);

    let mut engine = FileEngine::open(&path, &options(AccessFlag::Read)).unwrap();

    let err = engine.store(b"b", b"2", StorePolicy::Replace).unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::ReaderCantStore);
    let err = engine.delete(b"a").unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::ReaderCantDelete);
    let err = engine.reorganize().unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::ReaderCantReorganize);
    engine.sync().unwrap();
}

#[test]
fn test_insert_policy_and_missing_items() {
    let (_temp, path) = setup_temp_path();
    let mut engine = FileEngine::open(&path, &options(AccessFlag::Truncate)).unwrap();

    engine.store(b"k", b"v", StorePolicy::Insert).unwrap();
    let err = engine.store(b"k", b"w", StorePolicy::Insert).unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::CannotReplace);

    assert!(engine.exists(b"k").unwrap());
    assert!(!engine.exists(b"missing").unwrap());

    let err = engine.fetch(b"missing").unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::ItemNotFound);
    let err = engine.delete(b"missing").unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::ItemNotFound);
}

#[test]
fn test_rejected_insert_writes_nothing() {
    let (_temp, path) = setup_temp_path();
    let mut engine = FileEngine::open(&path, &options(AccessFlag::Truncate)).unwrap();

    engine.store(b"k", b"v", StorePolicy::Insert).unwrap();
    let len = engine.file_len();
    let _ = engine.store(b"k", b"w", StorePolicy::Insert);

    assert_eq!(engine.file_len(), len);
    assert_eq!(engine.dead_bytes(), 0);
}

#[test]
fn test_sync_writes_option() {
    let (_temp, path) = setup_temp_path();
    let mut opts = options(AccessFlag::WriteCreate);
    opts.sync_writes = true;

    let mut engine = FileEngine::open(&path, &opts).unwrap();
    engine.store(b"k", b"v", StorePolicy::Replace).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), engine.file_len());
    engine.delete(b"k").unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), engine.file_len());

    assert_eq!(engine.count(), 0);
}

// =============================================================================
// Reorganize Tests
// =============================================================================

#[test]
fn test_dead_bytes_and_reorganize() {
    let (_temp, path) = setup_temp_path();
    let mut engine = FileEngine::open(&path, &options(AccessFlag::WriteCreate)).unwrap();

    // record sizes: 16 header + key + value
    engine.store(b"a", b"1", StorePolicy::Replace).unwrap(); // 18
    engine.store(b"a", b"22", StorePolicy::Replace).unwrap(); // 19, first dead
    engine.store(b"b", b"3", StorePolicy::Replace).unwrap(); // 18
    engine.delete(b"b").unwrap(); // tombstone 17, value dead

    assert_eq!(engine.dead_bytes(), 18 + 18 + 17);
    assert_eq!(engine.file_len(), 12 + 18 + 19 + 18 + 17);

    engine.reorganize().unwrap();

    assert_eq!(engine.dead_bytes(), 0);
    assert_eq!(engine.file_len(), 12 + 19);
    assert_eq!(fs::metadata(&path).unwrap().len(), 12 + 19);
    assert_eq!(engine.fetch(b"a").unwrap().as_bytes(), b"22");
    assert!(!engine.exists(b"b").unwrap());
}

#[test]
fn test_dead_bytes_rebuilt_on_reopen() {
    let (_temp, path) = setup_temp_path();
    create_with_entries(&path, &[("a", "1"), ("a", "2")]);

    let engine = FileEngine::open(&path, &options(AccessFlag::Read)).unwrap();

    assert_eq!(engine.dead_bytes(), 18);
    assert_eq!(engine.count(), 1);
}

#[cfg(unix)]
#[test]
fn test_reorganize_keeps_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, path) = setup_temp_path();
    let mut opts = options(AccessFlag::WriteCreate);
    opts.permissions = 0o600;

    let mut engine = FileEngine::open(&path, &opts).unwrap();
    engine.store(b"a", b"1", StorePolicy::Replace).unwrap();
    engine.reorganize().unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_keys_are_sorted() {
    let (_temp, path) = setup_temp_path();
    create_with_entries(&path, &[("zeta", "1"), ("alpha", "2"), ("mid", "3")]);

    let engine = FileEngine::open(&path, &options(AccessFlag::Read)).unwrap();
    let keys: Vec<Vec<u8>> = engine.keys().into_iter().map(|k| k.into_vec()).collect();

    assert_eq!(keys, vec![b"alpha".to_vec(), b"mid".to_vec(), b"zeta".to_vec()]);
}
