//! Persistent key-value records.
//!
//! Keys and values are raw byte strings. The guest writes a record in one call, and reads one in
//! two calls: first the length, then a copy into a buffer it allocated for that length.
//! [`StoreAdapter`] implements that protocol over a [`KeyValueStore`] backend and never caches
//! values itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fjall::{Keyspace, KeyspaceCreateOptions, PersistMode};
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

/// Keyspace holding guest records.
const RECORDS_KEYSPACE: &str = "records";

/// Every stored key starts with this byte, so the empty guest key is a valid record key.
const RECORD_TAG: u8 = b'r';

/// Longest guest key the file backend accepts; the database caps keys at `u16::MAX` bytes.
pub const MAX_KEY_LEN: usize = u16::MAX as usize - 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record database at {path} failed: {source}")]
    Database {
        path: PathBuf,
        #[source]
        source: fjall::Error,
    },

    #[error("key of {0} bytes exceeds the {MAX_KEY_LEN}-byte limit")]
    KeyTooLong(usize),
}

/// Durable byte-keyed storage.
pub trait KeyValueStore {
    /// Insert or overwrite `key`.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// The stored value, or `None` if `key` was never written.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Non-durable store, for tests and `backend = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.records.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.records.get(key).cloned())
    }
}

/// Records in a fjall database under a directory. Every write is synced before it returns.
pub struct FileStore {
    dir: PathBuf,
    db: fjall::Database,
    records: Keyspace,
}

impl FileStore {
    /// Open (creating if needed) the record database at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        let db = fjall::Database::builder(&dir)
            .open()
            .map_err(|e| StorageError::database(&dir, e))?;
        let records = db
            .keyspace(RECORDS_KEYSPACE, KeyspaceCreateOptions::default)
            .map_err(|e| StorageError::database(&dir, e))?;
        Ok(Self { dir, db, records })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_key(key: &[u8]) -> Result<Vec<u8>, StorageError> {
        if key.len() > MAX_KEY_LEN {
            return Err(StorageError::KeyTooLong(key.len()));
        }
        let mut tagged = Vec::with_capacity(key.len() + 1);
        tagged.push(RECORD_TAG);
        tagged.extend_from_slice(key);
        Ok(tagged)
    }
}

impl StorageError {
    fn database(path: &Path, source: fjall::Error) -> Self {
        StorageError::Database {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let key = Self::record_key(key)?;
        self.records
            .insert(key, value)
            .map_err(|e| StorageError::database(&self.dir, e))?;
        self.db
            .persist(PersistMode::SyncAll)
            .map_err(|e| StorageError::database(&self.dir, e))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let key = Self::record_key(key)?;
        let value = self
            .records
            .get(key)
            .map_err(|e| StorageError::database(&self.dir, e))?;
        Ok(value.map(|v| v.to_vec()))
    }
}

/// The guest-facing storage protocol.
pub struct StoreAdapter {
    backend: Box<dyn KeyValueStore>,
}

impl StoreAdapter {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        Ok(match config.backend {
            StorageBackend::File => Self::new(FileStore::open(&config.path)?),
            StorageBackend::Memory => Self::new(MemoryStore::new()),
        })
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn write(&mut self, key: &[u8], value: &[u8]) {
        match self.backend.put(key, value) {
            Ok(()) => tracing::debug!(key_len = key.len(), len = value.len(), "record saved"),
            Err(e) => tracing::warn!(error = %e, "record save failed"),
        }
    }

    /// Length of the value under `key`; 0 if absent or unreadable.
    pub fn query_len(&self, key: &[u8]) -> u32 {
        match self.backend.get(key) {
            Ok(value) => value.map_or(0, |v| u32::try_from(v.len()).unwrap_or(u32::MAX)),
            Err(e) => {
                tracing::warn!(error = %e, "record length query failed");
                0
            }
        }
    }

    /// Copy the value under `key` into `dest`, truncating to `dest.len()`.
    ///
    /// Returns the number of bytes copied. `dest` is left untouched for an absent key.
    pub fn read(&self, key: &[u8], dest: &mut [u8]) -> usize {
        match self.backend.get(key) {
            Ok(Some(value)) => {
                let n = value.len().min(dest.len());
                dest[..n].copy_from_slice(&value[..n]);
                n
            }
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(error = %e, "record read failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_round_trip() {
        let mut store = StoreAdapter::new(MemoryStore::new());
        store.write(b"score", &[1, 0, 2, 255]);
        assert_eq!(store.query_len(b"score"), 4);

        let mut buf = [0u8; 4];
        assert_eq!(store.read(b"score", &mut buf), 4);
        assert_eq!(buf, [1, 0, 2, 255]);
    }

    #[test]
    fn absent_key_has_zero_length() {
        let store = StoreAdapter::new(MemoryStore::new());
        assert_eq!(store.query_len(b"missing"), 0);
        let mut buf = [9u8; 3];
        assert_eq!(store.read(b"missing", &mut buf), 0);
        assert_eq!(buf, [9, 9, 9]);
    }

    #[test]
    fn write_overwrites() {
        let mut store = StoreAdapter::new(MemoryStore::new());
        store.write(b"k", b"long value");
        store.write(b"k", b"v2");
        assert_eq!(store.query_len(b"k"), 2);
    }

    #[test]
    fn short_destination_truncates() {
        let mut store = StoreAdapter::new(MemoryStore::new());
        store.write(b"k", &[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 2];
        assert_eq!(store.read(b"k", &mut buf), 2);
        assert_eq!(buf, [1, 2]);

        let mut big = [0u8; 8];
        assert_eq!(store.read(b"k", &mut big), 5);
        assert_eq!(big, [1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves");

        {
            let mut store = StoreAdapter::new(FileStore::open(&path).unwrap());
            store.write(b"score", &[1, 0, 2, 255]);
            store.write(b"\0bin\xc2key", b"");
            store.write(b"", b"empty key");
        }

        let store = StoreAdapter::new(FileStore::open(&path).unwrap());
        assert_eq!(store.query_len(b"score"), 4);
        let mut buf = [0u8; 4];
        store.read(b"score", &mut buf);
        assert_eq!(buf, [1, 0, 2, 255]);
        assert_eq!(store.query_len(b"\0bin\xc2key"), 0);
        assert_eq!(store.query_len(b""), 9);
    }

    #[test]
    fn file_store_takes_long_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StoreAdapter::new(FileStore::open(dir.path()).unwrap());

        let long = vec![b'k'; 200];
        let longer = vec![0xc2; 4096];
        store.write(&long, &[1, 0, 2, 255]);
        store.write(&longer, b"v");
        assert_eq!(store.query_len(&long), 4);
        assert_eq!(store.query_len(&longer), 1);

        let mut buf = [0u8; 4];
        assert_eq!(store.read(&long, &mut buf), 4);
        assert_eq!(buf, [1, 0, 2, 255]);
    }

    #[test]
    fn file_store_rejects_oversized_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        let key = vec![0u8; MAX_KEY_LEN + 1];
        assert!(matches!(
            store.put(&key, b"v"),
            Err(StorageError::KeyTooLong(n)) if n == MAX_KEY_LEN + 1
        ));
        assert!(store.put(&key[..MAX_KEY_LEN], b"v").is_ok());
    }

    #[test]
    fn from_config_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::File,
            path: dir.path().join("records"),
        };
        {
            let mut store = StoreAdapter::from_config(&config).unwrap();
            store.write(b"x", b"y");
        }
        assert!(dir.path().join("records").is_dir());
        let store = StoreAdapter::from_config(&config).unwrap();
        assert_eq!(store.query_len(b"x"), 1);
    }
}
