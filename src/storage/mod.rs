//! Key-value persistence behind `localStorage` and `sessionStorage`.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{database_path, SqliteStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("unable to determine data directory")]
    DataDir,
}

/// Ordered string map with Web Storage semantics.
///
/// Keys keep the position of their first insertion; overwriting a value does
/// not move the key.
pub trait KeyValueStore {
    fn len(&self) -> Result<usize, StorageError>;
    fn key(&self, index: usize) -> Result<Option<String>, StorageError>;
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}
