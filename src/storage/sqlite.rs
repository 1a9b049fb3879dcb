use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{KeyValueStore, StorageError};

const DATABASE_FILE: &str = "storage.sqlite3";

/// Persistent store keyed by origin, so several scripts can share one database
/// file without seeing each other's items.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    origin: String,
}

#[derive(Debug)]
struct SqliteCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for SqliteCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(1))
    }
}

impl SqliteStore {
    /// Open the store in the resolved data directory (see [`database_path`]).
    pub fn new(data_dir: Option<&Path>, origin: &str) -> Result<Self, StorageError> {
        let path = database_path(data_dir)?;
        Self::open(&path, origin)
    }

    pub fn open(path: &Path, origin: &str) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| StorageError::DataDir)?;
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(2)
            .connection_customizer(Box::new(SqliteCustomizer))
            .build(manager)?;

        let conn = pool.get()?;
        initialise_schema(&conn)?;
        info!(target: "webshim", path = %path.display(), origin, "opened storage database");

        Ok(Self {
            pool,
            origin: origin.to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl KeyValueStore for SqliteStore {
    fn len(&self) -> Result<usize, StorageError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE origin = ?1",
            params![self.origin],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT key FROM items WHERE origin = ?1 ORDER BY position LIMIT 1 OFFSET ?2",
            params![self.origin, index as i64],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT value FROM items WHERE origin = ?1 AND key = ?2",
            params![self.origin, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO items (origin, key, value, position)
             VALUES (
                ?1, ?2, ?3,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM items WHERE origin = ?1)
             )
             ON CONFLICT(origin, key) DO UPDATE SET value = excluded.value",
            params![self.origin, key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM items WHERE origin = ?1 AND key = ?2",
            params![self.origin, key],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM items WHERE origin = ?1", params![self.origin])?;
        Ok(())
    }
}

/// Where the database lives: `$WEBSHIM_DATA_DIR`, then the configured
/// directory, then the platform data directory.
pub fn database_path(configured: Option<&Path>) -> Result<PathBuf, StorageError> {
    if let Ok(dir) = std::env::var("WEBSHIM_DATA_DIR") {
        return Ok(PathBuf::from(dir).join(DATABASE_FILE));
    }

    if let Some(dir) = configured {
        return Ok(dir.join(DATABASE_FILE));
    }

    ProjectDirs::from("org", "Webshim", "webshim")
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
        .ok_or(StorageError::DataDir)
}

fn initialise_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        CREATE TABLE IF NOT EXISTS items (
            origin TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (origin, key)
        );
        "#,
    )?;
    Ok(())
}
