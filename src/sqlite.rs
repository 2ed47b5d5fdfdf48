// SQLite key-value backend

use crate::kv::{KvStore, validate_key};
use crate::models::now_ms;
use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const CURRENT_VERSION: u32 = 1;
const DB_FILE: &str = "daybook.db";

/// Key-value store kept in a single SQLite table
#[derive(Debug)]
pub struct SqliteKv {
    path: PathBuf,
    db: Arc<Mutex<Connection>>,
}

impl SqliteKv {
    /// Open or create the database inside the given directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create data directory")?;

        let path = dir.join(DB_FILE);
        let db = Connection::open(&path).context("Failed to open SQLite database")?;
        Self::create_schema(&db)?;

        info!(path = ?path, "Opened SQLite store");
        Ok(Self {
            path,
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::create_schema(&db)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_schema(db: &Connection) -> Result<()> {
        debug!("Creating database schema");

        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        let version: u32 = db.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            db.execute_batch(&format!("PRAGMA user_version = {}", CURRENT_VERSION))?;
        } else if version > CURRENT_VERSION {
            return Err(eyre!(
                "Database schema version {} is newer than supported version {}",
                version,
                CURRENT_VERSION
            ));
        }

        Ok(())
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| eyre!("SQLite connection lock poisoned"))?;
            f(&conn)
        })
        .await
        .context("SQLite task panicked")?
    }
}

impl KvStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_db(move |db| {
            let value: Option<String> = db
                .query_row("SELECT value FROM kv WHERE key = ?1", [&key], |row| row.get(0))
                .optional()
                .with_context(|| format!("Failed to read key {}", key))?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let key = key.to_string();
        let value = value.to_string();
        self.with_db(move |db| {
            db.execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![&key, &value, now_ms()],
            )
            .with_context(|| format!("Failed to write key {}", key))?;
            debug!(key = %key, bytes = value.len(), "Wrote value");
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_db(move |db| {
            db.execute("DELETE FROM kv WHERE key = ?1", [&key])
                .with_context(|| format!("Failed to remove key {}", key))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_database() {
        let temp = TempDir::new().unwrap();
        let kv = SqliteKv::open(temp.path()).unwrap();
        assert!(kv.path().exists());
        assert!(temp.path().join("daybook.db").exists());
    }

    #[tokio::test]
    async fn test_set_replaces_value() {
        let kv = SqliteKv::open_in_memory().unwrap();

        kv.set("tasks", "[1]").await.unwrap();
        kv.set("tasks", "[1,2]").await.unwrap();
        assert_eq!(kv.get("tasks").await.unwrap().as_deref(), Some("[1,2]"));

        let count: i64 = {
            let db = kv.db.lock().unwrap();
            db.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0)).unwrap()
        };
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let kv = SqliteKv::open(temp.path()).unwrap();
            kv.set("selected_date", "2025-03-14").await.unwrap();
        }

        let kv = SqliteKv::open(temp.path()).unwrap();
        assert_eq!(
            kv.get("selected_date").await.unwrap().as_deref(),
            Some("2025-03-14")
        );

        kv.remove("selected_date").await.unwrap();
        assert_eq!(kv.get("selected_date").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let kv = SqliteKv::open_in_memory().unwrap();
        assert_eq!(kv.get("entries").await.unwrap(), None);
        kv.remove("entries").await.unwrap();
    }
}
