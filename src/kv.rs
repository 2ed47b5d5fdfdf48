// Key-value persistence backends

use crate::sqlite::SqliteKv;
use eyre::{Context, Result, eyre};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const LOCK_FILE: &str = ".daybook.lock";

/// Durable string-to-string mapping. No transactions: every `set` replaces
/// one whole value.
#[allow(async_fn_in_trait)]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Validate a persistence key. Keys become file names for `FileKv`.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Key too long: {} (max 64 chars)", key));
    }
    if key.starts_with('.') {
        return Err(eyre!("Key cannot start with '.': {}", key));
    }
    if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.') {
        return Err(eyre!("Invalid key: {} (must be alphanumeric with _/-/.)", key));
    }
    Ok(())
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local store. Can be told to fail writes.
#[derive(Debug, Default)]
pub struct MemoryKv {
    data: Mutex<HashMap<String, String>>,
    write_log: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `set`/`remove` fail until switched off again
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Keys of all successful writes, oldest first
    pub fn write_log(&self) -> Vec<String> {
        self.write_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(eyre!("Simulated write failure for key {}", key));
        }
        Ok(())
    }

    fn record_write(&self, key: &str) -> Result<()> {
        self.write_log
            .lock()
            .map_err(|_| eyre!("Memory store lock poisoned"))?
            .push(key.to_string());
        Ok(())
    }
}

impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.data.lock().map_err(|_| eyre!("Memory store lock poisoned"))?;
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.check_writable(key)?;
        self.data
            .lock()
            .map_err(|_| eyre!("Memory store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        self.record_write(key)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_writable(key)?;
        self.data
            .lock()
            .map_err(|_| eyre!("Memory store lock poisoned"))?
            .remove(key);
        self.record_write(key)
    }
}

// ============================================================================
// File backend
// ============================================================================

/// One file per key inside a data directory.
///
/// Writes go to a temp file that is renamed over the old value, so a failed
/// write never leaves a half-written value behind. The directory is locked
/// for as long as the store is alive.
#[derive(Debug)]
pub struct FileKv {
    dir: PathBuf,
    _lock: File,
}

impl FileKv {
    /// Open or create a store in the given directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let dir = path.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create data directory")?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))
            .context("Failed to open lock file")?;

        // Lock is released when the store is dropped
        fs2::FileExt::try_lock_exclusive(&lock)
            .with_context(|| format!("Data directory {:?} is in use by another process", dir))?;

        info!(dir = ?dir, "Opened file store");
        Ok(Self { dir, _lock: lock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.kv", key)))
    }
}

impl KvStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = self.dir.join(format!("{}.kv.tmp", key));

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .context("Failed to create temp file")?;
        file.write_all(value.as_bytes()).await.context("Failed to write temp file")?;
        file.sync_all().await.context("Failed to flush temp file")?;
        drop(file);

        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace {:?}", path))?;

        debug!(key, bytes = value.len(), "Wrote value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }
}

// ============================================================================
// Runtime-selected backend
// ============================================================================

/// Backend chosen from configuration
#[derive(Debug)]
pub enum AnyKv {
    File(FileKv),
    Sqlite(SqliteKv),
}

impl KvStore for AnyKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            AnyKv::File(kv) => kv.get(key).await,
            AnyKv::Sqlite(kv) => kv.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        match self {
            AnyKv::File(kv) => kv.set(key, value).await,
            AnyKv::Sqlite(kv) => kv.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match self {
            AnyKv::File(kv) => kv.remove(key).await,
            AnyKv::Sqlite(kv) => kv.remove(key).await,
        }
    }
}
