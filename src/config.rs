// Configuration loaded from YAML with defaults for every field

use crate::kv::{AnyKv, FileKv};
use crate::sqlite::SqliteKv;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable that overrides `data_dir`
pub const HOME_ENV: &str = "DAYBOOK_HOME";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One file per key in the data directory
    #[default]
    File,
    /// A single SQLite database in the data directory
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub backend: Backend,
    /// Where CSV exports go; `<data_dir>/exports` when unset
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("daybook")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::default(),
            export_dir: None,
        }
    }
}

impl Config {
    /// `<config dir>/daybook/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("daybook").join("config.yaml"))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse config")
    }

    /// Load from an explicit file, or from the default location when it
    /// exists, then apply the environment override
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let yaml = fs::read_to_string(path).with_context(|| format!("Failed to read config {:?}", path))?;
                Self::from_yaml(&yaml)?
            }
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => {
                    debug!(path = ?path, "Loading config");
                    let yaml =
                        fs::read_to_string(&path).with_context(|| format!("Failed to read config {:?}", path))?;
                    Self::from_yaml(&yaml)?
                }
                None => Self::default(),
            },
        };

        Ok(config.with_home_override(std::env::var_os(HOME_ENV).map(PathBuf::from)))
    }

    pub fn with_home_override(mut self, home: Option<PathBuf>) -> Self {
        if let Some(home) = home {
            self.data_dir = home;
        }
        self
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("exports"))
    }

    pub fn open_store(&self) -> Result<AnyKv> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(eyre!("Data directory is not set"));
        }
        info!(dir = ?self.data_dir, backend = ?self.backend, "Opening store");
        Ok(match self.backend {
            Backend::File => AnyKv::File(FileKv::open(&self.data_dir)?),
            Backend::Sqlite => AnyKv::Sqlite(SqliteKv::open(&self.data_dir)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvStore;
    use tempfile::TempDir;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("backend: sqlite\n").unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.data_dir, default_data_dir());
        assert_eq!(config.export_dir(), default_data_dir().join("exports"));
    }

    #[test]
    fn test_full_yaml() {
        let config = Config::from_yaml("data_dir: /tmp/journal\nbackend: file\nexport_dir: /tmp/out\n").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/journal"));
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(Config::from_yaml("backend: postgres\n").is_err());
    }

    #[test]
    fn test_home_override() {
        let config = Config::default().with_home_override(Some(PathBuf::from("/srv/daybook")));
        assert_eq!(config.data_dir, PathBuf::from("/srv/daybook"));
        assert_eq!(Config::default().with_home_override(None), Config::default());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "backend: sqlite\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().backend, Backend::Sqlite);
        assert!(Config::load(Some(&temp.path().join("missing.yaml"))).is_err());
    }

    #[tokio::test]
    async fn test_open_store_for_each_backend() {
        for backend in [Backend::File, Backend::Sqlite] {
            let temp = TempDir::new().unwrap();
            let config = Config {
                data_dir: temp.path().to_path_buf(),
                backend,
                export_dir: None,
            };
            let kv = config.open_store().unwrap();
            kv.set("entries", "[]").await.unwrap();
            assert_eq!(kv.get("entries").await.unwrap().as_deref(), Some("[]"));
        }
    }
}
