// Configuration loaded from YAML with platform defaults

use crate::kv::{FileKv, KvStorage, MemoryKv, SqliteKv};
use crate::store::{DEFAULT_STORAGE_KEY, StoreOptions};
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "todostore";
const CONFIG_FILE: &str = "config.yml";
const DB_FILE: &str = "todostore.db";

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from {path}: {source}")]
    LoadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {message}")]
    DeserializationFailed { path: PathBuf, message: String },
}

/// Which key-value engine backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Nothing survives the process
    Memory,
    /// One JSON file per key under `data_dir`
    File,
    /// `todostore.db` under `data_dir`
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub seed_sample_tasks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            data_dir: default_data_dir(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            seed_sample_tasks: false,
        }
    }
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::DeserializationFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from `path` if given, otherwise from the platform config directory
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => match default_config_path() {
                Some(p) => Self::load(&p),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            key: self.storage_key.clone(),
            seed_sample_tasks: self.seed_sample_tasks,
        }
    }

    /// Open the configured engine
    pub fn open_storage(&self) -> eyre::Result<Box<dyn KvStorage>> {
        let storage: Box<dyn KvStorage> = match self.backend {
            Backend::Memory => Box::new(MemoryKv::new()),
            Backend::File => Box::new(FileKv::open(&self.data_dir).context("Failed to open file storage")?),
            Backend::Sqlite => {
                Box::new(SqliteKv::open(self.data_dir.join(DB_FILE)).context("Failed to open SQLite storage")?)
            }
        };
        debug!(backend = ?self.backend, data_dir = %self.data_dir.display(), "Opened storage");
        Ok(storage)
    }
}

/// `<platform data dir>/todostore`, or `./.todostore` when there is none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".todostore"))
}

/// `<platform config dir>/todostore/config.yml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}
