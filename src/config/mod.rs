//! Configuration management.

use crate::{DataError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default busy timeout applied to the storage connection, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Configuration for the persistence layer.
///
/// The store file for a model named `dodo` lives at
/// `<data_dir>/dodo.sqlite`. The default data directory is the platform's
/// per-application data directory, falling back to the current directory
/// when the platform provides none.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the store files.
    pub data_dir: PathBuf,
    /// Busy timeout for the storage connection, in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    /// Directory holding the store files.
    data_dir: Option<String>,
    /// Busy timeout in milliseconds.
    busy_timeout_ms: Option<u32>,
}

impl StoreConfig {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// any missing keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DataError::operation(format!("cannot read config '{}': {e}", path.display())))?;
        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| DataError::operation(format!("cannot parse config '{}': {e}", path.display())))?;

        let defaults = Self::default();
        Ok(Self {
            data_dir: file.data_dir.map_or(defaults.data_dir, PathBuf::from),
            busy_timeout_ms: file.busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
        })
    }

    /// Returns a configuration rooted at the given data directory.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Resolves the platform's per-application data directory.
    fn default_data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "dodostore")
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_local_dir().to_path_buf())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}
