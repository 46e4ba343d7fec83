//! Configuration structures for StrataDB.

use crate::error::{Result, StrataError};
use crate::page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage configuration for the heap engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for table data files.
    pub data_dir: PathBuf,
    /// Page size in bytes.
    pub page_size: usize,
    /// Buffer pool size in number of pages.
    pub buffer_pool_pages: usize,
    /// Enable fsync after every page write.
    pub fsync_enabled: bool,
    /// Milliseconds a page checkout waits for a lock before aborting.
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: 50,
            fsync_enabled: false,
            lock_timeout_ms: 1000,
        }
    }
}

impl StorageConfig {
    /// Loads a configuration from a JSON file. Missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: StorageConfig = serde_json::from_str(&text)
            .map_err(|e| StrataError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a usable engine.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(StrataError::ConfigError(
                "page_size must be positive".to_string(),
            ));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(StrataError::ConfigError(format!(
                "page_size {} exceeds maximum {}",
                self.page_size, MAX_PAGE_SIZE
            )));
        }
        if self.buffer_pool_pages == 0 {
            return Err(StrataError::InvalidParameter {
                name: "buffer_pool_pages".to_string(),
                value: self.buffer_pool_pages.to_string(),
            });
        }
        Ok(())
    }

    /// Returns the total buffer pool size in bytes.
    pub fn buffer_pool_size_bytes(&self) -> usize {
        self.buffer_pool_pages * self.page_size
    }

    /// Returns the path of a table's data file inside `data_dir`.
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.dat", table_name))
    }
}
