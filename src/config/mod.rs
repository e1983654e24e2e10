use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{FsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub root_uri: String,
    pub user: Option<String>,
    pub retry: RetryPolicy,
    pub upload_buffer_size: usize,
    pub download_chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            root_uri: String::new(),
            user: None,
            retry: RetryPolicy::default(),
            upload_buffer_size: 2048,
            download_chunk_size: 1024,
        }
    }
}

impl ClientConfig {
    pub fn new(root_uri: impl Into<String>) -> Self {
        Self {
            root_uri: root_uri.into(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)
            .map_err(|e| FsError::Config(format!("{:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(FsError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.upload_buffer_size == 0 || self.download_chunk_size == 0 {
            return Err(FsError::Config("buffer sizes must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub trash_interval_minutes: u64,
    pub block_size: u64,
    pub replication: u16,
    pub capacity: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            trash_interval_minutes: 1440,
            block_size: 128 * 1024 * 1024,
            replication: 3,
            capacity: 1024 * 1024 * 1024 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn trash_interval(&self) -> Duration {
        Duration::from_secs(self.trash_interval_minutes.saturating_mul(60))
    }

    pub fn with_trash_interval_minutes(mut self, minutes: u64) -> Self {
        self.trash_interval_minutes = minutes;
        self
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }
}
