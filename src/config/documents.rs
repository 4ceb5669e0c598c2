use anyhow::{bail, Result};
use std::env;
use std::time::Duration;

/// Which document store backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentBackend {
    Disabled,
    Postgres(String),
    Redis(String),
    Memory,
}

#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    pub url: Option<String>,
    pub enabled: bool,
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_attempts: i32,
    /// Days a delivered outbox row is kept before it is purged.
    pub retention_days: i64,
}

impl DocumentStoreConfig {
    pub fn from_env() -> Result<Self> {
        let url = env::var("DOCUMENT_STORE_URL").ok().filter(|u| !u.trim().is_empty());
        let enabled = env::var("DOCUMENT_STORE_ENABLED")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);
        let poll_seconds = env::var("OUTBOX_POLL_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let batch_size = env::var("OUTBOX_BATCH_SIZE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);
        let max_attempts = env::var("OUTBOX_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let retention_days = env::var("OUTBOX_RETENTION_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .unwrap_or(7);

        let config = Self {
            url,
            enabled,
            poll_interval: Duration::from_secs(poll_seconds.max(1)),
            batch_size,
            max_attempts,
            retention_days: retention_days.max(0),
        };
        // Fail at startup on an unknown scheme rather than at first write.
        config.backend()?;
        Ok(config)
    }

    pub fn backend(&self) -> Result<DocumentBackend> {
        if !self.enabled {
            return Ok(DocumentBackend::Disabled);
        }
        let Some(url) = &self.url else {
            return Ok(DocumentBackend::Disabled);
        };

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DocumentBackend::Postgres(url.clone()))
        } else if url.starts_with("redis://") || url.starts_with("rediss://") {
            Ok(DocumentBackend::Redis(url.clone()))
        } else if url.starts_with("memory://") {
            Ok(DocumentBackend::Memory)
        } else {
            bail!("unsupported DOCUMENT_STORE_URL scheme: {}", url)
        }
    }
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            enabled: true,
            poll_interval: Duration::from_secs(5),
            batch_size: 50,
            max_attempts: 10,
            retention_days: 7,
        }
    }
}
