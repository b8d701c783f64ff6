//! Ingestion options.
//!
//! Options have working defaults, can be loaded from TOML, and are checked by
//! [`IngestOptions::validate`] before a run starts.
//!
//! ```toml
//! processor_count = 8
//! batch_size = 1000
//! chunk_timeout_ms = 300000
//! max_lost_records = 1340
//! ```

use crate::error::ConfigError;
use crate::validation::{DEFAULT_MAX_LOST_RECORDS, LossPolicy};
use crate::worker::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default per-chunk timeout (five minutes).
pub const DEFAULT_CHUNK_TIMEOUT_MS: u64 = 300_000;

/// Tunables of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestOptions {
    /// Worker pool size; `None` uses the available hardware parallelism.
    pub processor_count: Option<usize>,
    /// Records per unordered bulk write.
    pub batch_size: usize,
    /// Time a single chunk may run before it is abandoned.
    pub chunk_timeout_ms: u64,
    /// Loss tolerance applied by the validator.
    pub max_lost_records: u64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            processor_count: None,
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_timeout_ms: DEFAULT_CHUNK_TIMEOUT_MS,
            max_lost_records: DEFAULT_MAX_LOST_RECORDS,
        }
    }
}

impl IngestOptions {
    /// Parse options from a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns `Parse` for malformed TOML or unknown keys, `Invalid` for
    /// out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    /// Returns `Read` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values the coordinator cannot work with.
    ///
    /// # Errors
    /// Returns `Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.processor_count == Some(0) {
            return invalid("processor_count must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if self.chunk_timeout_ms == 0 {
            return invalid("chunk_timeout_ms must be at least 1");
        }
        Ok(())
    }

    /// Effective worker pool size.
    #[must_use]
    pub fn processors(&self) -> usize {
        self.processor_count.unwrap_or_else(num_cpus::get).max(1)
    }

    #[must_use]
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }

    #[must_use]
    pub fn loss_policy(&self) -> LossPolicy {
        LossPolicy::new(self.max_lost_records)
    }
}
