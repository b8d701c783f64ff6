//! Error types for the ingestion core.
//!
//! Only [`IngestError::FileNotFound`], [`IngestError::HeaderNotFound`] and the
//! setup failures around them ever reach the caller of
//! [`process_file`](crate::runner::process_file). Chunk-scoped variants are
//! produced by the worker and folded into the run statistics by the
//! coordinator.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while planning or running an ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The input file does not exist.
    #[error("input file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// No `#CHROM` column-header line was found before EOF.
    #[error("no #CHROM header line found in {}", path.display())]
    HeaderNotFound { path: PathBuf },

    /// Any other I/O failure while scanning the input file.
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be started.
    #[error("failed to build worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Invalid ingestion options.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Opening, seeking or reading a chunk failed. Aborts only that chunk.
    #[error("failed to read chunk at offset {offset}")]
    ChunkRead {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// The coordinator gave up on this chunk (timeout) and asked it to stop.
    #[error("chunk at offset {offset} was cancelled")]
    ChunkCancelled { offset: u64 },
}

impl IngestError {
    /// Map an `open` failure to `FileNotFound` or a generic I/O error.
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// `true` for errors that abort the whole run rather than a single chunk.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ChunkRead { .. } | Self::ChunkCancelled { .. }
        )
    }
}

/// Errors raised while loading or validating [`IngestOptions`](crate::config::IngestOptions).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has unknown keys.
    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// A bulk write that persisted only part of its batch.
///
/// Sinks return this instead of a plain error so the worker can still count
/// the documents that made it.
#[derive(Debug, Error)]
#[error("bulk write persisted {inserted} of {attempted} documents: {message}")]
pub struct BulkWriteError {
    /// Documents persisted before or around the failure.
    pub inserted: u64,
    /// Documents submitted in the batch.
    pub attempted: u64,
    /// Description of the underlying failure.
    pub message: String,
}
