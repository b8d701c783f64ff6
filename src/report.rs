//! Per-file ingestion report.
//!
//! The report bundles the frozen [`IngestionStats`], the loss verdict and a
//! processing log entry per chunk. It serializes to JSON so callers can
//! store it next to the ingested documents or hand it back to a client.

use crate::planner::ChunkSpec;
use crate::stats::{ChunkCounts, IngestionStats};
use crate::validation::LossVerdict;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Final status of an ingested file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// The loss stayed within tolerance.
    Completed,
    /// The loss exceeded the tolerance.
    Failed,
}

/// How a chunk ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChunkStatus {
    Completed,
    Failed { reason: String },
    TimedOut,
}

/// Processing log entry for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLog {
    pub index: usize,
    pub start_offset: u64,
    pub length: u64,
    pub status: ChunkStatus,
    /// Zero unless `status` is `Completed`.
    pub counts: ChunkCounts,
    pub elapsed_ms: u64,
}

impl ChunkLog {
    pub(crate) fn new(index: usize, spec: ChunkSpec, status: ChunkStatus) -> Self {
        Self {
            index,
            start_offset: spec.start_offset,
            length: spec.length,
            status,
            counts: ChunkCounts::default(),
            elapsed_ms: 0,
        }
    }
}

/// Everything known about one ingested file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub file: PathBuf,
    pub status: FileStatus,
    pub stats: IngestionStats,
    pub validation: LossVerdict,
    /// Chunk logs ordered by chunk index.
    pub chunks: Vec<ChunkLog>,
}

impl IngestionReport {
    pub(crate) fn new(
        file: PathBuf,
        stats: IngestionStats,
        validation: LossVerdict,
        mut chunks: Vec<ChunkLog>,
    ) -> Self {
        chunks.sort_by_key(|c| c.index);
        let status = if validation.ok {
            FileStatus::Completed
        } else {
            FileStatus::Failed
        };
        Self {
            file,
            status,
            stats,
            validation,
            chunks,
        }
    }

    /// Chunks that did not complete.
    pub fn unfinished_chunks(&self) -> impl Iterator<Item = &ChunkLog> {
        self.chunks
            .iter()
            .filter(|c| c.status != ChunkStatus::Completed)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize ingestion report")
    }

    /// Write the report as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("write {}", path.display()))
    }
}
