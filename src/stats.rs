//! Ingestion statistics.
//!
//! [`StatsRecorder`] is the live, concurrently updated accumulator owned by
//! the coordinator; every counter is an atomic so chunk completions can be
//! folded in from any thread. [`StatsRecorder::finish`] freezes it into an
//! [`IngestionStats`] snapshot used for reporting and validation.

use crate::validation::{LossPolicy, LossVerdict};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Counts produced by one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCounts {
    /// Lines the codec turned into records.
    pub processed: u64,
    /// Lines the codec rejected.
    pub dropped: u64,
    /// Documents the sink reported as persisted.
    pub inserted: u64,
}

/// Live accumulator for a run.
#[derive(Debug)]
pub struct StatsRecorder {
    started: Instant,
    started_at: SystemTime,
    total_lines: u64,
    chunk_count: u64,
    processed_lines: AtomicU64,
    dropped_lines: AtomicU64,
    inserted_documents: AtomicU64,
    failed_chunks: AtomicU64,
    timed_out_chunks: AtomicU64,
}

impl StatsRecorder {
    /// Start the clock for a run over `total_lines` data lines split into
    /// `chunk_count` chunks.
    #[must_use]
    pub fn start(total_lines: u64, chunk_count: u64) -> Self {
        Self {
            started: Instant::now(),
            started_at: SystemTime::now(),
            total_lines,
            chunk_count,
            processed_lines: AtomicU64::new(0),
            dropped_lines: AtomicU64::new(0),
            inserted_documents: AtomicU64::new(0),
            failed_chunks: AtomicU64::new(0),
            timed_out_chunks: AtomicU64::new(0),
        }
    }

    /// Fold in the counts of a completed chunk.
    pub fn record_chunk(&self, counts: ChunkCounts) {
        self.processed_lines
            .fetch_add(counts.processed, Ordering::Relaxed);
        self.dropped_lines.fetch_add(counts.dropped, Ordering::Relaxed);
        self.inserted_documents
            .fetch_add(counts.inserted, Ordering::Relaxed);
    }

    /// Count a chunk that failed; its lines contribute nothing.
    pub fn record_failure(&self) {
        self.failed_chunks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a chunk that exceeded its timeout; its lines contribute nothing.
    pub fn record_timeout(&self) {
        self.timed_out_chunks.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn processed_lines(&self) -> u64 {
        self.processed_lines.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn inserted_documents(&self) -> u64 {
        self.inserted_documents.load(Ordering::Relaxed)
    }

    /// Stamp the end time and freeze the counters.
    #[must_use]
    pub fn finish(self) -> IngestionStats {
        let elapsed = self.started.elapsed();
        IngestionStats {
            started_at_ms: unix_millis(self.started_at),
            finished_at_ms: unix_millis(self.started_at + elapsed),
            elapsed,
            total_lines: self.total_lines,
            processed_lines: self.processed_lines.into_inner(),
            dropped_lines: self.dropped_lines.into_inner(),
            inserted_documents: self.inserted_documents.into_inner(),
            chunk_count: self.chunk_count,
            failed_chunks: self.failed_chunks.into_inner(),
            timed_out_chunks: self.timed_out_chunks.into_inner(),
        }
    }
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Frozen statistics of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionStats {
    /// Run start, milliseconds since the Unix epoch.
    pub started_at_ms: u64,
    /// Run end, milliseconds since the Unix epoch.
    pub finished_at_ms: u64,
    pub elapsed: Duration,
    /// Data lines found by the planner.
    pub total_lines: u64,
    /// Lines the codec accepted.
    pub processed_lines: u64,
    /// Lines the codec rejected.
    pub dropped_lines: u64,
    /// Documents the sink persisted.
    pub inserted_documents: u64,
    pub chunk_count: u64,
    pub failed_chunks: u64,
    pub timed_out_chunks: u64,
}

impl IngestionStats {
    /// Accepted lines per second of wall time; `0.0` for a zero-length run.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed_lines as f64 / secs
        } else {
            0.0
        }
    }

    /// Lines seen but not persisted.
    #[must_use]
    pub fn loss(&self) -> u64 {
        self.total_lines.saturating_sub(self.inserted_documents)
    }

    /// Check the loss against the default tolerance.
    #[must_use]
    pub fn validate(&self) -> LossVerdict {
        self.validate_with(&LossPolicy::default())
    }

    /// Check the loss against `policy`.
    #[must_use]
    pub fn validate_with(&self, policy: &LossPolicy) -> LossVerdict {
        policy.check(self.total_lines, self.inserted_documents)
    }
}
