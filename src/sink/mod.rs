//! Document sinks.
//!
//! The ingestion core never talks to a database directly. Workers hand
//! batches of parsed records to a [`DocumentSink`] that the caller constructs
//! and owns. A sink must tolerate concurrent `bulk_insert` calls from several
//! workers and treat each batch as an unordered write: one failing document
//! must not stop the rest of the batch.
//!
//! Implementations:
//! - [`MemorySink`] - in-memory store with filtering and pagination
//! - [`JsonlSink`] - appends one JSON document per line to a file (feature `io-jsonl`)

use crate::error::BulkWriteError;
use crate::record::VariantRecord;
use anyhow::Result;
use regex::Regex;
use std::ops::RangeInclusive;

pub mod memory;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

pub use memory::{MemorySink, SearchPage};

#[cfg(feature = "io-jsonl")]
pub use jsonl::JsonlSink;

/// Bulk-storage collaborator of the ingestion core.
pub trait DocumentSink: Send + Sync {
    /// Persist `batch` as an unordered bulk write.
    ///
    /// Returns the number of documents persisted. On partial failure returns a
    /// [`BulkWriteError`] carrying the count that did make it.
    fn bulk_insert(&self, batch: Vec<VariantRecord>) -> Result<u64, BulkWriteError>;

    /// Count persisted documents matching `filter`.
    ///
    /// Used for post-run verification, never by the ingestion core itself.
    ///
    /// # Errors
    /// Returns an error if the underlying store cannot be read.
    fn count_documents(&self, filter: &DocumentFilter) -> Result<u64>;
}

/// Predicate over persisted documents.
///
/// An empty filter matches everything.
///
/// ```
/// use vcf_ingest::sink::DocumentFilter;
///
/// let filter = DocumentFilter::new()
///     .chromosome_matches(r"^chr[0-9]+$")?
///     .position_range(1_000..=2_000)
///     .filter_status("PASS");
/// # Ok::<(), regex::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    chromosome: Option<String>,
    chromosome_pattern: Option<Regex>,
    positions: Option<RangeInclusive<u64>>,
    filter_status: Option<String>,
}

impl DocumentFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Match an exact chromosome name.
    #[must_use]
    pub fn chromosome(mut self, chromosome: impl Into<String>) -> Self {
        self.chromosome = Some(chromosome.into());
        self
    }

    /// Match chromosome names against a regular expression.
    ///
    /// # Errors
    /// Returns an error if `pattern` is not a valid regex.
    pub fn chromosome_matches(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.chromosome_pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Match positions within an inclusive range.
    #[must_use]
    pub fn position_range(mut self, positions: RangeInclusive<u64>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Match an exact FILTER status.
    #[must_use]
    pub fn filter_status(mut self, status: impl Into<String>) -> Self {
        self.filter_status = Some(status.into());
        self
    }

    /// Does `record` satisfy every configured condition?
    #[must_use]
    pub fn matches(&self, record: &VariantRecord) -> bool {
        self.chromosome
            .as_ref()
            .is_none_or(|c| *c == record.chromosome)
            && self
                .chromosome_pattern
                .as_ref()
                .is_none_or(|re| re.is_match(&record.chromosome))
            && self
                .positions
                .as_ref()
                .is_none_or(|range| range.contains(&record.position))
            && self
                .filter_status
                .as_ref()
                .is_none_or(|s| *s == record.filter_status)
    }
}
