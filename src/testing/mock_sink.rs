//! Sinks that misbehave on purpose.

use crate::error::BulkWriteError;
use crate::record::VariantRecord;
use crate::sink::{DocumentFilter, DocumentSink, MemorySink};
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A [`MemorySink`] wrapper with injectable faults.
///
/// - `reject_every(n)`: every `n`-th document submitted (counted across all
///   workers) is rejected and the batch reports a partial write.
/// - `delay_per_batch(d)`: every bulk write sleeps for `d` first.
/// - `panic_on_chromosome(c)`: a batch containing chromosome `c` panics.
/// - `fail_all()`: nothing is persisted and every write reports zero inserted.
///
/// ```
/// use vcf_ingest::testing::FaultySink;
///
/// let sink = FaultySink::new().reject_every(10);
/// assert!(sink.inner().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct FaultySink {
    inner: MemorySink,
    reject_every: Option<u64>,
    delay: Option<Duration>,
    panic_on: Option<String>,
    fail_all: bool,
    submitted: AtomicU64,
    rejected: AtomicU64,
    batches: AtomicU64,
}

impl FaultySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reject_every(mut self, n: u64) -> Self {
        self.reject_every = Some(n.max(1));
        self
    }

    #[must_use]
    pub fn delay_per_batch(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn panic_on_chromosome(mut self, chromosome: impl Into<String>) -> Self {
        self.panic_on = Some(chromosome.into());
        self
    }

    #[must_use]
    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// The documents that were actually persisted.
    #[must_use]
    pub fn inner(&self) -> &MemorySink {
        &self.inner
    }

    /// Documents submitted so far.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Documents rejected so far.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Bulk writes received so far.
    #[must_use]
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

impl DocumentSink for FaultySink {
    fn bulk_insert(&self, batch: Vec<VariantRecord>) -> Result<u64, BulkWriteError> {
        self.batches.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(chrom) = &self.panic_on
            && batch.iter().any(|r| &r.chromosome == chrom)
        {
            panic!("injected failure on chromosome {chrom}");
        }

        let attempted = batch.len() as u64;
        if self.fail_all {
            self.submitted.fetch_add(attempted, Ordering::Relaxed);
            self.rejected.fetch_add(attempted, Ordering::Relaxed);
            return Err(BulkWriteError {
                inserted: 0,
                attempted,
                message: "store unavailable".to_string(),
            });
        }

        let mut kept = Vec::with_capacity(batch.len());
        let mut rejected = 0u64;
        for record in batch {
            let seq = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
            if self.reject_every.is_some_and(|n| seq % n == 0) {
                rejected += 1;
            } else {
                kept.push(record);
            }
        }
        let inserted = self.inner.bulk_insert(kept)?;
        if rejected > 0 {
            self.rejected.fetch_add(rejected, Ordering::Relaxed);
            return Err(BulkWriteError {
                inserted,
                attempted,
                message: format!("{rejected} documents rejected"),
            });
        }
        Ok(inserted)
    }

    fn count_documents(&self, filter: &DocumentFilter) -> Result<u64> {
        self.inner.count_documents(filter)
    }
}
