//! In-memory document store.

use super::{DocumentFilter, DocumentSink};
use crate::error::BulkWriteError;
use crate::record::VariantRecord;
use anyhow::Result;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe in-memory sink.
///
/// Useful as a default target for dry runs and as the reference sink in
/// tests. Documents are kept in arrival order, which across workers is
/// arbitrary.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<Vec<VariantRecord>>,
}

/// One page of a [`MemorySink::find`] query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub total_results: u64,
    pub page: usize,
    pub per_page: usize,
    pub results: Vec<VariantRecord>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<VariantRecord>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every stored document.
    #[must_use]
    pub fn documents(&self) -> Vec<VariantRecord> {
        self.lock().clone()
    }

    /// Paginated lookup. `page` is 1-based; page 0 is treated as page 1.
    #[must_use]
    pub fn find(&self, filter: &DocumentFilter, page: usize, per_page: usize) -> SearchPage {
        let page = page.max(1);
        let docs = self.lock();
        let matching: Vec<&VariantRecord> = docs.iter().filter(|d| filter.matches(d)).collect();
        let results = matching
            .iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .map(|d| (*d).clone())
            .collect();
        SearchPage {
            total_results: matching.len() as u64,
            page,
            per_page,
            results,
        }
    }
}

impl DocumentSink for MemorySink {
    fn bulk_insert(&self, batch: Vec<VariantRecord>) -> Result<u64, BulkWriteError> {
        let n = batch.len() as u64;
        self.lock().extend(batch);
        Ok(n)
    }

    fn count_documents(&self, filter: &DocumentFilter) -> Result<u64> {
        Ok(self.lock().iter().filter(|d| filter.matches(d)).count() as u64)
    }
}
