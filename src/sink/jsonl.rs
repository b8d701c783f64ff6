//! JSON Lines (JSONL) file sink.
//!
//! Every persisted record becomes one compact JSON document followed by `\n`.
//! Batches from different workers are appended under a lock, so the file is
//! never interleaved mid-line, but batch order across workers is arbitrary.
//!
//! # Notes
//! - A record that fails to serialize is skipped; the rest of its batch is
//!   still written.
//! - A write failure stops the batch and reports how many documents were
//!   written before it.

use super::{DocumentFilter, DocumentSink};
use crate::error::BulkWriteError;
use crate::record::VariantRecord;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Appends records to a JSONL file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    /// Create (or truncate) `path`. Parent directories are created as needed.
    ///
    /// # Errors
    /// Returns an error if the file or its directories cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self::from_file(path, f))
    }

    /// Open `path` for appending, creating it if missing.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open {} for append", path.display()))?;
        Ok(Self::from_file(path, f))
    }

    fn from_file(path: &Path, f: File) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(f)),
        }
    }

    /// Location of the output file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered documents to disk.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> Result<()> {
        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        w.flush()
            .with_context(|| format!("flush {}", self.path.display()))
    }

    /// Read every persisted document back.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line fails to parse.
    pub fn read_all(&self) -> Result<Vec<VariantRecord>> {
        self.flush()?;
        let mut out = Vec::new();
        self.scan(|record| out.push(record))?;
        Ok(out)
    }

    fn scan(&self, mut visit: impl FnMut(VariantRecord)) -> Result<()> {
        let path = &self.path;
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        for (i, line) in BufReader::new(f).lines().enumerate() {
            let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: VariantRecord = serde_json::from_str(&line)
                .with_context(|| format!("parse JSONL line {} in {}", i + 1, path.display()))?;
            visit(record);
        }
        Ok(())
    }
}

impl DocumentSink for JsonlSink {
    fn bulk_insert(&self, batch: Vec<VariantRecord>) -> Result<u64, BulkWriteError> {
        let attempted = batch.len() as u64;
        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut inserted = 0u64;
        let mut line = Vec::with_capacity(512);
        for record in &batch {
            line.clear();
            if let Err(e) = serde_json::to_writer(&mut line, record) {
                warn!(
                    chromosome = %record.chromosome,
                    position = record.position,
                    "skipping unserializable record: {e}"
                );
                continue;
            }
            line.push(b'\n');
            if let Err(e) = w.write_all(&line) {
                return Err(BulkWriteError {
                    inserted,
                    attempted,
                    message: format!("write {}: {e}", self.path.display()),
                });
            }
            inserted += 1;
        }
        if let Err(e) = w.flush() {
            return Err(BulkWriteError {
                inserted,
                attempted,
                message: format!("flush {}: {e}", self.path.display()),
            });
        }
        if inserted < attempted {
            return Err(BulkWriteError {
                inserted,
                attempted,
                message: "some records could not be serialized".to_string(),
            });
        }
        Ok(inserted)
    }

    fn count_documents(&self, filter: &DocumentFilter) -> Result<u64> {
        self.flush()?;
        let mut count = 0u64;
        self.scan(|record| {
            if filter.matches(&record) {
                count += 1;
            }
        })?;
        Ok(count)
    }
}
