//! Chunk worker: parse one byte range and flush it to the sink in batches.
//!
//! The worker opens its own handle on the input file, so any number of
//! workers can run side by side without sharing a file cursor. Everything
//! that goes wrong with a single line is counted as a drop; only a failure
//! to read the chunk itself (or a cancellation request) ends the chunk early.
//!
//! # Boundary fix-up
//! The planner produces exact line boundaries, but the worker does not rely
//! on it. A chunk that does not start right after a newline discards its
//! leading fragment, and a chunk that does not end at EOF discards whatever
//! follows its last newline. Neither fragment is ever parsed.

use crate::codec::{LineKind, parse_bytes};
use crate::error::IngestError;
use crate::planner::ChunkSpec;
use crate::record::{HeaderInfo, VariantRecord};
use crate::sink::DocumentSink;
use crate::stats::ChunkCounts;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Records per bulk write.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// What one chunk produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub counts: ChunkCounts,
    /// Bulk writes issued.
    pub batches: u64,
    /// Bulk writes that persisted only part of their batch.
    pub partial_writes: u64,
}

/// Read the bytes of `spec`, trimmed to whole lines.
///
/// # Errors
/// Returns `ChunkRead` if the file cannot be opened, sought or read.
pub fn read_chunk(path: impl AsRef<Path>, spec: ChunkSpec) -> Result<Vec<u8>, IngestError> {
    let err = |source: std::io::Error| IngestError::ChunkRead {
        offset: spec.start_offset,
        source,
    };
    let mut f = File::open(path.as_ref()).map_err(err)?;
    let file_len = f.metadata().map_err(err)?.len();

    // A range running past EOF is read only up to EOF.
    let start = spec.start_offset.min(file_len);
    let len = spec.length.min(file_len - start);

    // One extra byte in front tells us whether the range starts a line.
    let lead = u64::from(start > 0);
    f.seek(SeekFrom::Start(start - lead)).map_err(err)?;
    let mut buf = Vec::with_capacity(usize::try_from(len + lead).unwrap_or(0));
    f.take(len + lead).read_to_end(&mut buf).map_err(err)?;

    Ok(trim_to_lines(buf, lead == 1, start + len >= file_len))
}

fn trim_to_lines(mut buf: Vec<u8>, has_lead_byte: bool, at_eof: bool) -> Vec<u8> {
    let start = if has_lead_byte {
        // buf[0] is the byte before the range: a newline means we start a line.
        buf.iter()
            .position(|b| *b == b'\n')
            .map_or(buf.len(), |i| i + 1)
    } else {
        0
    };
    let end = if at_eof {
        buf.len()
    } else {
        buf.iter()
            .rposition(|b| *b == b'\n')
            .map_or(start, |i| i + 1)
    };
    buf.truncate(end.max(start));
    buf.drain(..start);
    buf
}

/// Parses chunks of one file into one sink.
pub struct ChunkWorker<'a> {
    path: &'a Path,
    header: &'a HeaderInfo,
    sink: &'a dyn DocumentSink,
    batch_size: usize,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> ChunkWorker<'a> {
    pub fn new(path: &'a Path, header: &'a HeaderInfo, sink: &'a dyn DocumentSink) -> Self {
        Self {
            path,
            header,
            sink,
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: None,
        }
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Stop before the next bulk write once `flag` is set.
    #[must_use]
    pub fn cancel_on(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Parse every data line of `spec` and write the records to the sink.
    ///
    /// # Errors
    /// `ChunkRead` when the range cannot be read, `ChunkCancelled` when the
    /// cancel flag was raised. Per-line problems are never errors.
    pub fn process(&self, spec: ChunkSpec) -> Result<ChunkOutcome, IngestError> {
        let buf = read_chunk(self.path, spec)?;
        let mut outcome = ChunkOutcome::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        for line in buf.split(|b| *b == b'\n') {
            if LineKind::of(line) != LineKind::Data {
                continue;
            }
            match parse_bytes(line, self.header) {
                Ok(record) => {
                    outcome.counts.processed += 1;
                    batch.push(record);
                    if batch.len() >= self.batch_size {
                        self.flush(spec, &mut batch, &mut outcome)?;
                    }
                }
                Err(reason) => {
                    outcome.counts.dropped += 1;
                    warn!(offset = spec.start_offset, "dropped line: {reason}");
                }
            }
        }
        if !batch.is_empty() {
            self.flush(spec, &mut batch, &mut outcome)?;
        }

        debug!(
            offset = spec.start_offset,
            length = spec.length,
            processed = outcome.counts.processed,
            dropped = outcome.counts.dropped,
            inserted = outcome.counts.inserted,
            "chunk done"
        );
        Ok(outcome)
    }

    fn flush(
        &self,
        spec: ChunkSpec,
        batch: &mut Vec<VariantRecord>,
        outcome: &mut ChunkOutcome,
    ) -> Result<(), IngestError> {
        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(IngestError::ChunkCancelled {
                offset: spec.start_offset,
            });
        }
        let records = std::mem::replace(batch, Vec::with_capacity(self.batch_size));
        outcome.batches += 1;
        match self.sink.bulk_insert(records) {
            Ok(inserted) => outcome.counts.inserted += inserted,
            Err(e) => {
                outcome.counts.inserted += e.inserted;
                outcome.partial_writes += 1;
                warn!(offset = spec.start_offset, "partial bulk write: {e}");
            }
        }
        Ok(())
    }
}

/// Process one chunk with default settings.
///
/// # Errors
/// See [`ChunkWorker::process`].
pub fn process_chunk(
    path: impl AsRef<Path>,
    spec: ChunkSpec,
    header: &HeaderInfo,
    sink: &dyn DocumentSink,
) -> Result<ChunkOutcome, IngestError> {
    ChunkWorker::new(path.as_ref(), header, sink).process(spec)
}
