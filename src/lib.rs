//! # vcf-ingest
//!
//! Parallel ingestion of tab-delimited genomic variant files (VCF) into a
//! document store, with a loss check at the end.
//!
//! A run goes through four stages:
//!
//! 1. **Plan** ([`planner`]): one pass finds the `#CHROM` header and counts
//!    data lines, a second pass cuts the file into byte ranges of whole lines,
//!    roughly four per worker.
//! 2. **Parse** ([`worker`], [`codec`]): each chunk is read with its own file
//!    handle, every data line becomes a [`VariantRecord`], and malformed lines
//!    are counted and skipped.
//! 3. **Store** ([`sink`]): records go to a caller-provided [`DocumentSink`]
//!    in unordered bulk writes of [`DEFAULT_BATCH_SIZE`] documents.
//! 4. **Check** ([`stats`], [`validation`]): the [`Runner`] folds chunk
//!    results into [`IngestionStats`] and the [`LossPolicy`] decides whether
//!    the run lost too many records.
//!
//! A chunk that fails or exceeds its timeout counts as zero; the run goes on.
//! Only a missing file or a missing header aborts a run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vcf_ingest::{MemorySink, process_file};
//!
//! # fn main() -> anyhow::Result<()> {
//! let sink = Arc::new(MemorySink::new());
//! let stats = process_file("cohort/chr1.vcf", 8, sink.clone())?;
//!
//! let verdict = stats.validate();
//! println!("{verdict}");
//! assert_eq!(sink.len() as u64, stats.inserted_documents);
//! # Ok(())
//! # }
//! ```
//!
//! ## Options
//!
//! [`IngestOptions`] carries the worker count, batch size, chunk timeout and
//! loss tolerance. It can be built in code or loaded from TOML.
//!
//! ## Feature Flags
//!
//! - `io-jsonl` (default): [`JsonlSink`], a JSON Lines file sink
//! - `cli` (default): the `vcf-ingest` binary

pub mod codec;
pub mod config;
pub mod error;
pub mod io;
pub mod metrics;
pub mod planner;
pub mod record;
pub mod report;
pub mod runner;
pub mod sink;
pub mod stats;
pub mod testing;
pub mod validation;
pub mod worker;

pub use codec::{DropReason, LineKind, parse_info, parse_line};
pub use config::{DEFAULT_CHUNK_TIMEOUT_MS, IngestOptions};
pub use error::{BulkWriteError, ConfigError, IngestError};
pub use planner::{ChunkPlan, ChunkSpec, plan_chunks};
pub use record::{FieldMap, HeaderInfo, InfoValue, Number, VariantRecord};
pub use report::{ChunkLog, ChunkStatus, FileStatus, IngestionReport};
pub use runner::{Runner, process_file};
pub use sink::{DocumentFilter, DocumentSink, MemorySink};
pub use stats::{ChunkCounts, IngestionStats};
pub use validation::{DEFAULT_MAX_LOST_RECORDS, LossPolicy, LossVerdict};
pub use worker::{ChunkOutcome, DEFAULT_BATCH_SIZE, process_chunk};

#[cfg(feature = "io-jsonl")]
pub use sink::JsonlSink;
