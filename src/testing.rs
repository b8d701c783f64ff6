//! Test support for ingestion code.
//!
//! - [`VcfFixture`]: deterministic synthetic variant files, optionally with
//!   malformed lines, interleaved comments and blank lines
//! - [`FaultySink`]: a sink that rejects, stalls or panics on demand
//! - [`assert_chunks_cover`] and friends: invariant checks for plans and stats
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vcf_ingest::testing::*;
//! use vcf_ingest::{MemorySink, process_file};
//!
//! # fn main() -> anyhow::Result<()> {
//! let fixture = VcfFixture::new(10_000).malformed_at([10, 20, 30]);
//! let file = fixture.temp_file()?;
//! let sink = Arc::new(MemorySink::new());
//! let stats = process_file(file.path(), 4, sink.clone())?;
//!
//! assert_all_lines_accounted(&stats);
//! assert_eq!(stats.inserted_documents, fixture.valid_lines());
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_sink;

pub use assertions::*;
pub use fixtures::*;
pub use mock_sink::*;
