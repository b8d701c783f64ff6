//! Chunk planner.
//!
//! The planner streams the input twice:
//!
//! 1. **Scan** -- count data lines and capture the `#CHROM` header.
//! 2. **Slice** -- walk the file again tracking byte offsets and close a
//!    chunk every `target_lines` data lines.
//!
//! Chunks start at the first byte of a data line and end just past the
//! newline of a data line, so they are contiguous, non-overlapping and
//! together cover every data line exactly once. Comment or blank lines that
//! sit between data lines fall inside a chunk and are skipped by the worker.
//!
//! The target chunk size oversubscribes the worker pool by
//! [`OVERSUBSCRIPTION`] to even out chunks of uneven byte size.

use crate::codec::LineKind;
use crate::error::IngestError;
use crate::record::{HEADER_PREFIX, HeaderInfo};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Chunks per worker.
pub const OVERSUBSCRIPTION: u64 = 4;

/// A byte range of the input file assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub start_offset: u64,
    pub length: u64,
}

impl ChunkSpec {
    #[must_use]
    pub fn new(start_offset: u64, length: u64) -> Self {
        Self {
            start_offset,
            length,
        }
    }

    /// Exclusive end offset.
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.start_offset.saturating_add(self.length)
    }
}

/// The planner's output for one file.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub path: PathBuf,
    pub header: HeaderInfo,
    pub chunks: Vec<ChunkSpec>,
    /// Non-comment, non-blank lines in the file.
    pub total_lines: u64,
    /// Data lines per chunk (the last chunk may hold fewer).
    pub target_lines: u64,
}

/// Result of the first pass.
#[derive(Debug, Clone)]
pub struct HeaderScan {
    pub header: HeaderInfo,
    pub total_lines: u64,
}

/// Data lines per chunk for `total_lines` spread over `processor_count` workers.
///
/// When there are fewer lines than `OVERSUBSCRIPTION * processor_count` the
/// whole file becomes a single chunk.
#[must_use]
pub fn target_lines_per_chunk(total_lines: u64, processor_count: usize) -> u64 {
    let slots = OVERSUBSCRIPTION * processor_count.max(1) as u64;
    if total_lines < slots {
        total_lines.max(1)
    } else {
        total_lines / slots
    }
}

fn open(path: &Path) -> Result<BufReader<File>, IngestError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| IngestError::open(path, e))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> IngestError + '_ {
    move |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// First pass: find the header and count data lines.
///
/// # Errors
/// `FileNotFound` if the file is missing, `HeaderNotFound` if no `#CHROM`
/// line exists, `Io` for read failures.
pub fn scan_header(path: impl AsRef<Path>) -> Result<HeaderScan, IngestError> {
    let path = path.as_ref();
    let mut rdr = open(path)?;
    let mut buf = Vec::new();
    let mut header = None;
    let mut total_lines = 0u64;
    loop {
        buf.clear();
        if rdr.read_until(b'\n', &mut buf).map_err(io_err(path))? == 0 {
            break;
        }
        match LineKind::of(&buf) {
            LineKind::Data => total_lines += 1,
            LineKind::Comment if header.is_none() && buf.starts_with(HEADER_PREFIX.as_bytes()) => {
                header = HeaderInfo::parse(&String::from_utf8_lossy(&buf));
            }
            LineKind::Comment | LineKind::Blank => {}
        }
    }
    let header = header.ok_or_else(|| IngestError::HeaderNotFound {
        path: path.to_path_buf(),
    })?;
    Ok(HeaderScan {
        header,
        total_lines,
    })
}

/// Second pass: cut the file into chunks of `target_lines` data lines.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn slice_chunks(
    path: impl AsRef<Path>,
    target_lines: u64,
) -> Result<Vec<ChunkSpec>, IngestError> {
    let path = path.as_ref();
    let target_lines = target_lines.max(1);
    let mut rdr = open(path)?;
    let mut buf = Vec::new();
    let mut chunks = Vec::new();
    let mut offset = 0u64;
    let mut chunk_start: Option<u64> = None;
    let mut last_data_end = 0u64;
    let mut lines_in_chunk = 0u64;
    loop {
        buf.clear();
        let n = rdr.read_until(b'\n', &mut buf).map_err(io_err(path))? as u64;
        if n == 0 {
            break;
        }
        let line_start = offset;
        offset += n;
        if LineKind::of(&buf) != LineKind::Data {
            continue;
        }
        let start = *chunk_start.get_or_insert(line_start);
        last_data_end = offset;
        lines_in_chunk += 1;
        if lines_in_chunk == target_lines {
            chunks.push(ChunkSpec::new(start, offset - start));
            chunk_start = None;
            lines_in_chunk = 0;
        }
    }
    if let Some(start) = chunk_start {
        chunks.push(ChunkSpec::new(start, last_data_end - start));
    }
    Ok(chunks)
}

/// Plan a file for `processor_count` workers.
///
/// A file with a header but no data lines yields an empty chunk list.
///
/// # Errors
/// Fails with `FileNotFound` or `HeaderNotFound`; other read failures surface
/// as `Io`.
pub fn plan_chunks(
    path: impl AsRef<Path>,
    processor_count: usize,
) -> Result<ChunkPlan, IngestError> {
    let path = path.as_ref();
    let HeaderScan {
        header,
        total_lines,
    } = scan_header(path)?;
    let target_lines = target_lines_per_chunk(total_lines, processor_count);
    let chunks = if total_lines == 0 {
        Vec::new()
    } else {
        slice_chunks(path, target_lines)?
    };
    Ok(ChunkPlan {
        path: path.to_path_buf(),
        header,
        chunks,
        total_lines,
        target_lines,
    })
}
