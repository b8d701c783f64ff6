//! Assertions over plans and run statistics.

use crate::codec::LineKind;
use crate::planner::ChunkSpec;
use crate::stats::IngestionStats;
use std::path::Path;

/// Assert that `chunks` tile the data lines of the file at `path`.
///
/// Checks that chunks are sorted, non-empty and non-overlapping, that every
/// chunk starts at a line start and ends at a line end (or EOF), and that
/// every data line of the file falls in exactly one chunk.
///
/// # Panics
///
/// Panics if the file cannot be read or any of the above does not hold.
pub fn assert_chunks_cover(path: impl AsRef<Path>, chunks: &[ChunkSpec]) {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    let len = bytes.len() as u64;

    let mut prev_end = 0u64;
    for (i, c) in chunks.iter().enumerate() {
        assert!(c.length > 0, "chunk {i} is empty: {c:?}");
        assert!(
            c.start_offset >= prev_end,
            "chunk {i} overlaps its predecessor: {c:?} starts before {prev_end}"
        );
        assert!(c.end_offset() <= len, "chunk {i} runs past EOF ({len}): {c:?}");
        let start = usize::try_from(c.start_offset).unwrap_or(usize::MAX);
        let end = usize::try_from(c.end_offset()).unwrap_or(usize::MAX);
        assert!(
            start == 0 || bytes[start - 1] == b'\n',
            "chunk {i} does not start at a line start: {c:?}"
        );
        assert!(
            c.end_offset() == len || bytes[end - 1] == b'\n',
            "chunk {i} does not end at a line end: {c:?}"
        );
        prev_end = c.end_offset();
    }

    let mut offset = 0u64;
    for line in bytes.split_inclusive(|b| *b == b'\n') {
        let line_start = offset;
        offset += line.len() as u64;
        if LineKind::of(line) != LineKind::Data {
            continue;
        }
        let owners = chunks
            .iter()
            .filter(|c| c.start_offset <= line_start && line_start < c.end_offset())
            .count();
        assert_eq!(
            owners,
            1,
            "data line at offset {line_start} is covered by {owners} chunks: {:?}",
            String::from_utf8_lossy(line)
        );
    }
}

/// Assert the counting invariants of a finished run.
///
/// # Panics
///
/// Panics if processed and dropped lines exceed the total, or if more
/// documents were inserted than lines processed.
pub fn assert_stats_consistent(stats: &IngestionStats) {
    assert!(
        stats.processed_lines + stats.dropped_lines <= stats.total_lines,
        "processed ({}) + dropped ({}) exceeds total ({})",
        stats.processed_lines,
        stats.dropped_lines,
        stats.total_lines
    );
    assert!(
        stats.inserted_documents <= stats.processed_lines,
        "inserted ({}) exceeds processed ({})",
        stats.inserted_documents,
        stats.processed_lines
    );
    assert!(
        stats.finished_at_ms >= stats.started_at_ms,
        "run finished before it started"
    );
}

/// Assert a clean run: every chunk completed and every line is accounted for.
///
/// # Panics
///
/// Panics if a chunk failed or timed out, or if processed plus dropped lines
/// do not add up to the total.
pub fn assert_all_lines_accounted(stats: &IngestionStats) {
    assert_stats_consistent(stats);
    assert_eq!(stats.failed_chunks, 0, "unexpected failed chunks");
    assert_eq!(stats.timed_out_chunks, 0, "unexpected timed-out chunks");
    assert_eq!(
        stats.processed_lines + stats.dropped_lines,
        stats.total_lines,
        "lines unaccounted for"
    );
}
