//! Chunk worker: boundary handling, batching and write accounting.

use anyhow::Result;
use std::fs;
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;
use vcf_ingest::planner::{ChunkSpec, scan_header};
use vcf_ingest::testing::{FaultySink, VcfFixture};
use vcf_ingest::worker::{ChunkWorker, read_chunk};
use vcf_ingest::{IngestError, MemorySink, plan_chunks, process_chunk};

#[test]
fn processes_planned_chunk() -> Result<()> {
    let fixture = VcfFixture::new(40).malformed_at([3, 17]).comment_every(6);
    let file = fixture.temp_file()?;
    let plan = plan_chunks(file.path(), 1)?;
    assert_eq!(plan.chunks.len(), 1);

    let sink = MemorySink::new();
    let outcome = process_chunk(file.path(), plan.chunks[0], &plan.header, &sink)?;
    assert_eq!(outcome.counts.processed, 38);
    assert_eq!(outcome.counts.dropped, 2);
    assert_eq!(outcome.counts.inserted, 38);
    assert_eq!(sink.len(), 38);
    Ok(())
}

#[test]
fn batches_respect_batch_size() -> Result<()> {
    let file = VcfFixture::new(25).temp_file()?;
    let plan = plan_chunks(file.path(), 1)?;
    let sink = FaultySink::new();

    let outcome = ChunkWorker::new(file.path(), &plan.header, &sink)
        .batch_size(10)
        .process(plan.chunks[0])?;
    assert_eq!(outcome.batches, 3);
    assert_eq!(sink.batches(), 3);
    assert_eq!(outcome.counts.inserted, 25);
    Ok(())
}

#[test]
fn mid_line_split_discards_both_fragments() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("split.vcf");
    let header_line = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
    let a = "chr1\t1\t.\tA\tG\t1\tPASS\t.\n";
    let b = "chr1\t2\t.\tA\tG\t1\tPASS\t.\n";
    let c = "chr1\t3\t.\tA\tG\t1\tPASS\t.\n";
    fs::write(&path, format!("{header_line}{a}{b}{c}"))?;
    let header = scan_header(&path)?.header;

    // Split in the middle of line `b`.
    let data_start = header_line.len() as u64;
    let cut = data_start + a.len() as u64 + 5;
    let file_len = fs::metadata(&path)?.len();
    let first = ChunkSpec::new(data_start, cut - data_start);
    let second = ChunkSpec::new(cut, file_len - cut);

    assert_eq!(read_chunk(&path, first)?, a.as_bytes());
    assert_eq!(read_chunk(&path, second)?, c.as_bytes());

    let sink = MemorySink::new();
    let one = process_chunk(&path, first, &header, &sink)?;
    let two = process_chunk(&path, second, &header, &sink)?;
    assert_eq!(one.counts.processed + two.counts.processed, 2);
    let mut positions: Vec<u64> = sink.documents().iter().map(|r| r.position).collect();
    positions.sort_unstable();
    assert_eq!(positions, [1, 3]);
    Ok(())
}

#[test]
fn range_past_eof_is_read_up_to_eof() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("short.vcf");
    let header_line = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
    let body = "chr1\t1\t.\tA\tG\t1\tPASS\t.\nchr1\t2\t.\tA\tG\t1\tPASS\t.\n";
    fs::write(&path, format!("{header_line}{body}"))?;
    let header = scan_header(&path)?.header;
    let data_start = header_line.len() as u64;

    let oversized = ChunkSpec::new(data_start, 1 << 46);
    assert_eq!(read_chunk(&path, oversized)?, body.as_bytes());
    let sink = MemorySink::new();
    let outcome = process_chunk(&path, oversized, &header, &sink)?;
    assert_eq!(outcome.counts.inserted, 2);

    let saturated = ChunkSpec::new(data_start, u64::MAX);
    assert_eq!(saturated.end_offset(), u64::MAX);
    assert_eq!(read_chunk(&path, saturated)?, body.as_bytes());

    let beyond = ChunkSpec::new(10_000, 1 << 46);
    assert!(read_chunk(&path, beyond)?.is_empty());
    Ok(())
}

#[test]
fn partial_writes_count_only_persisted_documents() -> Result<()> {
    let file = VcfFixture::new(100).temp_file()?;
    let plan = plan_chunks(file.path(), 1)?;
    let sink = FaultySink::new().reject_every(10);

    let outcome = ChunkWorker::new(file.path(), &plan.header, &sink)
        .batch_size(30)
        .process(plan.chunks[0])?;
    assert_eq!(outcome.counts.processed, 100);
    assert_eq!(outcome.counts.inserted, 90);
    assert_eq!(outcome.partial_writes, 4);
    assert_eq!(sink.inner().len(), 90);
    Ok(())
}

#[test]
fn raised_cancel_flag_stops_before_writing() -> Result<()> {
    let file = VcfFixture::new(10).temp_file()?;
    let plan = plan_chunks(file.path(), 1)?;
    let sink = MemorySink::new();
    let cancel = AtomicBool::new(true);

    let err = ChunkWorker::new(file.path(), &plan.header, &sink)
        .cancel_on(&cancel)
        .process(plan.chunks[0])
        .unwrap_err();
    assert!(matches!(err, IngestError::ChunkCancelled { .. }));
    assert!(!err.is_fatal());
    assert!(sink.is_empty());
    Ok(())
}

#[test]
fn unreadable_file_is_a_chunk_error() {
    let sink = MemorySink::new();
    let header = vcf_ingest::HeaderInfo::default();
    let err = process_chunk("/no/such/file.vcf", ChunkSpec::new(0, 10), &header, &sink)
        .unwrap_err();
    assert!(matches!(err, IngestError::ChunkRead { .. }));
}
