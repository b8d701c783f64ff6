//! Parallel coordinator: fault isolation, timeouts and accounting.

use anyhow::Result;
use std::fmt::Write as _;
use std::fs;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;
use vcf_ingest::metrics::MetricsCollector;
use vcf_ingest::testing::{
    FaultySink, VcfFixture, assert_all_lines_accounted, assert_stats_consistent, data_line,
};
use vcf_ingest::{
    ChunkStatus, FileStatus, IngestError, IngestOptions, MemorySink, Runner, process_file,
};

fn options(processors: usize) -> IngestOptions {
    IngestOptions {
        processor_count: Some(processors),
        ..IngestOptions::default()
    }
}

#[test]
fn clean_run_accounts_for_every_line() -> Result<()> {
    let fixture = VcfFixture::new(2_000).malformed_at([5, 500, 1_999]);
    let file = fixture.temp_file()?;
    let sink = Arc::new(MemorySink::new());

    let report = Runner::new(options(3)).run_report(file.path(), sink.clone())?;
    let stats = &report.stats;
    assert_all_lines_accounted(stats);
    assert_eq!(stats.total_lines, 2_000);
    assert_eq!(stats.processed_lines, 1_997);
    assert_eq!(stats.dropped_lines, 3);
    assert_eq!(stats.inserted_documents, 1_997);
    assert_eq!(sink.len(), 1_997);
    assert_eq!(stats.chunk_count, 13);
    assert_eq!(report.chunks.len(), 13);
    assert!(report.chunks.windows(2).all(|w| w[0].index < w[1].index));
    assert_eq!(report.status, FileStatus::Completed);
    assert_eq!(report.unfinished_chunks().count(), 0);
    Ok(())
}

#[test]
fn result_does_not_depend_on_worker_count() -> Result<()> {
    let fixture = VcfFixture::new(777).malformed_at([1, 2, 3]).comment_every(50);
    let file = fixture.temp_file()?;

    let mut seen = Vec::new();
    for processors in [1, 2, 5, 16] {
        let sink = Arc::new(MemorySink::new());
        let stats = process_file(file.path(), processors, sink.clone())?;
        let mut positions: Vec<u64> = sink.documents().iter().map(|r| r.position).collect();
        positions.sort_unstable();
        seen.push((stats.inserted_documents, positions));
    }
    assert!(seen.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(seen[0].0, 774);
    Ok(())
}

#[test]
fn panicking_chunk_is_isolated() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("poisoned.vcf");
    let mut text = String::from("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
    for i in 0..160 {
        let chrom = if i == 75 { "chrBAD" } else { "chr1" };
        writeln!(text, "{chrom}\t{}\t.\tA\tG\t1\tPASS\t.", i + 1)?;
    }
    fs::write(&path, text)?;

    let sink = Arc::new(FaultySink::new().panic_on_chromosome("chrBAD"));
    let report = Runner::new(options(4)).run_report(&path, sink.clone())?;

    assert_eq!(report.stats.chunk_count, 16);
    assert_eq!(report.stats.failed_chunks, 1);
    assert_eq!(report.stats.inserted_documents, 150);
    assert_eq!(sink.inner().len(), 150);
    assert_stats_consistent(&report.stats);

    let failed: Vec<_> = report.unfinished_chunks().collect();
    assert_eq!(failed.len(), 1);
    match &failed[0].status {
        ChunkStatus::Failed { reason } => assert!(reason.contains("panicked"), "{reason}"),
        other => panic!("unexpected status {other:?}"),
    }
    // 10 lost records is within tolerance.
    assert!(report.validation.ok);
    Ok(())
}

#[test]
fn slow_chunk_times_out_and_counts_zero() -> Result<()> {
    let file = VcfFixture::new(50).temp_file()?;
    let sink = Arc::new(FaultySink::new().delay_per_batch(Duration::from_millis(40)));
    let opts = IngestOptions {
        processor_count: Some(1),
        batch_size: 1,
        chunk_timeout_ms: 150,
        ..IngestOptions::default()
    };

    let report = Runner::new(opts).run_report(file.path(), sink.clone())?;
    assert_eq!(report.stats.chunk_count, 1);
    assert_eq!(report.stats.timed_out_chunks, 1);
    assert_eq!(report.stats.inserted_documents, 0);
    assert_eq!(report.stats.processed_lines, 0);
    assert_eq!(report.chunks[0].status, ChunkStatus::TimedOut);

    // The abandoned worker stops before its next write.
    std::thread::sleep(Duration::from_millis(300));
    assert!(sink.inner().len() < 50, "cancelled chunk kept writing");
    Ok(())
}

#[test]
fn stuck_workers_do_not_stall_queued_chunks() -> Result<()> {
    let file = VcfFixture::new(8).temp_file()?;
    let sink = Arc::new(FaultySink::new().delay_per_batch(Duration::from_secs(3_600)));
    let opts = IngestOptions {
        processor_count: Some(1),
        chunk_timeout_ms: 100,
        ..IngestOptions::default()
    };

    let (tx, rx) = mpsc::channel();
    let path = file.path().to_path_buf();
    let run_sink = Arc::clone(&sink);
    thread::spawn(move || {
        let _ = tx.send(Runner::new(opts).run_report(&path, run_sink));
    });

    let report = rx
        .recv_timeout(Duration::from_secs(5))
        .map_err(|_| anyhow::anyhow!("run hung behind a worker that never returns"))??;
    assert_eq!(report.stats.chunk_count, 4);
    assert_eq!(report.stats.timed_out_chunks, 4);
    assert_eq!(report.stats.inserted_documents, 0);
    assert_eq!(report.chunks.len(), 4);
    assert!(report.chunks.iter().all(|c| c.status == ChunkStatus::TimedOut));
    assert_eq!(sink.batches(), 1, "a queued chunk ran after being settled");
    drop(file);
    Ok(())
}

#[test]
fn partial_bulk_writes_reduce_inserted_count() -> Result<()> {
    let file = VcfFixture::new(10_000).temp_file()?;
    let sink = Arc::new(FaultySink::new().reject_every(7));

    let report = Runner::new(options(4)).run_report(file.path(), sink.clone())?;
    assert_eq!(report.stats.processed_lines, 10_000);
    assert_eq!(report.stats.inserted_documents, 10_000 - 10_000 / 7);
    assert_eq!(report.validation.loss, 1_428);
    assert!(!report.validation.ok);
    assert_eq!(report.status, FileStatus::Failed);
    assert_eq!(
        report.validation.message,
        "Lost too many records: 1428 records lost"
    );
    Ok(())
}

#[test]
fn failed_store_loses_everything_but_completes() -> Result<()> {
    let file = VcfFixture::new(300).temp_file()?;
    let sink = Arc::new(FaultySink::new().fail_all());
    let stats = Runner::new(options(2)).run(file.path(), sink)?;
    assert_eq!(stats.processed_lines, 300);
    assert_eq!(stats.inserted_documents, 0);
    assert_eq!(stats.loss(), 300);
    assert!(stats.validate().ok);
    Ok(())
}

#[test]
fn header_only_file_is_trivially_ok() -> Result<()> {
    let file = VcfFixture::new(0).temp_file()?;
    let stats = process_file(file.path(), 4, Arc::new(MemorySink::new()))?;
    assert_eq!(stats.total_lines, 0);
    assert_eq!(stats.chunk_count, 0);
    let verdict = stats.validate();
    assert!(verdict.ok);
    assert_eq!(verdict.message, "Processing successful. Lost records: 0");
    Ok(())
}

#[test]
fn fatal_errors_reach_the_caller() -> Result<()> {
    let err = process_file("/missing/input.vcf", 2, Arc::new(MemorySink::new())).unwrap_err();
    assert!(matches!(err, IngestError::FileNotFound { .. }));

    let file = VcfFixture::new(10).without_header().temp_file()?;
    let err = process_file(file.path(), 2, Arc::new(MemorySink::new())).unwrap_err();
    assert!(matches!(err, IngestError::HeaderNotFound { .. }));
    Ok(())
}

#[test]
fn invalid_options_are_rejected() -> Result<()> {
    let file = VcfFixture::new(10).temp_file()?;
    let opts = IngestOptions {
        batch_size: 0,
        ..IngestOptions::default()
    };
    let err = Runner::new(opts)
        .run(file.path(), Arc::new(MemorySink::new()))
        .unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
    Ok(())
}

#[test]
fn metrics_are_recorded() -> Result<()> {
    let file = VcfFixture::new(400).malformed_at([0]).temp_file()?;
    let metrics = MetricsCollector::new();
    let runner = Runner::new(options(2)).with_metrics(metrics.clone());
    runner.run(file.path(), Arc::new(MemorySink::new()))?;

    let snap = metrics.snapshot();
    assert_eq!(snap["total_lines"], serde_json::json!(400));
    assert_eq!(snap["processed_lines"], serde_json::json!(399));
    assert_eq!(snap["dropped_lines"], serde_json::json!(1));
    assert_eq!(snap["inserted_documents"], serde_json::json!(399));
    assert_eq!(snap["chunks_planned"], serde_json::json!(8));
    assert_eq!(snap["chunks_failed"], serde_json::json!(0));
    assert_eq!(snap["chunk_duration_ms"]["count"], serde_json::json!(8));
    assert!(snap.contains_key("throughput_lines_per_sec"));
    assert!(metrics.elapsed().is_some());
    Ok(())
}

#[test]
fn generated_line_matches_fixture() {
    assert!(data_line(0, 0).starts_with("chr1\t1\t.\t"));
}
