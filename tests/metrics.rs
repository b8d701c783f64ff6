//! Tests for the metrics module.

use anyhow::Result;
use serde_json::json;
use tempfile::tempdir;
use vcf_ingest::metrics::{CounterMetric, GaugeMetric, HistogramMetric, Metric, MetricsCollector};

#[macro_use]
mod macros;

#[test]
fn counter_metric() {
    let collector = MetricsCollector::new();
    collector.register(Box::new(CounterMetric::with_value("inserted_documents", 5)));
    collector.increment_counter("inserted_documents", 7);
    collector.increment_counter("dropped_lines", 1);

    let snapshot = collector.snapshot();
    assert_eq!(snapshot["inserted_documents"], json!(12));
    assert_eq!(snapshot["dropped_lines"], json!(1));

    collector.set_counter("inserted_documents", 3);
    assert_eq!(collector.snapshot()["inserted_documents"], json!(3));
}

#[test]
fn gauge_metric() {
    let collector = MetricsCollector::new();
    collector.register(Box::new(
        GaugeMetric::new("throughput_lines_per_sec", 42.5).with_description("lines/s"),
    ));
    let snapshot = collector.snapshot();
    assert_eq!(snapshot["throughput_lines_per_sec"], json!(42.5));

    let json = collector.to_json();
    assert_eq!(json["throughput_lines_per_sec"]["description"], json!("lines/s"));
}

#[test]
fn histogram_metric() {
    let collector = MetricsCollector::new();
    for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
        collector.observe("chunk_duration_ms", v);
    }
    let value = &collector.snapshot()["chunk_duration_ms"];
    assert_eq!(value["count"], json!(5));
    assert_eq!(value["mean"], json!(3.0));
    assert_eq!(value["min"], json!(1.0));
    assert_eq!(value["max"], json!(5.0));
}

#[test]
fn histogram_stats() {
    let hist = HistogramMetric::with_values("h", (1..=100).map(f64::from).collect());
    let stats = hist.stats();
    assert_eq!(stats.count, 100);
    assert_approx_eq!(stats.mean, 50.5);
    assert_approx_eq!(stats.p50, 51.0);
    assert_approx_eq!(stats.p95, 96.0);
    assert_approx_eq!(stats.p99, 100.0);

    let empty = HistogramMetric::with_values("e", Vec::new()).stats();
    assert_eq!(empty.count, 0);
    assert_eq!(hist.name(), "h");
}

#[test]
fn clones_share_storage() {
    let a = MetricsCollector::new();
    let b = a.clone();
    b.set_gauge("g", 1.5);
    assert_eq!(a.snapshot()["g"], json!(1.5));
}

#[test]
fn run_window_and_file_output() -> Result<()> {
    let collector = MetricsCollector::new();
    assert!(collector.elapsed().is_none());
    collector.record_start();
    collector.record_end();
    assert!(collector.elapsed().is_some());
    collector.set_counter("total_lines", 10);

    let dir = tempdir()?;
    let path = dir.path().join("metrics.json");
    collector.save_to_file(&path)?;
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(saved["total_lines"]["value"], json!(10));
    assert!(saved.get("execution_time_ms").is_some());
    Ok(())
}
