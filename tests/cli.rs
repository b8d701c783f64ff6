//! The `vcf-ingest` binary.
#![cfg(feature = "cli")]

use anyhow::Result;
use std::process::Command;
use tempfile::tempdir;
use vcf_ingest::JsonlSink;
use vcf_ingest::testing::VcfFixture;

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vcf-ingest"));
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn ingests_glob_into_jsonl_with_report() -> Result<()> {
    let dir = tempdir()?;
    VcfFixture::new(120).write_to(dir.path().join("chr1.vcf"))?;
    VcfFixture::new(80).malformed_at([4]).write_to(dir.path().join("chr2.vcf"))?;
    let out = dir.path().join("docs.jsonl");
    let report = dir.path().join("report.json");
    let metrics = dir.path().join("metrics.json");

    let status = bin()
        .arg(format!("{}/*.vcf", dir.path().display()))
        .args(["--processors", "2", "--batch-size", "25"])
        .arg("--output")
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .arg("--metrics")
        .arg(&metrics)
        .status()?;
    assert!(status.success());

    assert_eq!(JsonlSink::append(&out)?.read_all()?.len(), 199);
    let reports: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report)?)?;
    assert_eq!(reports.as_array().map(Vec::len), Some(2));
    let metrics: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&metrics)?)?;
    assert_eq!(metrics.as_object().map(serde_json::Map::len), Some(2));
    Ok(())
}

#[test]
fn failed_validation_exits_non_zero() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("bad.vcf");
    VcfFixture::new(20).malformed_at(0..10).write_to(&input)?;

    let status = bin().arg(&input).args(["--max-loss", "5"]).status()?;
    assert!(!status.success());
    Ok(())
}

#[test]
fn missing_file_exits_non_zero() -> Result<()> {
    let status = bin().arg("/nope/missing.vcf").status()?;
    assert!(!status.success());
    Ok(())
}
