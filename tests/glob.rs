//! Input discovery for batch runs.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;
use vcf_ingest::io::{expand_glob, expand_glob_required, resolve_inputs};

#[test]
fn expands_sorted_files_only() -> Result<()> {
    let dir = tempdir()?;
    for name in ["chr2.vcf", "chr10.vcf", "chr1.vcf", "notes.txt"] {
        fs::write(dir.path().join(name), "")?;
    }
    fs::create_dir(dir.path().join("chr3.vcf"))?;

    let pattern = format!("{}/chr*.vcf", dir.path().display());
    let files = expand_glob(&pattern)?;
    let names: Vec<_> = files
        .iter()
        .filter_map(|p| p.file_name()?.to_str())
        .collect();
    assert_eq!(names, ["chr1.vcf", "chr10.vcf", "chr2.vcf"]);
    Ok(())
}

#[test]
fn required_expansion_needs_a_match() -> Result<()> {
    let dir = tempdir()?;
    let pattern = format!("{}/*.vcf", dir.path().display());
    assert!(expand_glob(&pattern)?.is_empty());
    assert!(expand_glob_required(&pattern).is_err());
    assert!(expand_glob("[").is_err());
    Ok(())
}

#[test]
fn resolves_mixed_inputs() -> Result<()> {
    let dir = tempdir()?;
    let a = dir.path().join("a.vcf");
    let b = dir.path().join("b.vcf");
    fs::write(&a, "")?;
    fs::write(&b, "")?;

    let inputs = vec![
        b.display().to_string(),
        format!("{}/*.vcf", dir.path().display()),
        "missing.vcf".to_string(),
    ];
    let files = resolve_inputs(&inputs)?;
    assert_eq!(files, [b, a, PathBuf::from("missing.vcf")]);
    Ok(())
}
