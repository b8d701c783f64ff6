//! Glob expansion for batch ingestion.
//!
//! The CLI accepts a mix of plain paths and patterns such as
//! `cohort/chr*.vcf`. Patterns expand to the files they match, sorted so a
//! batch always runs in the same order.
//!
//! ```no_run
//! use vcf_ingest::io::glob::expand_glob;
//!
//! let files = expand_glob("cohort/**/*.vcf")?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::PathBuf;

/// Expand `pattern` into the sorted list of matching regular files.
///
/// Zero matches yields an empty vector.
///
/// # Errors
/// Returns an error if the pattern is invalid or a matched entry cannot be
/// read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Like [`expand_glob`], but zero matches is an error.
///
/// # Errors
/// See [`expand_glob`]; also fails when nothing matches.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {pattern}");
    }
    Ok(files)
}

fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Turn command line inputs into the list of files to ingest.
///
/// Plain paths are kept as given, even when they do not exist, so the
/// ingestion of that file reports `FileNotFound` itself. Patterns must match
/// at least one file. A file named twice is ingested once, at its first
/// position.
///
/// # Errors
/// Fails on an invalid pattern or a pattern without matches.
pub fn resolve_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let expanded = if is_pattern(input) {
            expand_glob_required(input)?
        } else {
            vec![PathBuf::from(input)]
        };
        for path in expanded {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}
