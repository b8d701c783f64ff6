//! Synthetic variant files.
//!
//! [`VcfFixture`] renders a deterministic file: `##` meta lines, the `#CHROM`
//! header, then numbered data lines. Individual data lines can be replaced by
//! malformed ones, and comment or blank lines can be sprinkled between data
//! lines to exercise the planner and worker.

use crate::record::HEADER_PREFIX;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const FIXED_COLUMNS: &str = "POS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT";

/// Render data line number `i` for the given sample count.
///
/// Chromosomes cycle through `chr1`..`chr22`, positions are `i + 1`.
#[must_use]
pub fn data_line(i: usize, sample_count: usize) -> String {
    let id = if i % 5 == 0 {
        ".".to_string()
    } else {
        format!("rs{i}")
    };
    let filter = if i % 7 == 0 { "." } else { "PASS" };
    let mut line = format!(
        "chr{}\t{}\t{id}\tA\tG\t{}.5\t{filter}\tDP={};AF=0.{};DB\tGT:DP",
        i % 22 + 1,
        i + 1,
        i % 100,
        i % 50,
        i % 10,
    );
    for s in 0..sample_count {
        let _ = write!(line, "\t{}|{}:{}", s % 2, (i + s) % 2, i % 30);
    }
    line
}

/// Render a malformed stand-in for data line `i`.
///
/// Alternates between a bad position and a line with too few columns.
#[must_use]
pub fn malformed_line(i: usize) -> String {
    if i % 2 == 0 {
        format!("chr1\tpos{i}\t.\tA\tG\t10\tPASS\t.")
    } else {
        format!("truncated\t{i}")
    }
}

/// Builder for a synthetic variant file.
///
/// ```
/// use vcf_ingest::testing::VcfFixture;
///
/// let text = VcfFixture::new(3).samples(["NA001"]).malformed_at([1]).render();
/// assert_eq!(text.lines().filter(|l| !l.starts_with('#')).count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct VcfFixture {
    data_lines: usize,
    samples: Vec<String>,
    meta_lines: usize,
    malformed: BTreeSet<usize>,
    comment_every: Option<usize>,
    blank_every: Option<usize>,
    header: bool,
}

impl VcfFixture {
    /// A file with `data_lines` well-formed data lines and two samples.
    #[must_use]
    pub fn new(data_lines: usize) -> Self {
        Self {
            data_lines,
            samples: vec!["SAMPLE_A".to_string(), "SAMPLE_B".to_string()],
            meta_lines: 3,
            malformed: BTreeSet::new(),
            comment_every: None,
            blank_every: None,
            header: true,
        }
    }

    #[must_use]
    pub fn samples<I, S>(mut self, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.samples = samples.into_iter().map(Into::into).collect();
        self
    }

    /// Number of `##` lines before the header.
    #[must_use]
    pub fn meta_lines(mut self, n: usize) -> Self {
        self.meta_lines = n;
        self
    }

    /// Replace the data lines at these indices with malformed lines.
    /// Indices past the end are ignored.
    #[must_use]
    pub fn malformed_at(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.malformed
            .extend(indices.into_iter().filter(|i| *i < self.data_lines));
        self
    }

    /// Insert a `#` comment after every `n` data lines.
    #[must_use]
    pub fn comment_every(mut self, n: usize) -> Self {
        self.comment_every = Some(n.max(1));
        self
    }

    /// Insert a blank line after every `n` data lines.
    #[must_use]
    pub fn blank_every(mut self, n: usize) -> Self {
        self.blank_every = Some(n.max(1));
        self
    }

    /// Leave out the `#CHROM` header line.
    #[must_use]
    pub fn without_header(mut self) -> Self {
        self.header = false;
        self
    }

    /// Data lines in the file, malformed ones included.
    #[must_use]
    pub fn total_lines(&self) -> u64 {
        self.data_lines as u64
    }

    /// Data lines expected to parse.
    #[must_use]
    pub fn valid_lines(&self) -> u64 {
        (self.data_lines - self.malformed.len()) as u64
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for m in 0..self.meta_lines {
            if m == 0 {
                out.push_str("##fileformat=VCFv4.2\n");
            } else {
                let _ = writeln!(out, "##source=fixture{m}");
            }
        }
        if self.header {
            out.push_str(HEADER_PREFIX);
            out.push('\t');
            out.push_str(FIXED_COLUMNS);
            for s in &self.samples {
                out.push('\t');
                out.push_str(s);
            }
            out.push('\n');
        }
        for i in 0..self.data_lines {
            if self.malformed.contains(&i) {
                out.push_str(&malformed_line(i));
            } else {
                out.push_str(&data_line(i, self.samples.len()));
            }
            out.push('\n');
            let n = i + 1;
            if n < self.data_lines {
                if self.comment_every.is_some_and(|every| n % every == 0) {
                    let _ = writeln!(out, "# checkpoint {n}");
                }
                if self.blank_every.is_some_and(|every| n % every == 0) {
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Write the rendered file to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.render())
    }

    /// Write the rendered file to a fresh temporary `.vcf` file.
    ///
    /// # Errors
    /// Returns an error if the temporary file cannot be created or written.
    pub fn temp_file(&self) -> io::Result<TempVcf> {
        let file = tempfile::Builder::new().suffix(".vcf").tempfile()?;
        let path = file.path().to_path_buf();
        self.write_to(&path)?;
        Ok(TempVcf { _file: file, path })
    }
}

/// A temporary variant file, deleted on drop.
pub struct TempVcf {
    _file: NamedTempFile,
    path: PathBuf,
}

impl TempVcf {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for TempVcf {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_line;
    use crate::record::HeaderInfo;

    #[test]
    fn generated_lines_parse() {
        let header = HeaderInfo::new(["A", "B"]);
        for i in 0..50 {
            let record = parse_line(&data_line(i, 2), &header).expect("valid line");
            assert_eq!(record.position, i as u64 + 1);
            assert_eq!(record.sample_outputs.len(), 2);
        }
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let header = HeaderInfo::new(["A"]);
        assert!(parse_line(&malformed_line(0), &header).is_err());
        assert!(parse_line(&malformed_line(1), &header).is_err());
    }
}
