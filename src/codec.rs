//! Line codec: one tab-delimited data line into one [`VariantRecord`].
//!
//! Parsing is pure. The same line and header always produce the same record
//! or the same [`DropReason`]. A drop is never fatal; callers count it and
//! move on to the next line.

use crate::record::{
    FIRST_SAMPLE_COLUMN, FieldMap, HeaderInfo, InfoValue, Number, VariantRecord,
};
use crate::validation::Validate;
use thiserror::Error;

/// Minimum number of tab-separated fields in a data line.
pub const MIN_FIELDS: usize = 8;

/// Maximum number of characters of a line kept in a drop reason.
pub const PREVIEW_LEN: usize = 120;

/// First byte of every comment (and header) line.
pub const COMMENT_MARKER: u8 = b'#';

/// Classification shared by the planner and the worker so both agree on
/// which lines count as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    Blank,
    Data,
}

impl LineKind {
    #[must_use]
    pub fn of(line: &[u8]) -> Self {
        if line.first() == Some(&COMMENT_MARKER) {
            Self::Comment
        } else if line.iter().all(u8::is_ascii_whitespace) {
            Self::Blank
        } else {
            Self::Data
        }
    }
}

/// Why a line did not become a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("insufficient fields: expected at least {MIN_FIELDS}, found {found}: {preview}")]
    InsufficientFields { found: usize, preview: String },

    #[error("invalid position {value:?}: {preview}")]
    InvalidPosition { value: String, preview: String },

    #[error("invalid quality {value:?}: {preview}")]
    InvalidQuality { value: String, preview: String },

    #[error("missing required field {field}: {preview}")]
    MissingField { field: String, preview: String },

    #[error("line is not valid UTF-8: {preview}")]
    InvalidEncoding { preview: String },
}

impl DropReason {
    /// The truncated line this drop refers to.
    #[must_use]
    pub fn preview(&self) -> &str {
        match self {
            Self::InsufficientFields { preview, .. }
            | Self::InvalidPosition { preview, .. }
            | Self::InvalidQuality { preview, .. }
            | Self::MissingField { preview, .. }
            | Self::InvalidEncoding { preview } => preview,
        }
    }
}

/// Truncate `line` to [`PREVIEW_LEN`] characters for logging.
#[must_use]
pub fn preview(line: &str) -> String {
    match line.char_indices().nth(PREVIEW_LEN) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

/// Decode and parse a raw line. Invalid UTF-8 is a drop, not an error.
pub fn parse_bytes(line: &[u8], header: &HeaderInfo) -> Result<VariantRecord, DropReason> {
    let text = std::str::from_utf8(line).map_err(|_| DropReason::InvalidEncoding {
        preview: preview(&String::from_utf8_lossy(line)),
    })?;
    parse_line(text, header)
}

/// Parse one data line.
///
/// Columns 0-7 are CHROM, POS, ID, REF, ALT, QUAL, FILTER and INFO. Column 8
/// is FORMAT and columns 9+ are zipped positionally with the header's sample
/// names; the shorter side wins. Whitespace around the whole line, the
/// terminator included, is stripped before splitting.
pub fn parse_line(line: &str, header: &HeaderInfo) -> Result<VariantRecord, DropReason> {
    let line = line.trim();
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < MIN_FIELDS {
        return Err(DropReason::InsufficientFields {
            found: fields.len(),
            preview: preview(line),
        });
    }

    let position = fields[1]
        .parse::<u64>()
        .map_err(|_| DropReason::InvalidPosition {
            value: fields[1].to_string(),
            preview: preview(line),
        })?;

    let quality = match fields[5] {
        "." => 0.0,
        raw => raw
            .parse::<f64>()
            .ok()
            .filter(|q| q.is_finite())
            .ok_or_else(|| DropReason::InvalidQuality {
                value: raw.to_string(),
                preview: preview(line),
            })?,
    };

    let id = match fields[2] {
        "." | "" => None,
        id => Some(id.to_string()),
    };

    let filter_status = match fields[6] {
        "." => "PASS",
        status => status,
    };

    let sample_outputs: FieldMap<String> = header
        .samples()
        .iter()
        .zip(fields.iter().skip(FIRST_SAMPLE_COLUMN))
        .map(|(name, value)| (name.as_str(), (*value).to_string()))
        .collect();

    let record = VariantRecord {
        chromosome: fields[0].to_string(),
        position,
        id,
        reference: fields[3].to_string(),
        alternate: fields[4].to_string(),
        quality,
        filter_status: filter_status.to_string(),
        info: parse_info(fields[7]),
        format: fields.get(8).copied().unwrap_or_default().to_string(),
        sample_outputs,
    };

    record.validate().map_err(|errors| DropReason::MissingField {
        field: errors
            .into_iter()
            .find_map(|e| e.field)
            .unwrap_or_default(),
        preview: preview(line),
    })?;
    Ok(record)
}

/// Parse a semicolon-delimited INFO column.
///
/// `KEY=VALUE` items are coerced with [`coerce_info_value`]; bare items are
/// flags set to `true`. `.` and the empty string yield an empty map. Empty
/// items (`;;`) are skipped.
#[must_use]
pub fn parse_info(raw: &str) -> FieldMap<InfoValue> {
    let mut info = FieldMap::new();
    if raw.is_empty() || raw == "." {
        return info;
    }
    for item in raw.split(';').filter(|item| !item.is_empty()) {
        match item.split_once('=') {
            Some((key, value)) => info.insert(key, coerce_info_value(value)),
            None => info.insert(item, InfoValue::Flag(true)),
        };
    }
    info
}

/// Opportunistic typing of one INFO value.
///
/// A comma-separated value becomes a list of numbers, each element a float
/// when it contains `.` and an integer otherwise. A lone value containing `.`
/// becomes a float, anything else an integer. Whenever coercion fails (or a
/// float is not finite) the original text is kept.
#[must_use]
pub fn coerce_info_value(value: &str) -> InfoValue {
    let fallback = || InfoValue::Str(value.to_string());
    if value.contains(',') {
        value
            .split(',')
            .map(parse_number)
            .collect::<Option<Vec<_>>>()
            .map_or_else(fallback, InfoValue::List)
    } else if value.contains('.') {
        parse_float(value).map_or_else(fallback, InfoValue::Float)
    } else {
        value
            .parse::<i64>()
            .map_or_else(|_| fallback(), InfoValue::Int)
    }
}

fn parse_float(item: &str) -> Option<f64> {
    item.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_number(item: &str) -> Option<Number> {
    if item.contains('.') {
        parse_float(item).map(Number::Float)
    } else {
        item.parse().ok().map(Number::Int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_lines() {
        assert_eq!(LineKind::of(b"##fileformat=VCFv4.2"), LineKind::Comment);
        assert_eq!(LineKind::of(b"#CHROM\tPOS"), LineKind::Comment);
        assert_eq!(LineKind::of(b"  \r"), LineKind::Blank);
        assert_eq!(LineKind::of(b""), LineKind::Blank);
        assert_eq!(LineKind::of(b"chr1\t1"), LineKind::Data);
    }

    #[test]
    fn preview_is_bounded() {
        let long = "x".repeat(PREVIEW_LEN * 2);
        let p = preview(&long);
        assert_eq!(p.len(), PREVIEW_LEN + 3);
        assert!(p.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn coercion_keeps_text_on_failure() {
        assert_eq!(coerce_info_value("10"), InfoValue::Int(10));
        assert_eq!(coerce_info_value("0.5"), InfoValue::Float(0.5));
        assert_eq!(
            coerce_info_value("1,2.5"),
            InfoValue::List(vec![Number::Int(1), Number::Float(2.5)])
        );
        assert_eq!(coerce_info_value("A,B"), InfoValue::Str("A,B".into()));
        assert_eq!(coerce_info_value("x.y"), InfoValue::Str("x.y".into()));
        assert_eq!(coerce_info_value("intronic"), InfoValue::Str("intronic".into()));
        assert_eq!(coerce_info_value(""), InfoValue::Str(String::new()));
    }
}
