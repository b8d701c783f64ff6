//! Variant record data model.
//!
//! A [`VariantRecord`] is the persisted document shape: one parsed data line.
//! INFO annotations are kept as typed [`InfoValue`]s in insertion order, and
//! per-sample columns are keyed by the sample names taken from the
//! [`HeaderInfo`] of the file.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Index of the first sample column in a data or header line.
pub const FIRST_SAMPLE_COLUMN: usize = 9;

/// Prefix of the column-header line.
pub const HEADER_PREFIX: &str = "#CHROM";

/// One parsed variant line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub chromosome: String,
    pub position: u64,
    /// `None` when the ID column is `.`.
    pub id: Option<String>,
    pub reference: String,
    pub alternate: String,
    /// `0.0` when the QUAL column is `.`.
    pub quality: f64,
    /// `"PASS"` when the FILTER column is `.`.
    pub filter_status: String,
    pub info: FieldMap<InfoValue>,
    /// FORMAT column, empty when absent.
    pub format: String,
    pub sample_outputs: FieldMap<String>,
}

/// A numeric list element of an INFO value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// A typed INFO annotation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    /// Standalone flag such as `DB` or `SOMATIC`.
    Flag(bool),
    Int(i64),
    Float(f64),
    /// Comma-separated numbers, typed element by element.
    List(Vec<Number>),
    /// Anything that did not coerce to a number.
    Str(String),
}

impl From<i64> for InfoValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for InfoValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for InfoValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<&str> for InfoValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<Vec<Number>> for InfoValue {
    fn from(v: Vec<Number>) -> Self {
        Self::List(v)
    }
}

/// An insertion-ordered string-keyed map.
///
/// Serializes as a JSON object whose keys keep their first-insertion order.
/// Re-inserting a key replaces its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> FieldMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((key, value));
        None
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for FieldMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for FieldMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for FieldMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct FieldMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for FieldMapVisitor<V> {
    type Value = FieldMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map with string keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = FieldMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, V>()? {
            map.insert(k, v);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for FieldMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FieldMapVisitor(PhantomData))
    }
}

/// Sample columns declared by the `#CHROM` header line.
///
/// Built once per file by the planner and shared read-only with every worker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderInfo {
    samples: Vec<String>,
    offsets: HashMap<String, usize>,
}

impl HeaderInfo {
    /// Build from the sample names, in column order.
    pub fn new<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let samples: Vec<String> = samples.into_iter().map(Into::into).collect();
        let mut offsets = HashMap::with_capacity(samples.len());
        for (i, name) in samples.iter().enumerate() {
            offsets
                .entry(name.clone())
                .or_insert(FIRST_SAMPLE_COLUMN + i);
        }
        Self { samples, offsets }
    }

    /// Parse a `#CHROM` line. Returns `None` for any other line.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with(HEADER_PREFIX) {
            return None;
        }
        Some(Self::new(line.split('\t').skip(FIRST_SAMPLE_COLUMN)))
    }

    /// Sample names in declared column order.
    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Absolute column index of a sample; the first occurrence wins for duplicates.
    #[must_use]
    pub fn column_of(&self, sample: &str) -> Option<usize> {
        self.offsets.get(sample).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_maps_samples_to_columns() {
        let h = HeaderInfo::parse(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n",
        )
        .unwrap();
        assert_eq!(h.samples(), &["S1".to_string(), "S2".to_string()]);
        assert_eq!(h.column_of("S2"), Some(10));
        assert_eq!(h.column_of("S3"), None);
    }

    #[test]
    fn header_without_samples_is_empty() {
        let h = HeaderInfo::parse("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        assert_eq!(h.sample_count(), 0);
        assert!(HeaderInfo::parse("##fileformat=VCFv4.2").is_none());
    }

    #[test]
    fn field_map_keeps_first_insertion_order() {
        let mut m = FieldMap::new();
        m.insert("b", 1);
        m.insert("a", 2);
        assert_eq!(m.insert("b", 3), Some(1));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(m.get("b"), Some(&3));
        assert_eq!(serde_json::to_string(&m).unwrap(), r#"{"b":3,"a":2}"#);
    }

    #[test]
    fn info_values_serialize_untagged() {
        let info: FieldMap<InfoValue> = [
            ("DP", InfoValue::Int(10)),
            (
                "AF",
                InfoValue::List(vec![Number::Float(0.5), Number::Float(0.25)]),
            ),
            ("DB", InfoValue::Flag(true)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"DP":10,"AF":[0.5,0.25],"DB":true}"#);
        let back: FieldMap<InfoValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
