//! Record validation and the end-of-run loss check.
//!
//! Two layers live here:
//! - **Record rules** - the [`Validate`] trait and [`validators`] used by the
//!   codec to reject records that parse but miss a required field.
//! - **Loss verdict** - [`LossPolicy`] compares lines seen with documents
//!   persisted and flags a run whose loss exceeds a fixed tolerance.
//!
//! # Example
//!
//! ```
//! use vcf_ingest::validation::LossPolicy;
//!
//! let policy = LossPolicy::default();
//! let verdict = policy.check(10_000, 9_997);
//! assert!(verdict.ok);
//! assert_eq!(verdict.loss, 3);
//! ```

use crate::record::VariantRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default loss tolerance. A policy constant, not derived from file size.
pub const DEFAULT_MAX_LOST_RECORDS: u64 = 1340;

/// Result type for validation operations.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Trait for types that can be validated.
pub trait Validate {
    /// Validate this instance and return a list of errors if invalid.
    fn validate(&self) -> ValidationResult;
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The field that failed validation (optional)
    pub field: Option<String>,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for a specific field.
    pub fn field<S: Into<String>, M: Into<String>>(field: S, message: M) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref field) = self.field {
            write!(f, "[{}] {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

impl Validate for VariantRecord {
    fn validate(&self) -> ValidationResult {
        combine_validations(vec![
            validators::not_blank("chromosome", &self.chromosome),
            validators::not_blank("reference", &self.reference),
            validators::not_blank("alternate", &self.alternate),
        ])
    }
}

/// Validation helpers for common patterns.
pub mod validators {
    use super::{ValidationError, ValidationResult};

    /// Validate that a string has at least one non-whitespace character.
    pub fn not_blank(field: &str, value: &str) -> ValidationResult {
        if value.trim().is_empty() {
            Err(vec![ValidationError::field(field, "must not be blank")])
        } else {
            Ok(())
        }
    }
}

/// Combine multiple validation results.
pub fn combine_validations(results: Vec<ValidationResult>) -> ValidationResult {
    let mut all_errors = Vec::new();
    for result in results {
        if let Err(mut errors) = result {
            all_errors.append(&mut errors);
        }
    }
    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors)
    }
}

/// Coarse data-loss circuit breaker.
///
/// A run fails when `total_lines - inserted_documents` exceeds
/// `max_lost_records`. This is an absolute count, not a proportion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossPolicy {
    pub max_lost_records: u64,
}

impl Default for LossPolicy {
    fn default() -> Self {
        Self {
            max_lost_records: DEFAULT_MAX_LOST_RECORDS,
        }
    }
}

impl LossPolicy {
    #[must_use]
    pub fn new(max_lost_records: u64) -> Self {
        Self { max_lost_records }
    }

    /// Compare lines seen with documents persisted.
    #[must_use]
    pub fn check(&self, total_lines: u64, inserted_documents: u64) -> LossVerdict {
        let loss = total_lines.saturating_sub(inserted_documents);
        if loss > self.max_lost_records {
            LossVerdict {
                ok: false,
                loss,
                message: format!("Lost too many records: {loss} records lost"),
            }
        } else {
            LossVerdict {
                ok: true,
                loss,
                message: format!("Processing successful. Lost records: {loss}"),
            }
        }
    }
}

/// Outcome of a [`LossPolicy`] check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossVerdict {
    pub ok: bool,
    pub loss: u64,
    pub message: String,
}

impl fmt::Display for LossVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
