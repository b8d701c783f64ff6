//! Input discovery.

pub mod glob;

pub use glob::{expand_glob, expand_glob_required, resolve_inputs};
