//! Typed pipeline failures.
//!
//! Everything here is fatal for a run. Per-record problems (bad dates, bad
//! ages, unknown labels, missing coordinates) are recovered where they occur
//! and never surface as errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("required column `{field}` not found (accepted names: {})", aliases.join(", "))]
    MissingColumn { field: String, aliases: Vec<String> },

    #[error("unsupported input format `{0}` (expected .csv, .xlsx, .xls or .ods)")]
    UnsupportedFormat(String),

    #[error("cluster count must be between 1 and {max}, got {requested}")]
    InvalidClusterCount { requested: usize, max: usize },

    #[error("invalid GeoJSON: {0}")]
    InvalidGeoJson(String),
}
