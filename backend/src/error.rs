//! Error types for the roster reconciliation pipeline.
//!
//! - [`LoadError`] - reading source spreadsheets
//! - [`SchemaError`] - a required column or anchor is missing
//! - [`FormatError`] - a field that must be an integer is not
//! - [`ConfigError`] - publish configuration is incomplete
//! - [`UploadError`] - a single term upload failed
//! - [`PipelineError`] - top-level run errors
//!
//! Lookup misses (unknown teacher name, course without a term) are not
//! errors: they are counted in the run summary and the run continues.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while reading a source file or directory.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed delimited content.
    #[error("Invalid CSV in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// A required input is absent or holds no data.
    #[error("Required {role} source not found: {path}")]
    MissingRequired { role: String, path: PathBuf },
}

// =============================================================================
// Schema Errors
// =============================================================================

/// A table lacks a column the parse step anchors on.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{table} table has no column named '{column}'")]
    MissingColumn { table: String, column: String },
}

impl SchemaError {
    pub fn missing(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

// =============================================================================
// Format Errors
// =============================================================================

/// A field expected to be integer-coercible is not.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{location}, {field} (value '{value}'): not an integer")]
    NotInteger {
        location: String,
        field: String,
        value: String,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Publish configuration errors, raised before any upload starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

// =============================================================================
// Upload Errors
// =============================================================================

/// Failure of one term's upload. Never aborts the remaining terms.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to read staged file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Import endpoint answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level run errors returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Staging error on {path}: {message}")]
    Staging { path: PathBuf, message: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
