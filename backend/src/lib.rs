//! # Rosterload - roster exports to SIS enrollment imports
//!
//! Rosterload rebuilds enrollments from semi-structured roster spreadsheets
//! (student blocks, wide teacher sheets, a course catalog), reconciles them
//! against the catalog and stages one import file per academic term for the
//! LMS SIS import endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV sheets │────▶│   Parser    │────▶│  Transform  │────▶│   Publish   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (reconcile) │     │ (per term)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rosterload::{run, InputLayout};
//! use std::path::Path;
//!
//! let outcome = run(&InputLayout::default(), Path::new("temp_outputs"))?;
//! for term in &outcome.staging.staged {
//!     println!("{} -> {}", term.term_id, term.path.display());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (CourseRecord, EnrollmentRecord, import rows)
//! - [`parser`] - CSV loading with auto-detection
//! - [`transform`] - Reconciliation stages and the pipeline
//! - [`publish`] - Staging and SIS import upload
//! - [`config`] - Publish configuration
//! - [`logs`] - Run log broadcasting

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Publishing
pub mod config;
pub mod publish;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    FormatError,
    LoadError,
    PipelineError,
    PipelineResult,
    SchemaError,
    UploadError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CanvasNeeded,
    CourseImportRow,
    CourseRecord,
    EnrollmentRecord,
    EnrollmentRow,
    EnrollmentStatus,
    Role,
    TeacherIdentityEntry,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    load_optional,
    load_path,
    load_required,
    Layout,
    Table,
};

// =============================================================================
// Re-exports - Transform stages
// =============================================================================

pub use transform::courses::{courses_import, load_catalog, normalize, Catalog};
pub use transform::ids::{format_course_id, format_ids, format_user_id};
pub use transform::overrides::{add_teachers_to_all, apply_overrides, OverrideOutcome};
pub use transform::partition::{partition_by_term, Partitioned, TermPartition};
pub use transform::reconcile::{reconcile, ReconcileStats};
pub use transform::students::parse_student_blocks;
pub use transform::teachers::{reshape_teacher_roster, resolve_teachers, TeacherDirectory};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    load_inputs,
    reconcile_inputs,
    run,
    InputLayout,
    RunInputs,
    RunOutcome,
    RunOutput,
    RunSummary,
};

// =============================================================================
// Re-exports - Publish
// =============================================================================

pub use config::PublishConfig;
pub use publish::{publish, PublishReport, SisImportClient, TermOutcome};
