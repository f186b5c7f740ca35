//! Domain models for the roster reconciliation pipeline.
//!
//! - [`CourseRecord`] - one catalog entry, source of term and merge mappings
//! - [`EnrollmentRecord`] - one person on one course, the unit every stage works on
//! - [`TeacherIdentityEntry`] - surname/name/id triple used to resolve teacher names
//! - [`EnrollmentRow`] / [`CourseImportRow`] - the import file schemas

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Enrollment Role
// =============================================================================

/// Role of a person within a course.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    /// Teaching assistant.
    Ta,
    Designer,
    Observer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Ta => "ta",
            Self::Designer => "designer",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Enrollment Status
// =============================================================================

/// Enrollment state understood by the import endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Completed,
    Inactive,
    Deleted,
    DeletedLastCompleted,
}

// =============================================================================
// Canvas-needed flag
// =============================================================================

/// Whether a catalog course is provisioned in the LMS at all.
///
/// Only `No` excludes a course's enrollments; `Unspecified` passes through
/// the exclusion filter but is not written to the courses import.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CanvasNeeded {
    Yes,
    No,
    #[default]
    Unspecified,
}

impl CanvasNeeded {
    /// Parse the raw `CANVAS_NEEDED` cell. Only the exact flags `Y`/`N` count.
    pub fn from_flag(raw: &str) -> Self {
        match raw.trim() {
            "Y" => Self::Yes,
            "N" => Self::No,
            _ => Self::Unspecified,
        }
    }
}

// =============================================================================
// Course Record
// =============================================================================

/// A course catalog entry after id normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseRecord {
    /// Internal (reporting) course id, canonical string-integer when numeric.
    pub internal_course_id: String,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub subject: Option<String>,
    pub term_id: Option<String>,
    /// Cross-listing target, canonical string-integer when numeric.
    pub merge_code: Option<String>,
    pub canvas_needed: CanvasNeeded,
    pub account_id: Option<String>,
    pub blueprint_course_id: Option<String>,
    /// The catalog's own `course_id` column, when it carries one.
    pub sis_course_id: Option<String>,
}

impl CourseRecord {
    pub fn new(internal_course_id: impl Into<String>) -> Self {
        Self {
            internal_course_id: internal_course_id.into(),
            long_name: None,
            short_name: None,
            subject: None,
            term_id: None,
            merge_code: None,
            canvas_needed: CanvasNeeded::Unspecified,
            account_id: None,
            blueprint_course_id: None,
            sis_course_id: None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        self.canvas_needed == CanvasNeeded::No
    }
}

// =============================================================================
// Enrollment Record
// =============================================================================

/// One person enrolled on one course.
///
/// `course_id` and `user_id` hold raw ids until the formatter runs, then
/// the prefixed `c000000` / `u000000` forms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrollmentRecord {
    pub course_name: Option<String>,
    pub course_id: Option<String>,
    pub subject: Option<String>,
    pub term_id: Option<String>,
    pub name: Option<String>,
    pub user_id: Option<String>,
    pub role: Role,
    /// `None` until the record is finalized by the formatter.
    pub status: Option<EnrollmentStatus>,
}

impl EnrollmentRecord {
    pub fn new(role: Role) -> Self {
        Self {
            course_name: None,
            course_id: None,
            subject: None,
            term_id: None,
            name: None,
            user_id: None,
            role,
            status: None,
        }
    }

    /// Composite identity used by override application.
    pub fn key(&self) -> (Option<&str>, Option<&str>) {
        (self.user_id.as_deref(), self.course_id.as_deref())
    }

    /// Project onto the import file schema (drops subject and term).
    pub fn to_row(&self) -> EnrollmentRow {
        EnrollmentRow {
            course_name: self.course_name.clone(),
            course_id: self.course_id.clone(),
            name: self.name.clone(),
            user_id: self.user_id.clone(),
            role: self.role,
            status: self.status.unwrap_or_default(),
            term_id: None,
        }
    }
}

// =============================================================================
// Teacher Identity
// =============================================================================

/// A row of the teacher identity directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeacherIdentityEntry {
    pub surname: String,
    pub name: String,
    pub user_id: String,
}

impl TeacherIdentityEntry {
    /// "SURNAME, NAME", the join key against teacher roster cells.
    pub fn full_name(&self) -> String {
        format!("{}, {}", self.surname, self.name)
    }
}

// =============================================================================
// Import file schemas
// =============================================================================

/// A row of a per-term enrollments file, also the override file schema.
///
/// `term_id` is read from override files when present but never written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrollmentRow {
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(alias = "type")]
    pub role: Role,
    #[serde(default)]
    pub status: EnrollmentStatus,
    #[serde(default, skip_serializing)]
    pub term_id: Option<String>,
}

impl EnrollmentRow {
    /// Lift an override row into an enrollment record, keeping its status.
    pub fn into_record(self) -> EnrollmentRecord {
        EnrollmentRecord {
            course_name: self.course_name,
            course_id: self.course_id,
            subject: None,
            term_id: self.term_id,
            name: self.name,
            user_id: self.user_id,
            role: self.role,
            status: Some(self.status),
        }
    }
}

/// A row of the courses import file.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourseImportRow {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub status: EnrollmentStatus,
    pub course_id: String,
    pub account_id: Option<String>,
    pub term_id: Option<String>,
    pub blueprint_course_id: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
