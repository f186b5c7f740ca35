//! Writing import files to the output directory.
//!
//! ```text
//! <output>/
//! ├── courses.csv
//! ├── enrollments_T1/enrollments.csv
//! └── enrollments_T2/enrollments.csv
//! ```

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::logs::log_error;
use crate::models::CourseImportRow;
use crate::transform::partition::Partitioned;

pub const ENROLLMENTS_FILE: &str = "enrollments.csv";
pub const COURSES_FILE: &str = "courses.csv";

/// A staged partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedTerm {
    pub term_id: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// A partition whose file could not be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagingFailure {
    pub term_id: String,
    pub path: PathBuf,
    pub error: String,
}

/// Per-term results of [`stage_partitions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StagingReport {
    pub staged: Vec<StagedTerm>,
    pub failed: Vec<StagingFailure>,
}

impl StagingReport {
    pub fn failed_terms(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|f| f.term_id.as_str())
    }
}

/// Directory name for a term. Path separators become `_`.
pub fn term_dir_name(term_id: &str) -> String {
    let safe: String = term_id
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("enrollments_{}", safe)
}

fn staging_error(path: &Path, message: impl ToString) -> PipelineError {
    PipelineError::Staging {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| staging_error(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| staging_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| staging_error(path, e))?;
    }
    writer.flush().map_err(|e| staging_error(path, e))?;
    Ok(())
}

/// Write one `enrollments.csv` per partition, existing files overwritten.
///
/// A term that cannot be written is logged and listed in the report; the
/// remaining terms are still staged.
pub fn stage_partitions(partitioned: &Partitioned, output_dir: &Path) -> StagingReport {
    let mut report = StagingReport::default();
    for partition in &partitioned.partitions {
        let path = output_dir
            .join(term_dir_name(&partition.term_id))
            .join(ENROLLMENTS_FILE);
        match write_rows(&path, &partition.rows) {
            Ok(()) => report.staged.push(StagedTerm {
                term_id: partition.term_id.clone(),
                path,
                rows: partition.rows.len(),
            }),
            Err(e) => {
                log_error(format!("Term {} not staged: {}", partition.term_id, e));
                report.failed.push(StagingFailure {
                    term_id: partition.term_id.clone(),
                    path,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Write `courses.csv` into the output directory.
pub fn stage_courses(courses: &[CourseImportRow], output_dir: &Path) -> PipelineResult<PathBuf> {
    let path = output_dir.join(COURSES_FILE);
    write_rows(&path, courses)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnrollmentRecord, EnrollmentStatus, Role};
    use crate::transform::partition::partition_by_term;
    use tempfile::tempdir;

    fn record(term: &str, user: &str) -> EnrollmentRecord {
        EnrollmentRecord {
            course_name: Some("Algebra I".into()),
            course_id: Some("c000101".into()),
            subject: Some("Math".into()),
            term_id: Some(term.to_string()),
            name: Some("Doe, Jane".into()),
            user_id: Some(user.to_string()),
            role: Role::Student,
            status: Some(EnrollmentStatus::Active),
        }
    }

    #[test]
    fn test_term_dir_name() {
        assert_eq!(term_dir_name("BPS_DP24"), "enrollments_BPS_DP24");
        assert_eq!(term_dir_name("2024/25"), "enrollments_2024_25");
    }

    #[test]
    fn test_stage_partitions_schema() {
        let dir = tempdir().unwrap();
        let partitioned = partition_by_term(&[record("T1", "u000001"), record("2024/25", "u000002")]);

        let report = stage_partitions(&partitioned, dir.path());
        assert!(report.failed.is_empty());
        let staged = report.staged;
        assert_eq!(staged.len(), 2);
        assert_eq!(staged[1].path, dir.path().join("enrollments_2024_25").join(ENROLLMENTS_FILE));

        let content = fs::read_to_string(&staged[0].path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "course_name,course_id,name,user_id,role,status");
        assert_eq!(lines[1], "Algebra I,c000101,\"Doe, Jane\",u000001,student,active");
        assert!(!content.contains("Math"));
    }

    #[test]
    fn test_blocked_term_does_not_stop_other_terms() {
        let dir = tempdir().unwrap();
        // A plain file where T1's directory should go
        fs::write(dir.path().join("enrollments_T1"), "not a directory").unwrap();
        let partitioned = partition_by_term(&[record("T1", "u000001"), record("T2", "u000002")]);

        let report = stage_partitions(&partitioned, dir.path());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].term_id, "T1");
        assert_eq!(report.failed_terms().collect::<Vec<_>>(), vec!["T1"]);

        assert_eq!(report.staged.len(), 1);
        assert_eq!(report.staged[0].term_id, "T2");
        let t2 = fs::read_to_string(dir.path().join("enrollments_T2").join(ENROLLMENTS_FILE)).unwrap();
        assert!(t2.contains("u000002"));
    }

    #[test]
    fn test_stage_courses() {
        let dir = tempdir().unwrap();
        let rows = vec![CourseImportRow {
            long_name: Some("Algebra I".into()),
            short_name: None,
            status: EnrollmentStatus::Active,
            course_id: "c000101".into(),
            account_id: Some("A1".into()),
            term_id: Some("T1".into()),
            blueprint_course_id: None,
        }];

        let path = stage_courses(&rows, dir.path()).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "long_name,short_name,status,course_id,account_id,term_id,blueprint_course_id\n\
             Algebra I,,active,c000101,A1,T1,\n"
        );
    }
}
