//! End-to-end reconciliation run.
//!
//! ```text
//! student sheets ─▶ parse_student_blocks ─┐
//! teacher sheets ─▶ reshape + resolve ────┼─▶ reconcile ─▶ format_ids ─▶ bulk teachers ─▶ overrides ─▶ partition
//! course catalog ─▶ load_catalog ─────────┘
//! ```
//!
//! Loading and staging touch the filesystem; [`reconcile_inputs`] in between
//! is pure and works on already-loaded tables.
//!
//! # Example
//!
//! ```rust,ignore
//! use rosterload::{run, InputLayout};
//! use std::path::Path;
//!
//! let layout = InputLayout::from_root(Path::new("temp_inputs"));
//! let outcome = run(&layout, Path::new("temp_outputs"))?;
//! println!("{} partitions staged", outcome.staging.staged.len());
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::courses::{courses_import, load_catalog, Catalog};
use super::ids::format_ids;
use super::overrides::{add_teachers_to_all, apply_overrides, prepare_overrides, read_bulk_teacher_ids};
use super::partition::{partition_by_term, Partitioned};
use super::reconcile::reconcile;
use super::students::parse_student_blocks;
use super::teachers::{reshape_teacher_roster, resolve_teachers, TeacherDirectory};
use crate::error::{LoadResult, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::models::{CourseImportRow, EnrollmentRecord, EnrollmentRow};
use crate::parser::{load_optional, load_required, Layout, Table};
use crate::publish::staging::{stage_courses, stage_partitions, StagingReport};

/// Names printed before the "... and N more" cut-off.
const SAMPLE_LIMIT: usize = 5;

// =============================================================================
// Inputs
// =============================================================================

/// Where each source lives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputLayout {
    pub student_enroll: PathBuf,
    pub teacher_enroll: PathBuf,
    pub teacher_ids: PathBuf,
    pub courses: PathBuf,
    pub overrides: PathBuf,
    pub bulk_teachers: PathBuf,
}

impl InputLayout {
    /// Default file names under one inputs directory.
    pub fn from_root(root: &Path) -> Self {
        Self {
            student_enroll: root.join("student_enroll"),
            teacher_enroll: root.join("teacher_enroll"),
            teacher_ids: root.join("teacher_ids.csv"),
            courses: root.join("courses.csv"),
            overrides: root.join("overrides.csv"),
            bulk_teachers: root.join("bulk_teachers.csv"),
        }
    }
}

impl Default for InputLayout {
    fn default() -> Self {
        Self::from_root(Path::new("temp_inputs"))
    }
}

/// Every source of a run, loaded but not yet interpreted.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub students: Table,
    pub teachers: Table,
    pub teacher_ids: Table,
    pub courses: Table,
    pub overrides: Option<Vec<EnrollmentRow>>,
    pub bulk_teachers: Option<Table>,
}

/// Load every source. Required ones fail the run; optional ones may be `None`.
pub fn load_inputs(layout: &InputLayout) -> LoadResult<RunInputs> {
    log_info("📖 Loading sources...");
    let students = load_required("student roster", &layout.student_enroll, Layout::Positional)?;
    let teachers = load_required("teacher roster", &layout.teacher_enroll, Layout::Headed)?;
    let teacher_ids = load_required("teacher identity", &layout.teacher_ids, Layout::Headed)?;
    let courses = load_required("course catalog", &layout.courses, Layout::Headed)?;

    let overrides = match load_optional("override", &layout.overrides, Layout::Headed) {
        Some(table) => Some(table.deserialize_rows::<EnrollmentRow>(&layout.overrides)?),
        None => None,
    };
    let bulk_teachers = load_optional("bulk teacher", &layout.bulk_teachers, Layout::Headed);

    log_success(format!(
        "Loaded {} student rows, {} teacher rows, {} catalog rows",
        students.len(),
        teachers.len(),
        courses.len()
    ));

    Ok(RunInputs {
        students,
        teachers,
        teacher_ids,
        courses,
        overrides,
        bulk_teachers,
    })
}

// =============================================================================
// Summary
// =============================================================================

/// Row count of one staged term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionCount {
    pub term_id: String,
    pub rows: usize,
}

/// Audit counts for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub student_rows: usize,
    pub teacher_rows: usize,
    pub unresolved_teacher_rows: usize,
    pub unresolved_teacher_names: Vec<String>,
    pub null_term_enrollments: usize,
    pub merged_enrollments: usize,
    pub excluded_courses: Vec<String>,
    pub excluded_enrollments: usize,
    pub override_rows: usize,
    pub override_replacements: usize,
    pub duplicate_rows_dropped: usize,
    pub bulk_teacher_rows: usize,
    pub duplicate_course_ids: Vec<String>,
    pub courses_import_rows: usize,
    pub partitions: Vec<PartitionCount>,
    /// Terms whose file could not be written.
    pub unstaged_terms: Vec<String>,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            student_rows: 0,
            teacher_rows: 0,
            unresolved_teacher_rows: 0,
            unresolved_teacher_names: Vec::new(),
            null_term_enrollments: 0,
            merged_enrollments: 0,
            excluded_courses: Vec::new(),
            excluded_enrollments: 0,
            override_rows: 0,
            override_replacements: 0,
            duplicate_rows_dropped: 0,
            bulk_teacher_rows: 0,
            duplicate_course_ids: Vec::new(),
            courses_import_rows: 0,
            partitions: Vec::new(),
            unstaged_terms: Vec::new(),
        }
    }

    /// Print the summary through the run log.
    pub fn log(&self) {
        log_info(format!("📊 Run summary ({})", self.run_id));
        log_info_indent(format!("Student enrollments: {}", self.student_rows), 1);
        log_info_indent(format!("Teacher enrollments: {}", self.teacher_rows), 1);
        if self.unresolved_teacher_rows > 0 {
            log_warning_indent(
                format!(
                    "Unresolved teacher names: {} ({} rows)",
                    self.unresolved_teacher_names.len(),
                    self.unresolved_teacher_rows
                ),
                1,
            );
            for name in self.unresolved_teacher_names.iter().take(SAMPLE_LIMIT) {
                log_warning_indent(format!("• {}", name), 2);
            }
            if self.unresolved_teacher_names.len() > SAMPLE_LIMIT {
                log_warning_indent(
                    format!("... and {} more", self.unresolved_teacher_names.len() - SAMPLE_LIMIT),
                    2,
                );
            }
        }
        if self.null_term_enrollments > 0 {
            log_warning_indent(
                format!("Enrollments without a term (not staged): {}", self.null_term_enrollments),
                1,
            );
        }
        log_info_indent(format!("Merged into cross-listed courses: {}", self.merged_enrollments), 1);
        if self.excluded_enrollments > 0 {
            log_warning_indent(
                format!(
                    "Excluded enrollments: {} across {} course(s) flagged N",
                    self.excluded_enrollments,
                    self.excluded_courses.len()
                ),
                1,
            );
        }
        if !self.duplicate_course_ids.is_empty() {
            log_warning_indent(
                format!(
                    "Duplicate catalog ids (last row wins): {}",
                    self.duplicate_course_ids.join(", ")
                ),
                1,
            );
        }
        log_info_indent(
            format!(
                "Overrides: {} rows, {} replacements, {} duplicates dropped",
                self.override_rows, self.override_replacements, self.duplicate_rows_dropped
            ),
            1,
        );
        log_info_indent(format!("Bulk teacher rows: {}", self.bulk_teacher_rows), 1);
        for p in &self.partitions {
            log_info_indent(format!("Term {}: {} enrollments", p.term_id, p.rows), 1);
        }
        if !self.unstaged_terms.is_empty() {
            log_warning_indent(format!("Terms not staged: {}", self.unstaged_terms.join(", ")), 1);
        }
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Everything a run produces before staging.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Final enrollment set, including records without a term.
    pub enrollments: Vec<EnrollmentRecord>,
    pub partitions: Partitioned,
    pub courses: Vec<CourseImportRow>,
    pub catalog: Catalog,
    pub summary: RunSummary,
}

/// Turn loaded sources into the final, partitioned enrollment set.
///
/// Fails on a missing anchor column or a non-integer block id; lookup misses
/// are only counted.
pub fn reconcile_inputs(inputs: RunInputs) -> PipelineResult<RunOutput> {
    let mut summary = RunSummary::new();

    log_info("📚 Normalizing course catalog...");
    let catalog = load_catalog(&inputs.courses)?;
    summary.duplicate_course_ids = catalog.duplicate_ids.clone();
    if catalog.rows_without_id > 0 {
        log_warning(format!("{} catalog rows without MS_COURSE_ID skipped", catalog.rows_without_id));
    }
    log_success(format!(
        "{} courses, {} with a merge target",
        catalog.term_map.len(),
        catalog.merge_map.len()
    ));

    log_info("🎓 Parsing student blocks...");
    let students = parse_student_blocks(&inputs.students)?;
    summary.student_rows = students.len();
    log_success(format!("{} student enrollments", students.len()));

    log_info("🧑‍🏫 Reshaping teacher rosters...");
    let slots = reshape_teacher_roster(&inputs.teachers)?;
    let directory = TeacherDirectory::from_table(&inputs.teacher_ids)?;
    let teachers = resolve_teachers(slots, &directory);
    summary.teacher_rows = teachers.records.len();
    summary.unresolved_teacher_rows = teachers.unresolved_rows;
    summary.unresolved_teacher_names = teachers.unresolved_names;
    log_success(format!(
        "{} teacher enrollments ({} names in directory)",
        summary.teacher_rows,
        directory.len()
    ));

    log_info("🔗 Reconciling enrollments...");
    let combined: Vec<EnrollmentRecord> = students.into_iter().chain(teachers.records).collect();
    let (reconciled, stats) = reconcile(combined, &catalog);
    summary.merged_enrollments = stats.merged;
    summary.excluded_enrollments = stats.excluded_enrollments;
    summary.excluded_courses = stats.excluded_courses;

    let mut enrollments = format_ids(reconciled);

    if let Some(table) = &inputs.bulk_teachers {
        let ids = read_bulk_teacher_ids(table)?;
        let (with_bulk, added) = add_teachers_to_all(enrollments, &catalog, &ids);
        enrollments = with_bulk;
        summary.bulk_teacher_rows = added;
        log_success(format!("{} bulk teacher enrollments added for {} ids", added, ids.len()));
    }

    let overrides = inputs
        .overrides
        .map(|rows| prepare_overrides(rows, &enrollments, &catalog));
    let outcome = apply_overrides(enrollments, overrides);
    summary.override_rows = outcome.applied;
    summary.override_replacements = outcome.replacements;
    summary.duplicate_rows_dropped = outcome.duplicates_dropped;
    let enrollments = outcome.records;

    let partitions = partition_by_term(&enrollments);
    summary.null_term_enrollments = partitions.unassigned;
    summary.partitions = partitions
        .partitions
        .iter()
        .map(|p| PartitionCount {
            term_id: p.term_id.clone(),
            rows: p.rows.len(),
        })
        .collect();

    let courses = courses_import(&catalog);
    summary.courses_import_rows = courses.len();

    Ok(RunOutput {
        enrollments,
        partitions,
        courses,
        catalog,
        summary,
    })
}

// =============================================================================
// Full run
// =============================================================================

/// Result of [`run`]: the reconciled output and where it was written.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output: RunOutput,
    pub staging: StagingReport,
    pub courses_file: PathBuf,
}

/// Load, reconcile and stage every partition plus the courses file.
///
/// A term that cannot be written does not stop the others; it is listed in
/// [`RunOutcome::staging`]. Nothing is uploaded here.
pub fn run(layout: &InputLayout, output_dir: &Path) -> PipelineResult<RunOutcome> {
    let inputs = load_inputs(layout)?;
    let mut output = reconcile_inputs(inputs)?;

    log_info(format!("💾 Staging into {}...", output_dir.display()));
    let staging = stage_partitions(&output.partitions, output_dir);
    let courses_file = stage_courses(&output.courses, output_dir)?;
    output.summary.unstaged_terms = staging.failed_terms().map(str::to_string).collect();
    if staging.failed.is_empty() {
        log_success(format!(
            "Staged {} term file(s) and {}",
            staging.staged.len(),
            courses_file.display()
        ));
    } else {
        log_warning(format!(
            "Staged {} of {} term file(s) and {}",
            staging.staged.len(),
            staging.staged.len() + staging.failed.len(),
            courses_file.display()
        ));
    }

    output.summary.log();
    Ok(RunOutcome {
        output,
        staging,
        courses_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::{EnrollmentStatus, Role};
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn seed(root: &Path) {
        write(
            &root.join("student_enroll/a.csv"),
            "Roster,,,,,\n\
             Algebra I,101,Math,,,\n\
             ,,,Jane Doe,,55\n\
             ,,,John Roe,,56\n\
             Biology,102,Sci,,,\n\
             ,,,Ann Poe,,57\n",
        );
        write(
            &root.join("student_enroll/b.csv"),
            "Chemistry,103,Sci,,,\n\
             ,,,Jane Doe,,55\n\
             Mystery,999,Misc,,,\n\
             ,,,Lost Kid,,58\n",
        );
        write(
            &root.join("teacher_enroll/t.csv"),
            "course_name,course_id,subject,teacher,teacher2\n\
             Algebra I,101,Math,\"SMITH, Jane\",\"DOE, Alan\"\n\
             Chemistry,103,Sci,\"ROE, Ann\",\n",
        );
        write(
            &root.join("teacher_ids.csv"),
            "SURNAME,NAME,USER ID\nSMITH,Jane,900\nROE,Ann,901\n",
        );
        write(
            &root.join("courses.csv"),
            "MS_COURSE_ID,MERGE_CODE,term_id,CANVAS_NEEDED,long_name,short_name,account_id,blueprint_course_id\n\
             101,,T1,Y,Algebra I,ALG,A1,\n\
             102,,T1,N,Biology,BIO,A1,\n\
             103,301,T2,Y,Chemistry,CHEM,A1,BP1\n\
             301,,T2,Y,Chemistry (merged),CHEMX,A1,\n",
        );
    }

    fn find<'a>(records: &'a [EnrollmentRecord], user: &str, course: &str) -> Vec<&'a EnrollmentRecord> {
        records
            .iter()
            .filter(|r| r.user_id.as_deref() == Some(user) && r.course_id.as_deref() == Some(course))
            .collect()
    }

    #[test]
    fn test_reconcile_inputs_end_to_end() {
        let dir = tempdir().unwrap();
        seed(dir.path());

        let inputs = load_inputs(&InputLayout::from_root(dir.path())).unwrap();
        assert!(inputs.overrides.is_none());
        let output = reconcile_inputs(inputs).unwrap();
        let summary = &output.summary;

        assert_eq!(summary.student_rows, 5);
        assert_eq!(summary.teacher_rows, 3);
        assert_eq!(summary.unresolved_teacher_names, vec!["DOE, Alan"]);
        assert_eq!(summary.excluded_courses, vec!["102"]);
        assert_eq!(summary.excluded_enrollments, 1);
        // Lost Kid sits on 999, which the catalog does not know
        assert_eq!(summary.null_term_enrollments, 1);
        assert_eq!(find(&output.enrollments, "u000058", "c000999").len(), 1);

        // Chemistry is merged into 301 but keeps its own term
        let chem = find(&output.enrollments, "u000055", "c000301");
        assert_eq!(chem.len(), 1);
        assert_eq!(chem[0].term_id.as_deref(), Some("T2"));
        assert_eq!(chem[0].status, Some(EnrollmentStatus::Active));

        assert!(output.enrollments.iter().all(|r| r.course_id.as_deref() != Some("c000102")));

        let terms: Vec<&str> = output.partitions.term_ids().collect();
        assert_eq!(terms, vec!["T1", "T2"]);
        assert_eq!(output.partitions.get("T1").unwrap().rows.len(), 4);
        assert_eq!(output.partitions.get("T2").unwrap().rows.len(), 2);

        assert_eq!(output.courses.len(), 3);
        assert_eq!(output.courses[1].course_id, "c000103");
    }

    #[test]
    fn test_overrides_and_bulk_teachers() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        write(
            &dir.path().join("overrides.csv"),
            "course_name,course_id,name,user_id,type,status\n\
             Algebra I,c000101,Jane Doe,u000055,student,completed\n\
             ,301,,77,ta,active\n",
        );
        write(&dir.path().join("bulk_teachers.csv"), "user_id\n500\n501\n");

        let inputs = load_inputs(&InputLayout::from_root(dir.path())).unwrap();
        let output = reconcile_inputs(inputs).unwrap();
        let summary = &output.summary;

        // 101, 103 and 301 are eligible
        assert_eq!(summary.bulk_teacher_rows, 6);
        assert_eq!(summary.override_rows, 2);
        assert_eq!(summary.override_replacements, 1);

        let jane = find(&output.enrollments, "u000055", "c000101");
        assert_eq!(jane.len(), 1);
        assert_eq!(jane[0].status, Some(EnrollmentStatus::Completed));
        assert_eq!(jane[0].term_id.as_deref(), Some("T1"));

        let ta = find(&output.enrollments, "u000077", "c000301");
        assert_eq!(ta.len(), 1);
        assert_eq!(ta[0].role, Role::Ta);
        assert_eq!(ta[0].term_id.as_deref(), Some("T2"));

        let bulk = find(&output.enrollments, "u000500", "c000103");
        assert_eq!(bulk.len(), 1);
        assert_eq!(bulk[0].role, Role::Teacher);
    }

    #[test]
    fn test_run_stages_partitions() {
        let dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        seed(dir.path());

        let outcome = run(&InputLayout::from_root(dir.path()), out.path()).unwrap();
        assert_eq!(outcome.staging.staged.len(), 2);
        assert!(outcome.staging.failed.is_empty());
        assert!(out.path().join("enrollments_T1/enrollments.csv").is_file());
        assert!(out.path().join("enrollments_T2/enrollments.csv").is_file());
        assert!(outcome.courses_file.is_file());

        let t1 = fs::read_to_string(out.path().join("enrollments_T1/enrollments.csv")).unwrap();
        assert!(t1.starts_with("course_name,course_id,name,user_id,role,status"));
        assert!(!t1.contains("c000102"));
    }

    #[test]
    fn test_run_continues_past_unwritable_term() {
        let dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        seed(dir.path());
        fs::write(out.path().join("enrollments_T1"), "blocked").unwrap();

        let outcome = run(&InputLayout::from_root(dir.path()), out.path()).unwrap();
        let staged: Vec<&str> = outcome.staging.staged.iter().map(|s| s.term_id.as_str()).collect();
        assert_eq!(staged, vec!["T2"]);
        assert_eq!(outcome.output.summary.unstaged_terms, vec!["T1"]);
        assert!(out.path().join("enrollments_T2/enrollments.csv").is_file());
        assert!(outcome.courses_file.is_file());
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        fs::remove_file(dir.path().join("courses.csv")).unwrap();

        let err = run(&InputLayout::from_root(dir.path()), dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Load(_)));
    }

    #[test]
    fn test_missing_teacher_anchor_is_fatal() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        write(
            &dir.path().join("teacher_enroll/t.csv"),
            "course_name,course_id,subject,instructor\nAlgebra I,101,Math,\"SMITH, Jane\"\n",
        );

        let inputs = load_inputs(&InputLayout::from_root(dir.path())).unwrap();
        let err = reconcile_inputs(inputs).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }
}
