//! Manual overrides and bulk teacher assignment.
//!
//! Overrides are appended after the pipeline records and the set is then
//! deduplicated on `(user_id, course_id)` keeping the last occurrence, so an
//! override always beats a generated record and a later override beats an
//! earlier one.

use std::collections::{HashMap, HashSet};

use super::courses::Catalog;
use super::ids::{canonical_id, format_record_ids, format_user_id, IdKind};
use crate::error::SchemaError;
use crate::models::{EnrollmentRecord, EnrollmentRow, EnrollmentStatus, Role};
use crate::parser::Table;

type Key = (Option<String>, Option<String>);

fn owned_key(record: &EnrollmentRecord) -> Key {
    (record.user_id.clone(), record.course_id.clone())
}

/// Result of [`apply_overrides`].
#[derive(Debug, Clone, Default)]
pub struct OverrideOutcome {
    pub records: Vec<EnrollmentRecord>,
    /// Override rows applied.
    pub applied: usize,
    /// Override keys that replaced a pipeline record.
    pub replacements: usize,
    /// Rows removed by deduplication, for any reason.
    pub duplicates_dropped: usize,
}

/// Prepare override rows for merging.
///
/// Ids are canonicalized (already-formatted ids are left alone) and status is
/// kept. A row without `term_id` takes the term of the pipeline record it
/// replaces, else the catalog term of its course.
pub fn prepare_overrides(
    rows: Vec<EnrollmentRow>,
    pipeline: &[EnrollmentRecord],
    catalog: &Catalog,
) -> Vec<EnrollmentRecord> {
    let existing_terms: HashMap<Key, Option<String>> = pipeline
        .iter()
        .map(|r| (owned_key(r), r.term_id.clone()))
        .collect();
    let catalog_terms = catalog.terms_by_import_id();

    rows.into_iter()
        .map(|row| {
            let mut record = row.into_record();
            format_record_ids(&mut record);
            if record.term_id.is_none() {
                record.term_id = existing_terms
                    .get(&owned_key(&record))
                    .cloned()
                    .flatten()
                    .or_else(|| {
                        record
                            .course_id
                            .as_deref()
                            .and_then(|id| catalog_terms.get(id))
                            .cloned()
                    });
            }
            record
        })
        .collect()
}

/// Append overrides and keep the last record per `(user_id, course_id)`.
///
/// `None` means no override source: the set is returned untouched, without
/// deduplication.
pub fn apply_overrides(
    enrollments: Vec<EnrollmentRecord>,
    overrides: Option<Vec<EnrollmentRecord>>,
) -> OverrideOutcome {
    let Some(overrides) = overrides else {
        return OverrideOutcome {
            records: enrollments,
            ..OverrideOutcome::default()
        };
    };

    let pipeline_keys: HashSet<Key> = enrollments.iter().map(owned_key).collect();
    let replacements = overrides
        .iter()
        .map(owned_key)
        .collect::<HashSet<Key>>()
        .iter()
        .filter(|k| pipeline_keys.contains(*k))
        .count();
    let applied = overrides.len();

    let combined: Vec<EnrollmentRecord> = enrollments.into_iter().chain(overrides).collect();
    let total = combined.len();

    let mut last_index: HashMap<Key, usize> = HashMap::new();
    for (i, record) in combined.iter().enumerate() {
        last_index.insert(owned_key(record), i);
    }

    let records: Vec<EnrollmentRecord> = combined
        .into_iter()
        .enumerate()
        .filter(|(i, record)| last_index.get(&owned_key(record)) == Some(i))
        .map(|(_, record)| record)
        .collect();

    OverrideOutcome {
        duplicates_dropped: total - records.len(),
        records,
        applied,
        replacements,
    }
}

/// Read bulk teacher ids from a sheet with a `user_id` column, formatted.
pub fn read_bulk_teacher_ids(table: &Table) -> Result<Vec<String>, SchemaError> {
    let col = table.require_column("bulk teacher", "user_id")?;
    Ok((0..table.len())
        .filter_map(|row| format_user_id(table.cell(row, col)))
        .collect())
}

/// Enroll every id in `teacher_ids` as teacher on every course not flagged
/// `CANVAS_NEEDED = N`.
///
/// Synthesized rows carry the course's import id and term and no name. They
/// are appended without deduplication against existing teachers.
pub fn add_teachers_to_all(
    mut enrollments: Vec<EnrollmentRecord>,
    catalog: &Catalog,
    teacher_ids: &[String],
) -> (Vec<EnrollmentRecord>, usize) {
    let excluded = catalog.excluded_ids();
    let mut added = 0;

    for course in catalog.latest_courses() {
        if excluded.contains(course.internal_course_id.as_str()) {
            continue;
        }
        let course_id = course
            .sis_course_id
            .clone()
            .unwrap_or_else(|| canonical_id(IdKind::Course, &course.internal_course_id));

        for user_id in teacher_ids {
            enrollments.push(EnrollmentRecord {
                course_name: course.long_name.clone(),
                course_id: Some(course_id.clone()),
                subject: course.subject.clone(),
                term_id: course.term_id.clone(),
                user_id: Some(user_id.clone()),
                status: Some(EnrollmentStatus::Active),
                ..EnrollmentRecord::new(Role::Teacher)
            });
            added += 1;
        }
    }

    (enrollments, added)
}
