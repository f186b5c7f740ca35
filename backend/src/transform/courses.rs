//! Course catalog normalization.
//!
//! The catalog is the only source of term attribution and cross-listing.
//! [`read_catalog`] lifts raw sheet rows into [`CourseRecord`]s, and
//! [`normalize`] canonicalizes their ids and derives the two lookups every
//! later stage consults:
//!
//! ```text
//! term_map:  internal course id -> term id      (every catalog id)
//! merge_map: internal course id -> merge target (only ids with a MERGE_CODE)
//! ```

use std::collections::{HashMap, HashSet};

use super::ids::{canonical_id, integer_or_raw, IdKind};
use crate::error::SchemaError;
use crate::models::{CanvasNeeded, CourseImportRow, CourseRecord, EnrollmentStatus};
use crate::parser::Table;

const TABLE: &str = "course catalog";

pub const COL_COURSE_ID: &str = "MS_COURSE_ID";
pub const COL_MERGE_CODE: &str = "MERGE_CODE";
pub const COL_TERM: &str = "term_id";
pub const COL_CANVAS_NEEDED: &str = "CANVAS_NEEDED";

/// Normalized catalog plus its derived mappings.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Catalog rows in source order, duplicates included.
    pub courses: Vec<CourseRecord>,
    /// One entry per distinct course id; a course without a term maps to `None`.
    pub term_map: HashMap<String, Option<String>>,
    pub merge_map: HashMap<String, String>,
    /// Ids seen more than once, in first-repeat order. The last row wins.
    pub duplicate_ids: Vec<String>,
    /// Rows dropped for lacking an internal course id.
    pub rows_without_id: usize,
}

impl Catalog {
    /// Term of a (pre-merge) course id.
    pub fn term_of(&self, course_id: &str) -> Option<&str> {
        self.term_map.get(course_id).and_then(|t| t.as_deref())
    }

    /// Merge target of a course id, if it is cross-listed.
    pub fn merge_target(&self, course_id: &str) -> Option<&str> {
        self.merge_map.get(course_id).map(String::as_str)
    }

    /// Ids with at least one catalog row flagged `CANVAS_NEEDED = N`.
    pub fn excluded_ids(&self) -> HashSet<&str> {
        self.courses
            .iter()
            .filter(|c| c.is_excluded())
            .map(|c| c.internal_course_id.as_str())
            .collect()
    }

    /// One record per distinct id (the last row for that id), in first-seen order.
    pub fn latest_courses(&self) -> Vec<&CourseRecord> {
        let mut order: Vec<&str> = Vec::new();
        let mut latest: HashMap<&str, &CourseRecord> = HashMap::new();
        for course in &self.courses {
            let id = course.internal_course_id.as_str();
            if latest.insert(id, course).is_none() {
                order.push(id);
            }
        }
        order.into_iter().filter_map(|id| latest.get(id).copied()).collect()
    }

    /// Term lookup keyed by formatted (`c`-prefixed) course id.
    ///
    /// Covers both catalog ids and merge targets; a merge target takes the
    /// term of the first course merged into it.
    pub fn terms_by_import_id(&self) -> HashMap<String, String> {
        let mut terms = HashMap::new();
        for course in self.latest_courses() {
            let Some(term) = course.term_id.as_ref() else {
                continue;
            };
            terms
                .entry(canonical_id(IdKind::Course, &course.internal_course_id))
                .or_insert_with(|| term.clone());
            if let Some(target) = &course.merge_code {
                terms
                    .entry(canonical_id(IdKind::Course, target))
                    .or_insert_with(|| term.clone());
            }
        }
        terms
    }
}

fn optional_cell(table: &Table, row: usize, col: Option<usize>) -> Option<String> {
    col.and_then(|c| table.cell(row, c)).map(String::from)
}

/// Lift raw catalog rows into course records (ids not yet canonicalized).
///
/// Only `MS_COURSE_ID`, `term_id` and `CANVAS_NEEDED` are mandatory.
/// Returns the records and the number of rows skipped for an empty id.
pub fn read_catalog(table: &Table) -> Result<(Vec<CourseRecord>, usize), SchemaError> {
    let id_col = table.require_column(TABLE, COL_COURSE_ID)?;
    let term_col = table.require_column(TABLE, COL_TERM)?;
    let needed_col = table.require_column(TABLE, COL_CANVAS_NEEDED)?;
    let merge_col = table.column(COL_MERGE_CODE);
    let long_col = table.column("long_name");
    let short_col = table.column("short_name");
    let subject_col = table.column("subject");
    let account_col = table.column("account_id");
    let blueprint_col = table.column("blueprint_course_id");
    let sis_col = table.column("course_id");

    let mut courses = Vec::with_capacity(table.len());
    let mut skipped = 0;

    for row in 0..table.len() {
        let Some(id) = table.cell(row, id_col) else {
            skipped += 1;
            continue;
        };
        courses.push(CourseRecord {
            internal_course_id: id.to_string(),
            long_name: optional_cell(table, row, long_col),
            short_name: optional_cell(table, row, short_col),
            subject: optional_cell(table, row, subject_col),
            term_id: optional_cell(table, row, Some(term_col)),
            merge_code: optional_cell(table, row, merge_col),
            canvas_needed: table
                .cell(row, needed_col)
                .map(CanvasNeeded::from_flag)
                .unwrap_or_default(),
            account_id: optional_cell(table, row, account_col),
            blueprint_course_id: optional_cell(table, row, blueprint_col),
            sis_course_id: optional_cell(table, row, sis_col),
        });
    }

    Ok((courses, skipped))
}

/// Canonicalize course ids and merge codes, then build the lookups.
///
/// Numeric ids lose float artifacts (`"101.0"` -> `"101"`); anything else is
/// kept verbatim and a missing merge code stays missing. Duplicate ids are
/// resolved last-write-wins and reported in [`Catalog::duplicate_ids`]; for
/// `merge_map` only rows carrying a merge code write.
pub fn normalize(mut courses: Vec<CourseRecord>) -> Catalog {
    let mut term_map = HashMap::new();
    let mut merge_map = HashMap::new();
    let mut duplicate_ids = Vec::new();

    for course in &mut courses {
        course.internal_course_id = integer_or_raw(&course.internal_course_id);
        course.merge_code = course.merge_code.as_deref().map(integer_or_raw);

        let id = course.internal_course_id.clone();
        if term_map.insert(id.clone(), course.term_id.clone()).is_some()
            && !duplicate_ids.contains(&id)
        {
            duplicate_ids.push(id.clone());
        }
        if let Some(target) = &course.merge_code {
            merge_map.insert(id, target.clone());
        }
    }

    Catalog {
        courses,
        term_map,
        merge_map,
        duplicate_ids,
        rows_without_id: 0,
    }
}

/// Read and normalize a catalog sheet in one step.
pub fn load_catalog(table: &Table) -> Result<Catalog, SchemaError> {
    let (courses, skipped) = read_catalog(table)?;
    let mut catalog = normalize(courses);
    catalog.rows_without_id = skipped;
    Ok(catalog)
}

/// Courses import rows: catalog entries with `CANVAS_NEEDED = Y`, in catalog order.
///
/// `course_id` is the catalog's own `course_id` column when filled, else the
/// formatted internal id.
pub fn courses_import(catalog: &Catalog) -> Vec<CourseImportRow> {
    catalog
        .courses
        .iter()
        .filter(|c| c.canvas_needed == CanvasNeeded::Yes)
        .map(|c| CourseImportRow {
            long_name: c.long_name.clone(),
            short_name: c.short_name.clone(),
            status: EnrollmentStatus::Active,
            course_id: c
                .sis_course_id
                .clone()
                .unwrap_or_else(|| canonical_id(IdKind::Course, &c.internal_course_id)),
            account_id: c.account_id.clone(),
            term_id: c.term_id.clone(),
            blueprint_course_id: c.blueprint_course_id.clone(),
        })
        .collect()
}
