//! Student block parsing.
//!
//! Student exports group rows under course headers instead of repeating the
//! course on every line:
//!
//! ```text
//! pos:  0          1     2      3          4   5
//!       Algebra I  101   Math                          <- course header
//!                               Jane Doe        55     <- student
//!                               John Roe        56     <- student
//!       Biology    102   Sci                           <- course header
//! ```
//!
//! A single forward fold carries the current course into each student row.
//! The course context is never reset, not even between combined files, so a
//! file that opens with student rows inherits the previous file's last course.

use super::ids::integer_string;
use crate::error::FormatError;
use crate::logs::log_warning;
use crate::models::{EnrollmentRecord, Role};
use crate::parser::Table;

const POS_COURSE_NAME: usize = 0;
const POS_COURSE_ID: usize = 1;
const POS_SUBJECT: usize = 2;
const POS_STUDENT_NAME: usize = 3;
const POS_STUDENT_ID: usize = 5;

/// The course block a student row belongs to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseContext {
    pub name: Option<String>,
    pub id: Option<String>,
    pub subject: Option<String>,
}

/// What a positional row holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    CourseHeader,
    Student,
    Skip,
}

/// Classify row `row` of a positional table.
///
/// Header rows win over student rows when both predicates hold.
pub fn classify(table: &Table, row: usize) -> RowKind {
    let filled = |pos| table.cell(row, pos).is_some();
    if filled(POS_COURSE_ID) && filled(POS_SUBJECT) {
        RowKind::CourseHeader
    } else if filled(POS_STUDENT_NAME) && filled(POS_STUDENT_ID) {
        RowKind::Student
    } else {
        RowKind::Skip
    }
}

fn required_integer(table: &Table, row: usize, pos: usize, field: &str) -> Result<String, FormatError> {
    let raw = table.cell(row, pos).unwrap_or_default();
    integer_string(raw).ok_or_else(|| FormatError::NotInteger {
        location: table.location(row),
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn header_context(table: &Table, row: usize) -> Result<CourseContext, FormatError> {
    Ok(CourseContext {
        name: table.cell(row, POS_COURSE_NAME).map(String::from),
        id: Some(required_integer(table, row, POS_COURSE_ID, "course id")?),
        subject: table.cell(row, POS_SUBJECT).map(String::from),
    })
}

fn student_record(table: &Table, row: usize, course: &CourseContext) -> Result<EnrollmentRecord, FormatError> {
    Ok(EnrollmentRecord {
        course_name: course.name.clone(),
        course_id: course.id.clone(),
        subject: course.subject.clone(),
        name: table.cell(row, POS_STUDENT_NAME).map(String::from),
        user_id: Some(required_integer(table, row, POS_STUDENT_ID, "student id")?),
        ..EnrollmentRecord::new(Role::Student)
    })
}

/// Rebuild student enrollments from a positional sheet, in row order.
///
/// A header or student row whose id is not an integer aborts the parse: a
/// skipped header would silently misattribute every student below it.
pub fn parse_student_blocks(table: &Table) -> Result<Vec<EnrollmentRecord>, FormatError> {
    if !table.is_empty() && table.rows.iter().all(|r| r.len() <= POS_STUDENT_ID) {
        log_warning(format!(
            "Student sheet has no row reaching {} columns (wrong delimiter?), no student can be read",
            POS_STUDENT_ID + 1
        ));
    }
    let (_, records) = (0..table.len()).try_fold(
        (CourseContext::default(), Vec::new()),
        |(course, mut records), row| -> Result<(CourseContext, Vec<EnrollmentRecord>), FormatError> {
            match classify(table, row) {
                RowKind::CourseHeader => Ok((header_context(table, row)?, records)),
                RowKind::Student => {
                    records.push(student_record(table, row, &course)?);
                    Ok((course, records))
                }
                RowKind::Skip => Ok((course, records)),
            }
        },
    )?;
    Ok(records)
}
