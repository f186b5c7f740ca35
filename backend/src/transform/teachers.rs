//! Teacher roster reshaping and identity resolution.
//!
//! Teacher exports are wide: one row per course, then a run of name columns
//! starting at the column literally called `teacher`:
//!
//! ```text
//! course_name | course_id | subject | teacher  | teacher2 | teacher3
//! Algebra I   | 101       | Math    | Smith, J | Doe, A   |
//! ```
//!
//! [`reshape_teacher_roster`] unpivots this into one [`TeacherSlot`] per
//! filled name cell, then [`resolve_teachers`] maps each name to a user id
//! through the identity directory ("SURNAME, NAME", exact match only).

use std::collections::HashMap;

use super::ids::integer_or_raw;
use crate::error::SchemaError;
use crate::models::{EnrollmentRecord, Role, TeacherIdentityEntry};
use crate::parser::Table;

const ROSTER_TABLE: &str = "teacher roster";
const DIRECTORY_TABLE: &str = "teacher identity";

/// Column that opens the run of teacher-name columns.
pub const TEACHER_ANCHOR: &str = "teacher";

/// One (course, teacher name) pair from the wide roster.
#[derive(Debug, Clone, PartialEq)]
pub struct TeacherSlot {
    pub course_name: Option<String>,
    pub course_id: Option<String>,
    pub subject: Option<String>,
    /// Header of the column the name came from (`teacher`, `teacher2`, ...).
    pub role_label: String,
    pub name: String,
}

/// Unpivot the teacher-name columns into one slot per filled cell.
///
/// Columns empty in every row are dropped first. Slots come out column by
/// column: every `teacher` cell, then every `teacher2` cell, and so on.
pub fn reshape_teacher_roster(table: &Table) -> Result<Vec<TeacherSlot>, SchemaError> {
    let name_col = table.require_column(ROSTER_TABLE, "course_name")?;
    let id_col = table.require_column(ROSTER_TABLE, "course_id")?;
    let subject_col = table.require_column(ROSTER_TABLE, "subject")?;

    let kept: Vec<usize> = (0..table.headers.len())
        .filter(|&col| (0..table.len()).any(|row| table.cell(row, col).is_some()))
        .collect();

    let anchor = kept
        .iter()
        .position(|&col| table.headers[col] == TEACHER_ANCHOR)
        .ok_or_else(|| SchemaError::missing(ROSTER_TABLE, TEACHER_ANCHOR))?;

    let mut slots = Vec::new();
    for &col in &kept[anchor..] {
        for row in 0..table.len() {
            let Some(name) = table.cell(row, col) else {
                continue;
            };
            slots.push(TeacherSlot {
                course_name: table.cell(row, name_col).map(String::from),
                course_id: table.cell(row, id_col).map(integer_or_raw),
                subject: table.cell(row, subject_col).map(String::from),
                role_label: table.headers[col].clone(),
                name: name.to_string(),
            });
        }
    }
    Ok(slots)
}

/// Full-name to user-id lookup built from the identity directory.
#[derive(Debug, Clone, Default)]
pub struct TeacherDirectory {
    by_full_name: HashMap<String, String>,
}

impl TeacherDirectory {
    /// Later entries with the same full name replace earlier ones.
    pub fn from_entries(entries: impl IntoIterator<Item = TeacherIdentityEntry>) -> Self {
        let by_full_name = entries
            .into_iter()
            .map(|e| (e.full_name(), integer_or_raw(&e.user_id)))
            .collect();
        Self { by_full_name }
    }

    /// Build from a sheet with `SURNAME`, `NAME` and `USER ID` columns.
    ///
    /// Rows missing any of the three cannot match and are ignored.
    pub fn from_table(table: &Table) -> Result<Self, SchemaError> {
        let surname_col = table.require_column(DIRECTORY_TABLE, "SURNAME")?;
        let name_col = table.require_column(DIRECTORY_TABLE, "NAME")?;
        let id_col = table.require_column(DIRECTORY_TABLE, "USER ID")?;

        let entries = (0..table.len()).filter_map(|row| {
            Some(TeacherIdentityEntry {
                surname: table.cell(row, surname_col)?.to_string(),
                name: table.cell(row, name_col)?.to_string(),
                user_id: table.cell(row, id_col)?.to_string(),
            })
        });
        Ok(Self::from_entries(entries))
    }

    pub fn resolve(&self, full_name: &str) -> Option<&str> {
        self.by_full_name.get(full_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_full_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_full_name.is_empty()
    }
}

/// Teacher enrollments plus the names the directory did not know.
#[derive(Debug, Clone, Default)]
pub struct TeacherResolution {
    pub records: Vec<EnrollmentRecord>,
    /// Rows kept with a null user id.
    pub unresolved_rows: usize,
    /// Distinct unresolved names, in first-seen order.
    pub unresolved_names: Vec<String>,
}

/// Turn slots into teacher enrollments. Unknown names keep a null user id.
pub fn resolve_teachers(slots: Vec<TeacherSlot>, directory: &TeacherDirectory) -> TeacherResolution {
    let mut resolution = TeacherResolution::default();

    for slot in slots {
        let user_id = directory.resolve(&slot.name).map(String::from);
        if user_id.is_none() {
            resolution.unresolved_rows += 1;
            if !resolution.unresolved_names.contains(&slot.name) {
                resolution.unresolved_names.push(slot.name.clone());
            }
        }
        resolution.records.push(EnrollmentRecord {
            course_name: slot.course_name,
            course_id: slot.course_id,
            subject: slot.subject,
            name: Some(slot.name),
            user_id,
            ..EnrollmentRecord::new(Role::Teacher)
        });
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Table {
        Table::headed(
            ["course_name", "course_id", "subject", "teacher", "teacher2", "teacher3", "notes"],
            [
                ["Algebra I", "101", "Math", "SMITH, Jane", "", "", ""],
                ["Biology", "102.0", "Sci", "DOE, Alan", "SMITH, Jane", "", ""],
            ],
        )
    }

    #[test]
    fn test_literal_reshape() {
        let table = Table::headed(
            ["course_name", "course_id", "subject", "teacher", "teacher2"],
            [["Algebra I", "101", "Math", "Smith, J", ""]],
        );

        let slots = reshape_teacher_roster(&table).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].name, "Smith, J");
        assert_eq!(slots[0].course_id.as_deref(), Some("101"));
        assert_eq!(slots[0].role_label, "teacher");
    }

    #[test]
    fn test_reshape_column_major_order() {
        let slots = reshape_teacher_roster(&roster()).unwrap();
        let pairs: Vec<(&str, &str)> = slots
            .iter()
            .map(|s| (s.course_id.as_deref().unwrap(), s.role_label.as_str()))
            .collect();
        assert_eq!(pairs, vec![("101", "teacher"), ("102", "teacher"), ("102", "teacher2")]);
    }

    #[test]
    fn test_empty_columns_dropped_before_anchor_lookup() {
        let table = Table::headed(
            ["course_name", "course_id", "subject", "", "teacher", "extra"],
            [["Algebra I", "101", "Math", "", "Smith, J", ""]],
        );
        let slots = reshape_teacher_roster(&table).unwrap();
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_missing_anchor_is_schema_error() {
        let table = Table::headed(
            ["course_name", "course_id", "subject", "instructor"],
            [["Algebra I", "101", "Math", "Smith, J"]],
        );
        let err = reshape_teacher_roster(&table).unwrap_err();
        assert!(err.to_string().contains("'teacher'"));
    }

    #[test]
    fn test_all_empty_anchor_is_schema_error() {
        let table = Table::headed(
            ["course_name", "course_id", "subject", "teacher"],
            [["Algebra I", "101", "Math", ""]],
        );
        assert!(reshape_teacher_roster(&table).is_err());
    }

    #[test]
    fn test_directory_from_table() {
        let table = Table::headed(
            ["SURNAME", "NAME", "USER ID"],
            [["SMITH", "Jane", "42.0"], ["DOE", "", "43"], ["ROE", "Ann", "EXT-9"]],
        );
        let directory = TeacherDirectory::from_table(&table).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.resolve("SMITH, Jane"), Some("42"));
        assert_eq!(directory.resolve("ROE, Ann"), Some("EXT-9"));
        assert_eq!(directory.resolve("smith, jane"), None);
    }

    #[test]
    fn test_directory_missing_column() {
        let table = Table::headed(["SURNAME", "NAME"], [["SMITH", "Jane"]]);
        assert!(TeacherDirectory::from_table(&table).is_err());
    }

    #[test]
    fn test_resolve_keeps_unmatched() {
        let directory = TeacherDirectory::from_entries([TeacherIdentityEntry {
            surname: "SMITH".into(),
            name: "Jane".into(),
            user_id: "42".into(),
        }]);

        let slots = reshape_teacher_roster(&roster()).unwrap();
        let resolution = resolve_teachers(slots, &directory);

        assert_eq!(resolution.records.len(), 3);
        assert!(resolution.records.iter().all(|r| r.role == Role::Teacher));
        assert_eq!(resolution.records[0].user_id.as_deref(), Some("42"));
        assert_eq!(resolution.records[1].user_id, None);
        assert_eq!(resolution.records[1].name.as_deref(), Some("DOE, Alan"));
        assert_eq!(resolution.unresolved_rows, 1);
        assert_eq!(resolution.unresolved_names, vec!["DOE, Alan"]);
    }
}
