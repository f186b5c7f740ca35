//! Identifier canonicalization.
//!
//! Source sheets carry ids as integers, as float artifacts of spreadsheet
//! exports (`"101.0"`), or already in the prefixed import form (`"u000055"`).
//! Everything funnels through [`integer_string`] and [`canonical_id`]; values
//! that are not integer-like pass through untouched and never fail.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{EnrollmentRecord, EnrollmentStatus};

/// Non-negative integer, optionally with an all-zero fractional part.
static INTEGER_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?(\d+)(?:\.0*)?$").expect("valid integer regex"));

/// Kind of identifier, which decides the import prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    User,
    Course,
}

impl IdKind {
    pub fn prefix(self) -> char {
        match self {
            Self::User => 'u',
            Self::Course => 'c',
        }
    }
}

/// Canonical string-integer form of `raw`, or `None` when it is not integer-like.
///
/// `"101"`, `"101.0"`, `" 0101 "` and `"1.01e2"` all yield `"101"`.
pub fn integer_string(raw: &str) -> Option<String> {
    let trimmed = raw.trim();

    if let Some(caps) = INTEGER_LIKE.captures(trimmed) {
        let digits = caps[1].trim_start_matches('0');
        return Some(if digits.is_empty() { "0".to_string() } else { digits.to_string() });
    }

    // Exponent notation from float-typed exports
    let value: f64 = trimmed.parse().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < 9.0e15 {
        Some(format!("{}", value as u64))
    } else {
        None
    }
}

/// Integer form when integer-like, the raw value otherwise.
pub fn integer_or_raw(raw: &str) -> String {
    integer_string(raw).unwrap_or_else(|| raw.to_string())
}

/// True when `value` is already `<prefix><digits>`.
pub fn is_canonical(kind: IdKind, value: &str) -> bool {
    value
        .strip_prefix(kind.prefix())
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Render an id in import form: prefix plus at least six zero-padded digits.
///
/// Already-canonical values and non-integer values are returned unchanged,
/// so the function is idempotent. Longer ids keep every digit.
pub fn canonical_id(kind: IdKind, value: &str) -> String {
    if is_canonical(kind, value) {
        return value.to_string();
    }
    match integer_string(value) {
        Some(digits) => format!("{}{:0>6}", kind.prefix(), digits),
        None => value.to_string(),
    }
}

pub fn format_user_id(user_id: Option<&str>) -> Option<String> {
    user_id.map(|v| canonical_id(IdKind::User, v))
}

pub fn format_course_id(course_id: Option<&str>) -> Option<String> {
    course_id.map(|v| canonical_id(IdKind::Course, v))
}

/// Canonicalize both ids of one record, leaving its status alone.
pub fn format_record_ids(record: &mut EnrollmentRecord) {
    record.user_id = format_user_id(record.user_id.as_deref());
    record.course_id = format_course_id(record.course_id.as_deref());
}

/// Canonicalize ids and mark every record active.
pub fn format_ids(mut enrollments: Vec<EnrollmentRecord>) -> Vec<EnrollmentRecord> {
    for record in &mut enrollments {
        format_record_ids(record);
        record.status = Some(EnrollmentStatus::Active);
    }
    enrollments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_integer_string_branches() {
        assert_eq!(integer_string("101"), Some("101".into()));
        assert_eq!(integer_string("101.0"), Some("101".into()));
        assert_eq!(integer_string("101."), Some("101".into()));
        assert_eq!(integer_string(" 0101 "), Some("101".into()));
        assert_eq!(integer_string("000"), Some("0".into()));
        assert_eq!(integer_string("1.01e2"), Some("101".into()));
        assert_eq!(integer_string("101.5"), None);
        assert_eq!(integer_string("-5"), None);
        assert_eq!(integer_string("ABC"), None);
        assert_eq!(integer_string(""), None);
        assert_eq!(integer_string("nan"), None);
    }

    #[test]
    fn test_canonical_id_numeric_string() {
        assert_eq!(canonical_id(IdKind::User, "55"), "u000055");
        assert_eq!(canonical_id(IdKind::Course, "101"), "c000101");
    }

    #[test]
    fn test_canonical_id_float_like() {
        assert_eq!(canonical_id(IdKind::User, "55.0"), "u000055");
        assert_eq!(canonical_id(IdKind::Course, "101.00"), "c000101");
    }

    #[test]
    fn test_canonical_id_already_prefixed() {
        assert_eq!(canonical_id(IdKind::User, "u000055"), "u000055");
        assert_eq!(canonical_id(IdKind::Course, "c1234567"), "c1234567");
    }

    #[test]
    fn test_canonical_id_wrong_prefix_passes_through() {
        assert_eq!(canonical_id(IdKind::User, "c000101"), "c000101");
        assert_eq!(canonical_id(IdKind::Course, "u"), "u");
    }

    #[test]
    fn test_canonical_id_non_numeric_passes_through() {
        assert_eq!(canonical_id(IdKind::User, "guest-7"), "guest-7");
        assert_eq!(canonical_id(IdKind::Course, "MATH-101"), "MATH-101");
    }

    #[test]
    fn test_canonical_id_long_ids_not_truncated() {
        assert_eq!(canonical_id(IdKind::User, "12345678"), "u12345678");
        assert_eq!(canonical_id(IdKind::Course, "1234567.0"), "c1234567");
    }

    #[test]
    fn test_null_passes_through() {
        assert_eq!(format_user_id(None), None);
        assert_eq!(format_course_id(None), None);
    }

    fn record(user: Option<&str>, course: Option<&str>) -> EnrollmentRecord {
        let mut r = EnrollmentRecord::new(Role::Student);
        r.user_id = user.map(String::from);
        r.course_id = course.map(String::from);
        r
    }

    #[test]
    fn test_format_ids_sets_active() {
        let mut completed = record(Some("7"), Some("101"));
        completed.status = Some(EnrollmentStatus::Completed);

        let formatted = format_ids(vec![completed, record(None, Some("c000101"))]);
        assert_eq!(formatted[0].user_id.as_deref(), Some("u000007"));
        assert_eq!(formatted[0].course_id.as_deref(), Some("c000101"));
        assert_eq!(formatted[0].status, Some(EnrollmentStatus::Active));
        assert_eq!(formatted[1].user_id, None);
        assert_eq!(formatted[1].status, Some(EnrollmentStatus::Active));
    }

    #[test]
    fn test_format_ids_idempotent() {
        let input = vec![
            record(Some("55"), Some("101")),
            record(Some("55.0"), Some("101.0")),
            record(Some("u000055"), Some("c000101")),
            record(Some("12345678"), Some("MATH-1")),
            record(None, None),
        ];

        let once = format_ids(input);
        let twice = format_ids(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_format_record_ids_keeps_status() {
        let mut r = record(Some("9"), Some("12"));
        r.status = Some(EnrollmentStatus::Deleted);
        format_record_ids(&mut r);
        assert_eq!(r.user_id.as_deref(), Some("u000009"));
        assert_eq!(r.status, Some(EnrollmentStatus::Deleted));
    }
}
