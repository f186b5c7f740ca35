//! Term attribution, cross-list merging and course exclusion.
//!
//! The three steps run in a fixed order. The term is looked up under the
//! reporting course id *before* the merge replaces it with the enrollment
//! target, and exclusion is checked against the post-merge id.

use std::collections::HashSet;

use super::courses::Catalog;
use crate::models::EnrollmentRecord;

/// Counts produced by [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileStats {
    /// Records whose course has no term (kept, never partitioned).
    pub without_term: usize,
    pub merged: usize,
    pub excluded_enrollments: usize,
    /// Distinct excluded course ids that removed at least one enrollment.
    pub excluded_courses: Vec<String>,
}

/// Set `term_id` from the catalog; unknown courses get `None`.
pub fn attribute_terms(enrollments: &mut [EnrollmentRecord], catalog: &Catalog) {
    for record in enrollments {
        record.term_id = record
            .course_id
            .as_deref()
            .and_then(|id| catalog.term_of(id))
            .map(String::from);
    }
}

/// Replace course ids that have a merge target. Returns how many changed.
pub fn apply_merges(enrollments: &mut [EnrollmentRecord], catalog: &Catalog) -> usize {
    let mut merged = 0;
    for record in enrollments {
        let target = record.course_id.as_deref().and_then(|id| catalog.merge_target(id));
        if let Some(target) = target {
            record.course_id = Some(target.to_string());
            merged += 1;
        }
    }
    merged
}

/// Drop enrollments on courses flagged `CANVAS_NEEDED = N`.
///
/// Course ids absent from the catalog are kept.
pub fn exclude_unprovisioned(
    enrollments: Vec<EnrollmentRecord>,
    catalog: &Catalog,
) -> (Vec<EnrollmentRecord>, usize, Vec<String>) {
    let excluded: HashSet<&str> = catalog.excluded_ids();
    let mut hit: Vec<String> = Vec::new();
    let before = enrollments.len();

    let kept: Vec<EnrollmentRecord> = enrollments
        .into_iter()
        .filter(|record| match record.course_id.as_deref() {
            Some(id) if excluded.contains(id) => {
                if !hit.iter().any(|h| h == id) {
                    hit.push(id.to_string());
                }
                false
            }
            _ => true,
        })
        .collect();

    let dropped = before - kept.len();
    (kept, dropped, hit)
}

/// Attribute terms, apply merges, then filter excluded courses.
pub fn reconcile(
    mut enrollments: Vec<EnrollmentRecord>,
    catalog: &Catalog,
) -> (Vec<EnrollmentRecord>, ReconcileStats) {
    attribute_terms(&mut enrollments, catalog);
    let merged = apply_merges(&mut enrollments, catalog);
    let (kept, excluded_enrollments, excluded_courses) = exclude_unprovisioned(enrollments, catalog);

    let stats = ReconcileStats {
        without_term: kept.iter().filter(|r| r.term_id.is_none()).count(),
        merged,
        excluded_enrollments,
        excluded_courses,
    };
    (kept, stats)
}
