//! Split the final enrollment set by academic term.

use crate::models::{EnrollmentRecord, EnrollmentRow};

/// Enrollments of one term, projected onto the import schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TermPartition {
    pub term_id: String,
    pub rows: Vec<EnrollmentRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitioned {
    /// One entry per distinct non-null term, in first-appearance order.
    pub partitions: Vec<TermPartition>,
    /// Records with no term; they are never published.
    pub unassigned: usize,
}

impl Partitioned {
    pub fn get(&self, term_id: &str) -> Option<&TermPartition> {
        self.partitions.iter().find(|p| p.term_id == term_id)
    }

    pub fn term_ids(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().map(|p| p.term_id.as_str())
    }
}

pub fn partition_by_term(enrollments: &[EnrollmentRecord]) -> Partitioned {
    let mut out = Partitioned::default();

    for record in enrollments {
        let Some(term) = record.term_id.as_deref() else {
            out.unassigned += 1;
            continue;
        };
        match out.partitions.iter_mut().find(|p| p.term_id == term) {
            Some(partition) => partition.rows.push(record.to_row()),
            None => out.partitions.push(TermPartition {
                term_id: term.to_string(),
                rows: vec![record.to_row()],
            }),
        }
    }

    out
}
