//! Reconciliation stages.
//!
//! - [`courses`]: catalog normalization, term and merge lookups
//! - [`students`]: positional student block parsing
//! - [`teachers`]: teacher roster reshape and name resolution
//! - [`reconcile`]: term attribution, merges, exclusion
//! - [`ids`]: `u000000` / `c000000` formatting
//! - [`overrides`]: manual corrections and bulk teachers
//! - [`partition`]: split by term
//! - [`pipeline`]: the whole run

pub mod courses;
pub mod ids;
pub mod overrides;
pub mod partition;
pub mod pipeline;
pub mod reconcile;
pub mod students;
pub mod teachers;

pub use pipeline::*;
