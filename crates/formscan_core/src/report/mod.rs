//! Missing-form classification and report publication.
//!
//! # Responsibility
//! - Turn the marked presence index into the full and filtered reports.
//! - Publish both report files together or not at all.
//!
//! # Invariants
//! - The filtered report is always a subset of the full report.
//! - Report lines are ordered by form id.

pub mod classify;
pub mod publish;
