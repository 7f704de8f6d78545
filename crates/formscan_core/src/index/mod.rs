//! In-memory presence index for the form/answer anti-join.
//!
//! # Responsibility
//! - Hold one entry per distinct form id with its missing/present status.
//! - Aggregate dangling references instead of failing on them.
//!
//! # Invariants
//! - The index is fully built from the primary collection before any marking.
//! - `missing` only ever goes from `true` to `false`.

pub mod presence;
