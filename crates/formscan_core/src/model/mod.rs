//! Record shapes read from the primary and secondary collections.
//!
//! # Responsibility
//! - Define the typed view of raw store documents.
//! - Keep attribute naming of the external store (`state_form`, `created_by`)
//!   out of the rest of the crate.
//!
//! # Invariants
//! - Records are read-only snapshots; nothing in this crate writes them back.

pub mod record;
