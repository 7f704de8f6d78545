//! Core engine for reconciling form records against their answers.
//! Scans both collections exhaustively, builds a presence index and reports
//! every form that has no answer.

pub mod config;
pub mod db;
pub mod index;
pub mod logging;
pub mod model;
pub mod report;
pub mod scan;
pub mod service;
pub mod store;

pub use config::{ConfigError, DanglingPolicy, ReconcileConfig};
pub use index::presence::{DanglingReferences, IndexEntry, MarkOutcome, MarkSummary, PresenceIndex};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::record::{AnswerRecord, Document, FormRecord, Record, RecordDecodeError};
pub use report::classify::{classify, MissingLine, MissingReport};
pub use report::publish::{publish_reports, PublishError, ReportArtifact};
pub use scan::{scan_all, ExhaustiveScan, ScanError, ScanStats};
pub use service::reconcile_service::{
    run_reconcile, ReconcileError, ReconcileOutcome, ReconcileResult, ReconcileService,
    Reconciliation,
};
pub use service::seed_service::{seed_collection, SeedError};
pub use store::{
    ContinuationToken, MemoryCollection, Page, PagedCollection, SqliteCollection, StoreError,
    StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
