//! Form/answer reconciliation pipeline.
//!
//! # Responsibility
//! - Run scan → index → mark → classify exactly once, in that order.
//! - Publish both reports only when every earlier stage succeeded.
//!
//! # Invariants
//! - The presence index is complete before the first answer is read.
//! - No report file is written when any stage fails.
//! - Dangling references are logged once per run, never per record.

use crate::config::{ConfigError, DanglingPolicy, ReconcileConfig, DEFAULT_CATEGORY_MARKER};
use crate::db::{open_store_read_only, DbError};
use crate::index::presence::{MarkSummary, PresenceIndex};
use crate::logging::sanitize_message;
use crate::model::record::{AnswerRecord, FormRecord, RecordDecodeError};
use crate::report::classify::{classify, MissingReport};
use crate::report::publish::{publish_reports, PublishError, ReportArtifact};
use crate::scan::{scan_all, ExhaustiveScan, ScanError, ScanStats};
use crate::store::{ContinuationToken, PagedCollection, SqliteCollection, StoreError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

const MAX_SAMPLE_LOG_CHARS: usize = 400;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Fatal reconciliation failures. Each one aborts the run with no output.
#[derive(Debug)]
pub enum ReconcileError {
    Config(ConfigError),
    /// The store could not be opened at all.
    Store { location: PathBuf, source: DbError },
    SourceUnavailable {
        collection: String,
        token: Option<ContinuationToken>,
        source: StoreError,
    },
    InvalidRecord {
        collection: String,
        source: RecordDecodeError,
    },
    /// Only raised under [`DanglingPolicy::Strict`].
    DanglingReference {
        occurrences: u64,
        samples: Vec<String>,
    },
    OutputWriteFailure(PublishError),
}

impl ReconcileError {
    /// Pipeline stage that failed, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Store { .. } => "open_store",
            Self::SourceUnavailable { .. } | Self::InvalidRecord { .. } => "scan",
            Self::DanglingReference { .. } => "mark_present",
            Self::OutputWriteFailure(_) => "publish",
        }
    }
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
            Self::Store { location, source } => {
                write!(f, "cannot open store `{}`: {source}", location.display())
            }
            Self::SourceUnavailable {
                collection,
                token: Some(token),
                source,
            } => write!(
                f,
                "source `{collection}` unavailable after token `{token}`: {source}"
            ),
            Self::SourceUnavailable {
                collection,
                token: None,
                source,
            } => write!(f, "source `{collection}` unavailable on first page: {source}"),
            Self::InvalidRecord { collection, source } => {
                write!(f, "collection `{collection}` holds an {source}")
            }
            Self::DanglingReference {
                occurrences,
                samples,
            } => write!(
                f,
                "{occurrences} answer(s) reference unknown forms, e.g. {}",
                samples.join(", ")
            ),
            Self::OutputWriteFailure(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            Self::SourceUnavailable { source, .. } => Some(source),
            Self::InvalidRecord { source, .. } => Some(source),
            Self::DanglingReference { .. } => None,
            Self::OutputWriteFailure(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ReconcileError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ScanError> for ReconcileError {
    fn from(value: ScanError) -> Self {
        match value {
            ScanError::SourceUnavailable {
                collection,
                token,
                source,
            } => Self::SourceUnavailable {
                collection,
                token,
                source,
            },
            ScanError::InvalidRecord { collection, source } => {
                Self::InvalidRecord { collection, source }
            }
        }
    }
}

impl From<PublishError> for ReconcileError {
    fn from(value: PublishError) -> Self {
        Self::OutputWriteFailure(value)
    }
}

/// In-memory result of one reconciliation, before publication.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub forms: ScanStats,
    pub answers: ScanStats,
    pub index_entries: usize,
    pub duplicate_ids: u64,
    pub mark: MarkSummary,
    pub report: MissingReport,
}

/// Result of a full run including the published files.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub run_id: Uuid,
    pub reconciliation: Reconciliation,
    /// Full report first, filtered report second.
    pub published: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Reconciles a form collection against an answer collection.
pub struct ReconcileService<F: PagedCollection, A: PagedCollection> {
    forms: F,
    answers: A,
    category_marker: String,
    dangling_policy: DanglingPolicy,
}

impl<F: PagedCollection, A: PagedCollection> ReconcileService<F, A> {
    pub fn new(forms: F, answers: A) -> Self {
        Self {
            forms,
            answers,
            category_marker: DEFAULT_CATEGORY_MARKER.to_string(),
            dangling_policy: DanglingPolicy::default(),
        }
    }

    pub fn with_category_marker(mut self, marker: impl Into<String>) -> Self {
        self.category_marker = marker.into();
        self
    }

    pub fn with_dangling_policy(mut self, policy: DanglingPolicy) -> Self {
        self.dangling_policy = policy;
        self
    }

    /// Scans both collections and classifies forms without answers.
    pub fn reconcile(&self) -> ReconcileResult<Reconciliation> {
        let (forms, form_stats) = scan_all::<FormRecord, _>(&self.forms)?;
        let mut index = PresenceIndex::build(forms);
        info!(
            "event=index_build module=service status=ok collection={} entries={} duplicates={}",
            self.forms.name(),
            index.len(),
            index.duplicate_ids()
        );
        if index.duplicate_ids() > 0 {
            warn!(
                "event=index_build module=service status=warn collection={} duplicates={} policy=last_write_wins",
                self.forms.name(),
                index.duplicate_ids()
            );
        }

        let mut answers = ExhaustiveScan::new(&self.answers).records::<AnswerRecord>();
        let mut scan_failure = None;
        let mark = index.mark_present(answers.by_ref().map_while(|answer| match answer {
            Ok(answer) => Some(answer),
            Err(err) => {
                scan_failure = Some(err);
                None
            }
        }));
        if let Some(err) = scan_failure {
            return Err(err.into());
        }
        let answer_stats = answers.stats();
        info!(
            "event=mark_present module=service status=ok collection={} answers={} marked={} dangling={}",
            self.answers.name(),
            mark.answers,
            mark.newly_marked,
            mark.dangling.occurrences
        );
        self.check_dangling(&mark)?;

        let report = classify(&index, &self.category_marker);
        info!(
            "event=classify module=service status=ok forms={} missing={} missing_without_marker={} marker={}",
            index.len(),
            report.all().len(),
            report.without_marker().len(),
            report.marker()
        );

        Ok(Reconciliation {
            forms: form_stats,
            answers: answer_stats,
            index_entries: index.len(),
            duplicate_ids: index.duplicate_ids(),
            mark,
            report,
        })
    }

    fn check_dangling(&self, mark: &MarkSummary) -> ReconcileResult<()> {
        if mark.dangling.is_empty() {
            return Ok(());
        }
        let samples = sanitize_message(&mark.dangling.samples().join(","), MAX_SAMPLE_LOG_CHARS);
        match self.dangling_policy {
            DanglingPolicy::Warn => {
                warn!(
                    "event=dangling_reference module=service status=warn collection={} occurrences={} samples={samples}",
                    self.answers.name(),
                    mark.dangling.occurrences
                );
                Ok(())
            }
            DanglingPolicy::Strict => {
                error!(
                    "event=dangling_reference module=service status=error collection={} occurrences={} samples={samples}",
                    self.answers.name(),
                    mark.dangling.occurrences
                );
                Err(ReconcileError::DanglingReference {
                    occurrences: mark.dangling.occurrences,
                    samples: mark.dangling.samples().to_vec(),
                })
            }
        }
    }
}

/// Builds the two report artifacts named after the configured stage.
pub fn report_artifacts(config: &ReconcileConfig, report: &MissingReport) -> [ReportArtifact; 2] {
    [
        ReportArtifact {
            file_name: config.full_report_name(),
            contents: report.render_all(),
        },
        ReportArtifact {
            file_name: config.filtered_report_name(),
            contents: report.render_without_marker(),
        },
    ]
}

/// Runs a full reconciliation against the configured store and publishes
/// both reports into `config.output_dir`.
pub fn run_reconcile(config: &ReconcileConfig) -> ReconcileResult<ReconcileOutcome> {
    let started_at = Instant::now();
    let run_id = Uuid::new_v4();
    info!(
        "event=reconcile module=service status=start run_id={run_id} stage={} local={} marker={}",
        config.stage, config.run_local, config.category_marker
    );

    let result = run_stages(config).map(|(reconciliation, published)| ReconcileOutcome {
        run_id,
        reconciliation,
        published,
        elapsed: started_at.elapsed(),
    });

    match &result {
        Ok(outcome) => info!(
            "event=reconcile module=service status=ok run_id={run_id} forms={} answers={} missing={} missing_without_marker={} elapsed_ms={}",
            outcome.reconciliation.forms.items,
            outcome.reconciliation.answers.items,
            outcome.reconciliation.report.all().len(),
            outcome.reconciliation.report.without_marker().len(),
            outcome.elapsed.as_millis()
        ),
        Err(err) => error!(
            "event=reconcile module=service status=error run_id={run_id} failed_stage={} elapsed_ms={} error={err}",
            err.stage(),
            started_at.elapsed().as_millis()
        ),
    }
    result
}

fn run_stages(config: &ReconcileConfig) -> ReconcileResult<(Reconciliation, Vec<PathBuf>)> {
    config.validate()?;
    let page_size = config.page_size()?;
    let location = config.store_location()?;
    let conn = open_store_read_only(location).map_err(|source| ReconcileError::Store {
        location: location.to_path_buf(),
        source,
    })?;

    let forms = SqliteCollection::new(&conn, config.forms_collection(), page_size);
    let answers = SqliteCollection::new(&conn, config.answers_collection(), page_size);
    let reconciliation = ReconcileService::new(forms, answers)
        .with_category_marker(config.category_marker.clone())
        .with_dangling_policy(config.dangling_policy)
        .reconcile()?;

    let artifacts = report_artifacts(config, &reconciliation.report);
    let published = publish_reports(&config.output_dir, &artifacts)?;
    Ok((reconciliation, published))
}
