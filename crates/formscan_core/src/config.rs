//! Run configuration for one reconciliation.
//!
//! # Responsibility
//! - Hold every run parameter in one value built at startup.
//! - Resolve collection names, store location and report file names.
//!
//! # Invariants
//! - A validated config always names a readable store location and a
//!   non-empty category marker.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

pub const DEFAULT_STAGE: &str = "master";
pub const DEFAULT_CATEGORY_MARKER: &str = "ECI";
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_LOCAL_STORE_FILE: &str = "formscan-local.sqlite3";
/// Table prefix used instead of the stage when running against the local
/// backend.
pub const LOCAL_TABLE_PREFIX: &str = "local";
pub const FORMS_COLLECTION_SUFFIX: &str = "-state-forms";
pub const ANSWERS_COLLECTION_SUFFIX: &str = "-form-answers";
const REPORT_EXTENSION: &str = "txt";

static STAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid stage regex"));
/// Markers end up in a report file name; keep them to one path component.
static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid marker regex"));

/// What to do with answers that reference unknown forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DanglingPolicy {
    /// Aggregate and log a warning; the run succeeds.
    #[default]
    Warn,
    /// Abort the run before any report is written.
    Strict,
}

/// Configuration rejected by [`ReconcileConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidStage(String),
    EmptyCategoryMarker,
    InvalidCategoryMarker(String),
    ZeroPageSize,
    MissingStorePath,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidStage(stage) => write!(
                f,
                "stage `{stage}` is invalid; expected lowercase letters, digits, `-` or `_`"
            ),
            Self::EmptyCategoryMarker => write!(f, "category marker cannot be empty"),
            Self::InvalidCategoryMarker(marker) => write!(
                f,
                "category marker `{marker}` is invalid; expected letters, digits, `.`, `-` or `_`"
            ),
            Self::ZeroPageSize => write!(f, "page size must be greater than zero"),
            Self::MissingStorePath => {
                write!(f, "remote mode requires a store path")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Deployment stage label, e.g. `master`, `val`, `production`.
    pub stage: String,
    /// Read from the local-development store instead of the remote one.
    pub run_local: bool,
    /// Remote store location; required unless `run_local`.
    pub store_path: Option<PathBuf>,
    pub local_store_path: PathBuf,
    pub category_marker: String,
    pub output_dir: PathBuf,
    pub page_size: u32,
    pub dangling_policy: DanglingPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            stage: DEFAULT_STAGE.to_string(),
            run_local: false,
            store_path: None,
            local_store_path: PathBuf::from(DEFAULT_LOCAL_STORE_FILE),
            category_marker: DEFAULT_CATEGORY_MARKER.to_string(),
            output_dir: PathBuf::from("."),
            page_size: DEFAULT_PAGE_SIZE,
            dangling_policy: DanglingPolicy::Warn,
        }
    }
}

impl ReconcileConfig {
    /// Local-backend config for `stage`, reading `local_store_path`.
    pub fn local(stage: impl Into<String>, local_store_path: impl Into<PathBuf>) -> Self {
        Self {
            stage: stage.into(),
            run_local: true,
            local_store_path: local_store_path.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_stage(&self.stage) {
            return Err(ConfigError::InvalidStage(self.stage.clone()));
        }
        if self.category_marker.is_empty() {
            return Err(ConfigError::EmptyCategoryMarker);
        }
        if !is_valid_marker(&self.category_marker) {
            return Err(ConfigError::InvalidCategoryMarker(
                self.category_marker.clone(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if !self.run_local && self.store_path.is_none() {
            return Err(ConfigError::MissingStorePath);
        }
        Ok(())
    }

    pub fn page_size(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.page_size).ok_or(ConfigError::ZeroPageSize)
    }

    /// Prefix of both collection names.
    pub fn table_prefix(&self) -> &str {
        if self.run_local {
            LOCAL_TABLE_PREFIX
        } else {
            &self.stage
        }
    }

    pub fn forms_collection(&self) -> String {
        format!("{}{FORMS_COLLECTION_SUFFIX}", self.table_prefix())
    }

    pub fn answers_collection(&self) -> String {
        format!("{}{ANSWERS_COLLECTION_SUFFIX}", self.table_prefix())
    }

    pub fn store_location(&self) -> Result<&Path, ConfigError> {
        if self.run_local {
            return Ok(&self.local_store_path);
        }
        self.store_path
            .as_deref()
            .ok_or(ConfigError::MissingStorePath)
    }

    /// `<stage>-missing.txt`
    pub fn full_report_name(&self) -> String {
        format!("{}-missing.{REPORT_EXTENSION}", self.stage)
    }

    /// `<stage>-missing-non-<marker>.txt`, marker lowercased.
    pub fn filtered_report_name(&self) -> String {
        format!(
            "{}-missing-non-{}.{REPORT_EXTENSION}",
            self.stage,
            self.category_marker.to_lowercase()
        )
    }
}

pub fn is_valid_stage(stage: &str) -> bool {
    STAGE_RE.is_match(stage)
}

pub fn is_valid_marker(marker: &str) -> bool {
    MARKER_RE.is_match(marker)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ReconcileConfig};
    use std::path::{Path, PathBuf};

    #[test]
    fn remote_names_follow_stage() {
        let config = ReconcileConfig {
            stage: "val".to_string(),
            store_path: Some(PathBuf::from("/srv/val.sqlite3")),
            ..ReconcileConfig::default()
        };
        config.validate().expect("remote config should validate");
        assert_eq!(config.forms_collection(), "val-state-forms");
        assert_eq!(config.answers_collection(), "val-form-answers");
        assert_eq!(
            config.store_location().expect("store path"),
            Path::new("/srv/val.sqlite3")
        );
        assert_eq!(config.full_report_name(), "val-missing.txt");
        assert_eq!(config.filtered_report_name(), "val-missing-non-eci.txt");
    }

    #[test]
    fn local_mode_uses_local_prefix_but_stage_file_names() {
        let config = ReconcileConfig::local("master", "/tmp/local.sqlite3");
        config.validate().expect("local config should validate");
        assert_eq!(config.forms_collection(), "local-state-forms");
        assert_eq!(config.answers_collection(), "local-form-answers");
        assert_eq!(config.full_report_name(), "master-missing.txt");
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = ReconcileConfig::local("Master Stage", "x.sqlite3");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidStage(_))
        ));

        config.stage = "master".to_string();
        config.category_marker.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyCategoryMarker));

        for marker in ["E/CI", "..", "ECI\\x", " ECI"] {
            config.category_marker = marker.to_string();
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidCategoryMarker(marker.to_string()))
            );
        }

        config.category_marker = "64.ECI".to_string();
        config.validate().expect("dotted marker is file-name safe");

        config.category_marker = "ECI".to_string();
        config.page_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPageSize));

        let remote = ReconcileConfig::default();
        assert_eq!(remote.validate(), Err(ConfigError::MissingStorePath));
    }
}
