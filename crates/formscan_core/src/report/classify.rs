//! Classification of missing forms.

use crate::index::presence::{IndexEntry, PresenceIndex};
use std::fmt::{Display, Formatter};

/// One report line: `"<id>, <created_by>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingLine {
    pub id: String,
    pub created_by: String,
}

impl MissingLine {
    /// Case-sensitive literal match on the form id only.
    pub fn has_marker(&self, marker: &str) -> bool {
        self.id.contains(marker)
    }
}

impl From<&IndexEntry> for MissingLine {
    fn from(entry: &IndexEntry) -> Self {
        Self {
            id: entry.id.clone(),
            created_by: entry.created_by.clone(),
        }
    }
}

impl Display for MissingLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.id, self.created_by)
    }
}

/// Both report variants computed from one marked index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingReport {
    marker: String,
    all: Vec<MissingLine>,
    without_marker: Vec<MissingLine>,
}

impl MissingReport {
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Every form with no answers.
    pub fn all(&self) -> &[MissingLine] {
        &self.all
    }

    /// Missing forms whose id does not contain the marker.
    pub fn without_marker(&self) -> &[MissingLine] {
        &self.without_marker
    }

    pub fn render_all(&self) -> String {
        render(&self.all)
    }

    pub fn render_without_marker(&self) -> String {
        render(&self.without_marker)
    }
}

/// Selects still-missing entries and splits them by `marker`.
pub fn classify(index: &PresenceIndex, marker: &str) -> MissingReport {
    let all: Vec<MissingLine> = index.missing_entries().map(MissingLine::from).collect();
    let without_marker = all
        .iter()
        .filter(|line| !line.has_marker(marker))
        .cloned()
        .collect();
    MissingReport {
        marker: marker.to_string(),
        all,
        without_marker,
    }
}

fn render(lines: &[MissingLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
