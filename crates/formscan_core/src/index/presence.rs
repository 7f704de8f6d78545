//! Presence index build and mark operations.

use crate::model::record::{AnswerRecord, FormRecord};
use std::collections::BTreeMap;

/// Maximum number of distinct dangling ids kept for diagnostics.
pub const DANGLING_SAMPLE_LIMIT: usize = 10;

/// Per-form status tracked by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub created_by: String,
    pub missing: bool,
}

/// Result of marking one referenced form id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Entry flipped from missing to present.
    Marked,
    /// Entry was already present; nothing changed.
    AlreadyPresent,
    /// No entry exists for the referenced id.
    Dangling,
}

/// Aggregated dangling references, reported once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DanglingReferences {
    /// Answer records whose form id was unknown.
    pub occurrences: u64,
    samples: Vec<String>,
}

impl DanglingReferences {
    pub fn is_empty(&self) -> bool {
        self.occurrences == 0
    }

    /// First distinct dangling ids, in encounter order.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    fn record(&mut self, form_id: &str) {
        self.occurrences += 1;
        if self.samples.len() < DANGLING_SAMPLE_LIMIT && !self.samples.iter().any(|s| s == form_id)
        {
            self.samples.push(form_id.to_string());
        }
    }
}

/// Counters produced by the mark phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkSummary {
    pub answers: u64,
    pub newly_marked: u64,
    pub dangling: DanglingReferences,
}

impl MarkSummary {
    pub fn record(&mut self, outcome: MarkOutcome, form_id: &str) {
        self.answers += 1;
        match outcome {
            MarkOutcome::Marked => self.newly_marked += 1,
            MarkOutcome::AlreadyPresent => {}
            MarkOutcome::Dangling => self.dangling.record(form_id),
        }
    }
}

/// Map from form id to presence status, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct PresenceIndex {
    entries: BTreeMap<String, IndexEntry>,
    duplicate_ids: u64,
}

impl PresenceIndex {
    /// Builds the index with every form initially missing.
    ///
    /// A repeated id overwrites the earlier entry (last write wins) and is
    /// counted in [`PresenceIndex::duplicate_ids`].
    pub fn build(forms: impl IntoIterator<Item = FormRecord>) -> Self {
        let mut index = Self::default();
        for form in forms {
            let entry = IndexEntry {
                id: form.id.clone(),
                created_by: form.created_by,
                missing: true,
            };
            if index.entries.insert(form.id, entry).is_some() {
                index.duplicate_ids += 1;
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of primary records that overwrote an earlier one.
    pub fn duplicate_ids(&self) -> u64 {
        self.duplicate_ids
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// All entries in ascending id order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Entries still missing, in ascending id order.
    pub fn missing_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries().filter(|entry| entry.missing)
    }

    /// Marks the referenced form as present.
    pub fn mark(&mut self, form_id: &str) -> MarkOutcome {
        match self.entries.get_mut(form_id) {
            Some(entry) if entry.missing => {
                entry.missing = false;
                MarkOutcome::Marked
            }
            Some(_) => MarkOutcome::AlreadyPresent,
            None => MarkOutcome::Dangling,
        }
    }

    /// Marks every referenced form and aggregates the outcomes.
    pub fn mark_present(&mut self, answers: impl IntoIterator<Item = AnswerRecord>) -> MarkSummary {
        let mut summary = MarkSummary::default();
        for answer in answers {
            let outcome = self.mark(&answer.form_id);
            summary.record(outcome, &answer.form_id);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::{MarkOutcome, PresenceIndex, DANGLING_SAMPLE_LIMIT};
    use crate::model::record::{AnswerRecord, FormRecord};

    #[test]
    fn build_starts_every_entry_missing() {
        let index = PresenceIndex::build(vec![
            FormRecord::new("B", "u2"),
            FormRecord::new("A", "u1"),
        ]);
        assert_eq!(index.len(), 2);
        assert!(index.entries().all(|entry| entry.missing));
        let ids: Vec<_> = index.entries().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn duplicate_id_is_last_write_wins() {
        let index = PresenceIndex::build(vec![
            FormRecord::new("A", "first"),
            FormRecord::new("A", "second"),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.duplicate_ids(), 1);
        assert_eq!(index.get("A").map(|e| e.created_by.as_str()), Some("second"));
    }

    #[test]
    fn marking_is_idempotent_and_monotonic() {
        let mut index = PresenceIndex::build(vec![FormRecord::new("A", "u1")]);
        assert_eq!(index.mark("A"), MarkOutcome::Marked);
        assert_eq!(index.mark("A"), MarkOutcome::AlreadyPresent);
        assert!(!index.get("A").expect("entry exists").missing);
        assert_eq!(index.missing_entries().count(), 0);
    }

    #[test]
    fn unknown_reference_is_counted_not_fatal() {
        let mut index = PresenceIndex::build(vec![FormRecord::new("A", "u1")]);
        let summary = index.mark_present(vec![
            AnswerRecord::new("Z-0"),
            AnswerRecord::new("Z-0"),
            AnswerRecord::new("A"),
        ]);
        assert_eq!(summary.answers, 3);
        assert_eq!(summary.newly_marked, 1);
        assert_eq!(summary.dangling.occurrences, 2);
        assert_eq!(summary.dangling.samples(), ["Z-0".to_string()]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn dangling_samples_are_capped() {
        let mut index = PresenceIndex::build(Vec::new());
        let answers = (0..DANGLING_SAMPLE_LIMIT + 5).map(|i| AnswerRecord::new(format!("X-{i}")));
        let summary = index.mark_present(answers);
        assert_eq!(summary.dangling.occurrences, (DANGLING_SAMPLE_LIMIT + 5) as u64);
        assert_eq!(summary.dangling.samples().len(), DANGLING_SAMPLE_LIMIT);
    }
}
