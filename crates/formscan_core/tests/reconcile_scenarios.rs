use formscan_core::{
    DanglingPolicy, Document, MemoryCollection, ReconcileError, ReconcileService, Reconciliation,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;

fn form(id: &str, created_by: &str) -> Document {
    json!({ "state_form": id, "created_by": created_by })
        .as_object()
        .unwrap()
        .clone()
}

fn answer(form_id: &str) -> Document {
    json!({ "answer_entry": format!("{form_id}-2021-07"), "state_form": form_id })
        .as_object()
        .unwrap()
        .clone()
}

fn reconcile(forms: Vec<Document>, answers: Vec<Document>) -> Reconciliation {
    ReconcileService::new(
        MemoryCollection::from_pages("t-state-forms", vec![forms]),
        MemoryCollection::from_pages("t-form-answers", vec![answers]),
    )
    .reconcile()
    .unwrap()
}

fn lines(report: &[formscan_core::MissingLine]) -> Vec<String> {
    report.iter().map(ToString::to_string).collect()
}

#[test]
fn scenario_a_marker_form_only_in_full_report() {
    let result = reconcile(
        vec![form("A-1", "u1"), form("B-1-ECI", "u2")],
        vec![answer("A-1")],
    );
    assert_eq!(lines(result.report.all()), vec!["B-1-ECI, u2"]);
    assert!(result.report.without_marker().is_empty());
    assert_eq!(result.report.render_without_marker(), "");
}

#[test]
fn scenario_b_form_without_any_answers() {
    let result = reconcile(vec![form("C-9", "u3")], Vec::new());
    assert_eq!(lines(result.report.all()), vec!["C-9, u3"]);
    assert_eq!(lines(result.report.without_marker()), vec!["C-9, u3"]);
}

#[test]
fn scenario_c_dangling_reference_is_recorded_and_ignored() {
    let result = reconcile(
        vec![form("A-1", "u1"), form("B-1-ECI", "u2")],
        vec![answer("A-1"), answer("Z-0")],
    );
    assert_eq!(lines(result.report.all()), vec!["B-1-ECI, u2"]);
    assert!(result.report.without_marker().is_empty());
    assert_eq!(result.mark.dangling.occurrences, 1);
    assert_eq!(result.mark.dangling.samples(), ["Z-0".to_string()]);
    assert_eq!(result.index_entries, 2);
}

#[test]
fn strict_policy_turns_dangling_reference_into_failure() {
    let err = ReconcileService::new(
        MemoryCollection::from_pages("t-state-forms", vec![vec![form("A-1", "u1")]]),
        MemoryCollection::from_pages("t-form-answers", vec![vec![answer("Z-0")]]),
    )
    .with_dangling_policy(DanglingPolicy::Strict)
    .reconcile()
    .unwrap_err();

    assert_eq!(err.stage(), "mark_present");
    match err {
        ReconcileError::DanglingReference {
            occurrences,
            samples,
        } => {
            assert_eq!(occurrences, 1);
            assert_eq!(samples, vec!["Z-0".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn many_answers_per_form_count_as_one_presence() {
    let result = reconcile(
        vec![form("A-1", "u1"), form("A-2", "u1")],
        vec![answer("A-1"), answer("A-1"), answer("A-1")],
    );
    assert_eq!(result.mark.answers, 3);
    assert_eq!(result.mark.newly_marked, 1);
    assert_eq!(lines(result.report.all()), vec!["A-2, u1"]);
}

#[test]
fn custom_marker_changes_filtered_report_only() {
    let result = ReconcileService::new(
        MemoryCollection::from_pages(
            "t-state-forms",
            vec![vec![form("AL-2020-1-21E", "u1"), form("AL-2020-4-64.ECI", "u2")]],
        ),
        MemoryCollection::from_pages("t-form-answers", Vec::new()),
    )
    .with_category_marker("21E")
    .reconcile()
    .unwrap();

    assert_eq!(result.report.all().len(), 2);
    assert_eq!(lines(result.report.without_marker()), vec!["AL-2020-4-64.ECI, u2"]);
}

#[test]
fn invalid_answer_document_aborts_the_run() {
    let bad = json!({ "answer_entry": "orphan" }).as_object().unwrap().clone();
    let err = ReconcileService::new(
        MemoryCollection::from_pages("t-state-forms", vec![vec![form("A-1", "u1")]]),
        MemoryCollection::from_pages("t-form-answers", vec![vec![bad]]),
    )
    .reconcile()
    .unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidRecord { ref collection, .. } if collection == "t-form-answers"));
    assert_eq!(err.stage(), "scan");
}

#[test]
fn invalid_answer_after_valid_ones_still_aborts() {
    let bad = json!({ "state_form": 17 }).as_object().unwrap().clone();
    let err = ReconcileService::new(
        MemoryCollection::from_pages("t-state-forms", vec![vec![form("A-1", "u1")]]),
        MemoryCollection::from_pages(
            "t-form-answers",
            vec![vec![answer("A-1")], vec![answer("A-1"), bad], vec![answer("A-1")]],
        ),
    )
    .reconcile()
    .unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidRecord { .. }));
}

#[test]
fn null_creator_reports_as_empty() {
    let mut doc = form("N-1", "ignored");
    doc.insert("created_by".to_string(), serde_json::Value::Null);
    let result = reconcile(vec![doc], Vec::new());
    assert_eq!(result.report.render_all(), "N-1, ");
}

/// Deterministic dataset: every third form unanswered, every fifth id marked,
/// plus a handful of dangling answers. Paged unevenly on both sides.
fn generated_dataset() -> (Vec<Document>, Vec<Document>, BTreeSet<String>) {
    let mut forms = Vec::new();
    let mut answers = Vec::new();
    let mut answered = BTreeSet::new();
    for i in 0..300 {
        let id = if i % 5 == 0 {
            format!("ST-2020-{i:03}-64.ECI")
        } else {
            format!("ST-2021-{i:03}-21E")
        };
        forms.push(form(&id, &format!("user{}", i % 11)));
        if i % 3 != 0 {
            answered.insert(id.clone());
            for _ in 0..(i % 4 + 1) {
                answers.push(answer(&id));
            }
        }
    }
    for i in 0..4 {
        answers.push(answer(&format!("GONE-{i}")));
    }
    (forms, answers, answered)
}

#[test]
fn partition_presence_and_marker_properties_hold() {
    let (forms, answers, answered) = generated_dataset();
    let all_ids: BTreeSet<String> = forms
        .iter()
        .map(|doc| doc["state_form"].as_str().unwrap().to_string())
        .collect();

    let result = ReconcileService::new(
        MemoryCollection::paged("t-state-forms", forms, NonZeroUsize::new(37).unwrap()),
        MemoryCollection::paged("t-form-answers", answers, NonZeroUsize::new(64).unwrap()),
    )
    .reconcile()
    .unwrap();

    let missing: BTreeSet<String> = result.report.all().iter().map(|l| l.id.clone()).collect();
    let filtered: BTreeSet<String> = result
        .report
        .without_marker()
        .iter()
        .map(|l| l.id.clone())
        .collect();

    // Partition completeness and disjointness.
    assert!(missing.is_disjoint(&answered));
    let union: BTreeSet<String> = missing.union(&answered).cloned().collect();
    assert_eq!(union, all_ids);

    // Presence correctness.
    for id in &all_ids {
        assert_eq!(missing.contains(id), !answered.contains(id), "id {id}");
    }

    // Marker filtering and subset relation.
    assert!(filtered.is_subset(&missing));
    for id in &missing {
        assert_eq!(filtered.contains(id), !id.contains("ECI"), "id {id}");
    }

    // Output is sorted by id.
    let ordered: Vec<_> = result.report.all().iter().map(|l| l.id.clone()).collect();
    let mut sorted = ordered.clone();
    sorted.sort();
    assert_eq!(ordered, sorted);

    assert_eq!(result.mark.dangling.occurrences, 4);
    assert_eq!(result.forms.items, 300);
}

#[test]
fn repeated_reconciliation_renders_identical_reports() {
    let (forms, answers, _) = generated_dataset();
    let first = reconcile(forms.clone(), answers.clone());
    let second = ReconcileService::new(
        MemoryCollection::paged("t-state-forms", forms, NonZeroUsize::new(3).unwrap()),
        MemoryCollection::paged("t-form-answers", answers, NonZeroUsize::new(500).unwrap()),
    )
    .reconcile()
    .unwrap();

    assert_eq!(first.report.render_all(), second.report.render_all());
    assert_eq!(
        first.report.render_without_marker(),
        second.report.render_without_marker()
    );
}
