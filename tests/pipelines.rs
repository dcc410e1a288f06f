use std::sync::Arc;

use mineset::action::{Action, ActionKind, ActionRegistry, ActionSpec};
use mineset::batch::{Batch, BatchCollection, IdSource, Selection};
use mineset::construct::Uid;
use mineset::record::{Comparison, FieldKey, FieldTest, Record};
use mineset::track::{Outcome, TrackOp};
use mineset::MinesetError;

fn grouped(groups: &[&str]) -> BatchCollection<Record> {
    let mut batch = BatchCollection::new();
    for (uid, group) in groups.iter().enumerate() {
        batch.add_item(Record::new(uid as Uid).with("group", *group), None, None);
    }
    batch
}

fn same_group() -> Arc<FieldTest> {
    Arc::new(FieldTest::against_other("group", Comparison::Eq, "group"))
}

#[test]
fn cut_ten_keeps_three() {
    let mut batch = grouped(&["g"; 10]);
    let ids: Vec<Uid> = (0..10).collect();
    let kept = batch.cut_ids(ids.clone(), &Action::<Record>::new(ActionKind::Cut).max(3)).expect("cut");
    assert_eq!(kept.len(), 3);
    let track = batch.tracks().all().last().expect("cut track").clone();
    assert_eq!(track.op, TrackOp::Cut);
    assert_eq!(track.targets.len(), 7);
    let rebuilt: Vec<Uid> = kept.iter().chain(track.targets.iter()).copied().collect();
    assert_eq!(rebuilt, ids, "kept and trimmed sides cover the input");
}

#[test]
fn filter_last_counts_matching_predecessors() {
    let action = Action::<Record>::new(ActionKind::FilterLast).max(1).block("same", same_group());

    let mut batch = grouped(&["x", "x", "y", "x"]);
    assert!(batch.filter_last(&[0, 1, 2, 3], &action).expect("filter"));
    let track = batch.tracks().all().last().expect("filter track");
    assert_eq!(track.sources, vec![0, 1]);
    assert_eq!(track.targets, vec![3]);
    assert_eq!(track.rationales.len(), 2);

    let mut batch = grouped(&["x", "z", "y", "x"]);
    assert!(!batch.filter_last(&[0, 1, 2, 3], &action).expect("filter"));
    assert!(batch.tracks().is_empty());
}

#[test]
fn filter_pairs_and_to_first() {
    let mut batch = grouped(&["x", "y", "x", "x"]);
    let pairs = Action::<Record>::new(ActionKind::FilterPairs).block("same", same_group());
    assert_eq!(batch.filter_pairs(vec![0, 1, 2, 3], &pairs, None).expect("pairs"), vec![0, 1]);

    let mut batch = grouped(&["x", "x", "y", "x"]);
    let first = Action::<Record>::new(ActionKind::FilterToFirst).block("same", same_group());
    assert_eq!(batch.filter_to_first(vec![0, 1, 2, 3], &first).expect("to first"), vec![0, 2]);
    assert_eq!(batch.tracks().len(), 2);
    assert!(batch.tracks().all().iter().all(|t| t.outcome == Outcome::Passed(true)));
}

fn scored_registry() -> (BatchCollection<Record>, ActionRegistry<Record>) {
    let mut batch = BatchCollection::new();
    for (uid, score) in [3, 9, 7, 8, 1].into_iter().enumerate() {
        batch.add_item(Record::new(uid as Uid).with("score", score), None, None);
    }
    let mut registry: ActionRegistry<Record> = ActionRegistry::new();
    registry.register_predicate("high", Arc::new(FieldTest::against_value("score", Comparison::Ge, 5)));
    registry.register_predicate("score", Arc::new(FieldKey::new("score")));
    (batch, registry)
}

fn top_two() -> Vec<ActionSpec> {
    serde_json::from_str(
        r#"[
            {"action": "filterSingle", "blocks": ["high"]},
            {"action": "sort", "blocks": ["score"], "reverse": true},
            {"action": "cut", "max": 2}
        ]"#,
    )
    .expect("valid specs")
}

#[test]
fn declarative_pipeline() {
    let (mut batch, registry) = scored_registry();
    let actions = registry.compile_all(&top_two()).expect("compiles");
    let ids = batch.do_actions(&actions, &IdSource::All, None, false, None).expect("runs");
    assert_eq!(ids, vec![1, 3]);
    let rest = batch.do_actions(&actions, &IdSource::All, None, true, None).expect("runs");
    assert_eq!(rest, vec![0, 2, 4]);
}

#[test]
fn selection_with_new_ids() {
    let (mut batch, registry) = scored_registry();
    let actions = registry.compile_all(&top_two()).expect("compiles");
    let target = batch.new_list(Some("best".into()));
    let selection = Selection {
        source: IdSource::Ids(vec![0, 1, 2]),
        new_ids: Some(IdSource::Ids(vec![3, 4])),
        target: Some(target),
        new_only: true,
        ..Selection::default()
    };
    let ids = batch.selected(&actions, &selection).expect("runs");
    assert_eq!(ids, vec![3]);
    assert_eq!(batch.iids_of(target), vec![3]);
}

#[test]
fn unknown_action_is_fatal() {
    let (_, registry) = scored_registry();
    let mut specs = top_two();
    specs.push(ActionSpec::new("shuffle"));
    match registry.compile_all(&specs) {
        Err(MinesetError::UnknownAction(name)) => assert_eq!(name, "shuffle"),
        other => panic!("expected an unknown action error, got {:?}", other),
    }
}
