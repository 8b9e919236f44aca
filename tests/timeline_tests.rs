/// Timeline integration tests — loading, storage and editing of authored timelines.

use ham_timeline::core::document::{load_timeline, TimelineDocument};
use ham_timeline::core::integrity::Violation;
use ham_timeline::core::placement::NodePlacer;
use ham_timeline::core::timeline::{IntegrityPolicy, Timeline, TimelineError};
use ham_timeline::schema::ids::NodeId;
use ham_timeline::schema::node::{Decision, NodeKind, NodeType, Predicate};
use ham_timeline::schema::value::{Comparison, VariableValue};
use std::path::Path;

fn crossroads() -> Timeline {
    load_timeline(Path::new("timelines/crossroads.ron")).unwrap()
}

#[test]
fn crossroads_loads_clean() {
    let timeline = crossroads();

    assert_eq!(timeline.name(), "Crossroads");
    assert_eq!(timeline.node_count(), 12);
    assert_eq!(timeline.characters().len(), 3);
    assert_eq!(timeline.origin(), Some(NodeId(10)));
    assert!(timeline.check_integrity().is_clean());

    // Ids continue after the largest one in use.
    assert_eq!(timeline.id_count(), 51);

    // The decision node is reached from the intro and from two loops back.
    let decision = timeline.node(NodeId(11)).unwrap();
    assert_eq!(decision.node_type(), NodeType::Decision);
    assert_eq!(decision.previous, vec![NodeId(10), NodeId(16), NodeId(22)]);
}

#[test]
fn binary_file_round_trip() {
    let timeline = crossroads();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crossroads.ham");

    timeline.save(&path).unwrap();
    let loaded = Timeline::load(&path).unwrap();
    assert_eq!(loaded, timeline);

    // Without a .ron extension the binary loader is used.
    let dispatched = load_timeline(&path).unwrap();
    assert_eq!(dispatched, timeline);
}

#[test]
fn decompiled_source_matches_binary() {
    let timeline = crossroads();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crossroads.ron");

    TimelineDocument::from_timeline(&timeline).save_ron(&path).unwrap();
    let reloaded = load_timeline(&path).unwrap();
    assert_eq!(reloaded.to_bytes(), timeline.to_bytes());
}

#[test]
fn truncated_file_is_rejected() {
    let bytes = crossroads().to_bytes();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ham");
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(Timeline::load(&path), Err(TimelineError::Pack(_))));
}

#[test]
fn deleting_the_gate_removes_everything_only_it_reaches() {
    let mut timeline = crossroads();

    let removed = timeline.delete_tree(NodeId(12)).unwrap();
    assert_eq!(
        removed,
        vec![NodeId(12), NodeId(13), NodeId(14), NodeId(16), NodeId(15), NodeId(40)]
    );
    assert_eq!(timeline.node_count(), 6);
    assert!(timeline.check_integrity().is_clean());

    // The decision that led north now leads nowhere; its other parents stay.
    let decision = timeline.node(NodeId(11)).unwrap();
    assert_eq!(decision.edge(0), None);
    assert_eq!(decision.previous, vec![NodeId(10), NodeId(22)]);
}

#[test]
fn deleting_the_origin_tree_is_refused() {
    let mut timeline = crossroads();
    let before = timeline.clone();

    assert!(!timeline.can_delete_tree(NodeId(10)));
    match timeline.delete_tree(NodeId(10)) {
        Err(TimelineError::StructuralIntegrityViolation(report)) => {
            assert!(report
                .violations
                .contains(&Violation::MissingOrigin(Some(NodeId(10)))));
        }
        other => panic!("expected a rejected edit, got {:?}", other),
    }
    assert_eq!(timeline, before);
}

#[test]
fn logging_policy_keeps_a_defective_edit() {
    let mut timeline = crossroads().with_policy(IntegrityPolicy::Log);

    let removed = timeline.delete_tree(NodeId(10)).unwrap();
    assert!(removed.contains(&NodeId(10)));
    assert!(!timeline.check_integrity().is_clean());
}

#[test]
fn authoring_a_guarded_choice() {
    let mut timeline = Timeline::with_defaults("Tavern");
    let origin = timeline.origin().unwrap();
    let scene = timeline.default_scene().unwrap();
    let narrator = timeline.narrator().unwrap();
    let keeper = timeline.add_character("Keeper");
    let coins = timeline.add_variable("coins", VariableValue::Integer(0));

    let menu = timeline.add_decision_node();
    let drink = timeline.add_dialog_node(scene, keeper, "Here you go.", vec![keeper]);
    let leave = timeline.add_dialog_node(scene, narrator, "You leave.", Vec::new());
    let paid = Decision::new("Buy a drink", false).with_predicate(Predicate::new(
        coins,
        Comparison::GreaterThan,
        VariableValue::Integer(0),
    ));
    assert_eq!(timeline.add_decision(menu, paid).unwrap(), 0);
    assert_eq!(timeline.add_decision(menu, Decision::new("Leave", false)).unwrap(), 1);

    timeline.link_nodes(origin, menu, 0).unwrap();
    timeline.link_nodes(menu, drink, 0).unwrap();
    timeline.link_nodes(menu, leave, 1).unwrap();
    assert!(timeline.check_integrity().is_clean());
    assert!(timeline.is_linkage_dirty());

    let (last, dialog) = timeline.get_last_dialog_node(menu).unwrap().unwrap();
    assert_eq!(last, origin);
    assert_eq!(dialog.text, "Default Intro Narration");

    let NodeKind::Decision(decision) = &timeline.node(menu).unwrap().kind else {
        panic!("menu is not a decision node");
    };
    let predicate = &decision.decisions[0].predicates[0];
    assert!(!timeline.evaluate_predicate(predicate, &VariableValue::Integer(0)).unwrap());
    assert!(timeline.evaluate_predicate(predicate, &VariableValue::Integer(2)).unwrap());
    assert!(matches!(
        timeline.evaluate_predicate(predicate, &VariableValue::Boolean(true)),
        Err(TimelineError::Value(_))
    ));
}

#[test]
fn crossroads_layout() {
    let timeline = crossroads();
    let places = NodePlacer::default().place(&timeline);

    assert_eq!(places.len(), timeline.node_count());
    assert_eq!(places[&NodeId(10)].offset, 0.0);
    assert_eq!(places[&NodeId(11)].depth, 1);

    // North, south and home sit side by side under the decision.
    assert_eq!(places[&NodeId(12)].offset, -1.0);
    assert_eq!(places[&NodeId(20)].offset, 0.5);
    assert_eq!(places[&NodeId(50)].offset, 1.5);
    assert_eq!(places[&NodeId(40)].depth, 6);
}
