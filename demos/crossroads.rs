/// Crossroads example — authors a small timeline in code, then plays it.
///
/// A traveler at a fork: a toll gate to the north, a shrine with loose
/// coins to the south. The same story ships as `timelines/crossroads.ron`.
///
/// Run with: cargo run --example crossroads

use ham_timeline::core::instance::TimelineInstance;
use ham_timeline::core::timeline::Timeline;
use ham_timeline::schema::event::TimelineEvent;
use ham_timeline::schema::node::{Decision, NodeKind, NodeType, Operation, Predicate};
use ham_timeline::schema::value::{Comparison, VariableValue};
use std::sync::Arc;

fn main() {
    // --- Cast and state ---
    let mut timeline = Timeline::with_defaults("Crossroads");
    let narrator = timeline.narrator().expect("default narrator");
    let road = timeline.default_scene().expect("default scene");
    let intro = timeline.origin().expect("default origin");
    let gate = timeline.add_scene("Gate");
    let traveler = timeline.add_character("Traveler");
    let guard = timeline.add_character("Guard");
    let gold = timeline.add_variable("gold", VariableValue::Integer(2));

    if let Some(node) = timeline.node_mut(intro) {
        if let NodeKind::Dialog(dialog) = &mut node.kind {
            dialog.text = "A traveler reaches a fork in the road.".to_string();
            dialog.characters = vec![traveler];
        }
    }

    // --- Nodes ---
    let fork = timeline.add_decision_node();
    timeline
        .add_decision(fork, Decision::new("Take the north road", false))
        .expect("fork is a decision node");
    timeline
        .add_decision(fork, Decision::new("Take the south road", false))
        .expect("fork is a decision node");

    let halt = timeline.add_dialog_node(
        gate,
        guard,
        "Halt. The gate costs three gold.",
        vec![traveler, guard],
    );
    let toll = timeline.add_branch_node();
    let can_pay = Predicate::new(gold, Comparison::GreaterThanEqual, VariableValue::Integer(3));
    timeline
        .add_branch_arm(toll, can_pay)
        .expect("toll is a branch node");
    let pay = timeline.add_consequence_node();
    timeline
        .add_operation(pay, Operation::modify(gold, VariableValue::Integer(-3)))
        .expect("pay is a consequence node");
    let open = timeline.add_dialog_node(gate, narrator, "The gate swings open.", vec![traveler]);
    let refuse =
        timeline.add_dialog_node(gate, guard, "No coin, no passage.", vec![traveler, guard]);

    let shrine = timeline.add_dialog_node(
        road,
        narrator,
        "The south road winds past a ruined shrine.",
        vec![traveler],
    );
    let pocket = timeline.add_consequence_node();
    timeline
        .add_operation(pocket, Operation::modify(gold, VariableValue::Integer(2)))
        .expect("pocket is a consequence node");
    let back = timeline.add_dialog_node(
        road,
        traveler,
        "Two coins. Nobody will miss them.",
        vec![traveler],
    );

    // --- Edges: (parent, child, slot) ---
    let edges = [
        (intro, fork, 0),
        (fork, halt, 0),
        (fork, shrine, 1),
        (halt, toll, 0),
        (toll, pay, 0),
        (toll, refuse, 1),
        (pay, open, 0),
        (refuse, fork, 0),
        (shrine, pocket, 0),
        (pocket, back, 0),
        (back, fork, 0),
    ];
    for (parent, child, slot) in edges {
        timeline.link_nodes(parent, child, slot).expect("edge keeps the graph sound");
    }

    let report = timeline.check_integrity();
    println!("'{}': {} nodes, integrity: {}", timeline.name(), timeline.node_count(), report);

    // --- Play: north, south, north again ---
    let mut instance = TimelineInstance::new(Arc::new(timeline));
    let mut print = |event: &TimelineEvent| match event {
        TimelineEvent::SceneChanges { scene } => println!("\n== {} ==", scene.name),
        TimelineEvent::CharacterEnters { character } => println!("  [{} enters]", character.name),
        TimelineEvent::CharacterLeaves { character } => println!("  [{} leaves]", character.name),
        TimelineEvent::Dialog { speaker, text } => println!("{}: {}", speaker.name, text),
        TimelineEvent::Choice { choices } => {
            for (index, choice) in choices {
                println!("  {}) {}", index, choice.text);
            }
        }
        TimelineEvent::TimelineEnds => println!("\n-- The End --"),
    };

    let mut picks = [0, 1, 0].into_iter();
    while !instance.is_finished() {
        let waiting = instance
            .current_node()
            .and_then(|id| instance.timeline().node(id))
            .is_some_and(|node| node.node_type() == NodeType::Decision);
        let choice = if waiting { picks.next() } else { None };
        if let Some(index) = choice {
            println!("> {}", index);
        }
        instance.advance(choice, &mut print).expect("playback failed");
    }

    let left = instance.variable(gold).map_or("?".to_string(), ToString::to_string);
    println!("\nGold left: {}", left);
}
