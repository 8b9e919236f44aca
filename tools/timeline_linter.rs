/// Timeline Linter — checks a timeline for structural defects and authoring
/// mistakes.
///
/// Usage: timeline_linter <path.ham|path.ron> [--strict]

use clap::Parser;
use ham_timeline::core::document::load_timeline;
use ham_timeline::core::timeline::Timeline;
use ham_timeline::schema::ids::VariableId;
use ham_timeline::schema::node::{NodeKind, Operation, Predicate, TimelineNode};
use ham_timeline::schema::value::VariableValue;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "timeline_linter")]
#[command(about = "Check a HAM timeline for defects")]
#[command(version)]
struct Cli {
    /// Timeline file, binary or .ron
    path: PathBuf,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let timeline = match load_timeline(&cli.path) {
        Ok(timeline) => timeline,
        Err(e) => {
            eprintln!("ERROR: Failed to load timeline: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded '{}': {} nodes, {} scenes, {} characters, {} variables",
        timeline.name(),
        timeline.node_count(),
        timeline.scenes().len(),
        timeline.characters().len(),
        timeline.variables().len()
    );

    let (errors, warnings) = lint_timeline(&timeline);

    println!("\n=== Timeline Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() && !(cli.strict && !warnings.is_empty()) {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn lint_timeline(timeline: &Timeline) -> (Vec<String>, Vec<String>) {
    let mut errors: Vec<String> = timeline
        .check_integrity()
        .violations
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut warnings = Vec::new();

    if timeline.narrator().is_none() {
        warnings.push("Timeline has no narrator".to_string());
    }

    for node in timeline.nodes() {
        let label = node.describe();
        match &node.kind {
            NodeKind::Dialog(dialog) => {
                if timeline.scene(dialog.scene).is_none() {
                    warnings.push(format!("{}: unknown {}", label, dialog.scene));
                }
                if timeline.character(dialog.speaker).is_none() {
                    warnings.push(format!("{}: unknown speaker {}", label, dialog.speaker));
                }
                for character in &dialog.characters {
                    if timeline.character(*character).is_none() {
                        warnings.push(format!("{}: unknown {} on stage", label, character));
                    }
                }
            }
            NodeKind::Branch(branch) => {
                for (slot, arm) in branch.arms.iter().enumerate() {
                    check_predicate(
                        timeline,
                        &arm.predicate,
                        &format!("{} arm {}", label, slot),
                        &mut errors,
                        &mut warnings,
                    );
                }
            }
            NodeKind::Decision(decision) => {
                if decision.decisions.is_empty() {
                    warnings.push(format!("{}: offers no choices", label));
                }
                for (slot, choice) in decision.decisions.iter().enumerate() {
                    for predicate in &choice.predicates {
                        check_predicate(
                            timeline,
                            predicate,
                            &format!("{} choice {}", label, slot),
                            &mut errors,
                            &mut warnings,
                        );
                    }
                }
            }
            NodeKind::Consequence(consequence) => {
                for operation in &consequence.operations {
                    check_operation(timeline, operation, &label, &mut errors, &mut warnings);
                }
            }
        }

        if is_dead_end(node) {
            warnings.push(format!("{}: control node has no way out", label));
        }
    }

    (errors, warnings)
}

fn is_dead_end(node: &TimelineNode) -> bool {
    matches!(node.kind, NodeKind::Branch(_) | NodeKind::Consequence(_))
        && node.children().is_empty()
}

fn check_declared(
    timeline: &Timeline,
    variable: VariableId,
    value: &VariableValue,
    context: &str,
    errors: &mut Vec<String>,
) {
    match timeline.variable(variable) {
        None => errors.push(format!("{}: unknown {}", context, variable)),
        Some(declared) if declared.variable_type() != value.variable_type() => errors.push(format!(
            "{}: '{}' is {} but is used with {} {}",
            context,
            declared.name,
            declared.variable_type(),
            value.variable_type(),
            value
        )),
        Some(_) => {}
    }
}

fn check_predicate(
    timeline: &Timeline,
    predicate: &Predicate,
    context: &str,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    match predicate.variable {
        None => warnings.push(format!("{}: predicate has no variable", context)),
        Some(variable) => check_declared(timeline, variable, &predicate.value, context, errors),
    }
}

fn check_operation(
    timeline: &Timeline,
    operation: &Operation,
    context: &str,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    match operation.variable {
        None => warnings.push(format!("{}: operation has no variable", context)),
        Some(variable) => check_declared(timeline, variable, &operation.operand, context, errors),
    }
}
