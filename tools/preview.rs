/// Preview — interactive playback shell for testing timelines.
///
/// Usage: preview <path> [--seed <n>] [--auto] [--steps <n>]
///
/// Commands:
///   next            — advance past dialog
///   choose <n>      — pick an offered choice
///   vars            — show variable values
///   history         — show visited nodes
///   save <path>     — save the playthrough
///   load <path>     — restore a saved playthrough
///   help            — list commands
///   quit            — exit

use clap::Parser;
use ham_timeline::core::instance::TimelineInstance;
use ham_timeline::core::timeline::Timeline;
use ham_timeline::schema::event::TimelineEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "preview")]
#[command(about = "Play a HAM timeline in the terminal")]
struct Cli {
    /// Timeline file, binary or .ron
    path: PathBuf,

    /// Seed for random choices in --auto mode
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Play through with random choices instead of reading commands
    #[arg(long)]
    auto: bool,

    /// Maximum advances in --auto mode
    #[arg(long, default_value_t = 200)]
    steps: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut instance = match TimelineInstance::builder().timeline_path(&cli.path).build() {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("ERROR: Failed to load timeline: {}", e);
            std::process::exit(1);
        }
    };

    println!("Playing '{}'", instance.timeline().name());

    if cli.auto {
        auto_play(&mut instance, cli.seed, cli.steps);
    } else {
        println!("Type 'help' for commands.\n");
        shell(&mut instance);
    }
}

fn auto_play(instance: &mut TimelineInstance, seed: u64, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut choice = None;

    for _ in 0..steps {
        let events = match instance.advance_collect(choice.take()) {
            Ok(events) => events,
            Err(e) => {
                println!("ERROR: {}", e);
                return;
            }
        };
        for event in &events {
            print_event(event);
            match event {
                TimelineEvent::Choice { choices } if choices.is_empty() => {
                    println!("(no choices are available)");
                    return;
                }
                TimelineEvent::Choice { choices } => {
                    let pick = rng.gen_range(0..choices.len());
                    choice = choices.keys().nth(pick).copied();
                    if let Some(index) = choice {
                        println!("> chose {}", index);
                    }
                }
                TimelineEvent::TimelineEnds => return,
                _ => {}
            }
        }
    }
    println!("(stopped after {} steps)", steps);
}

fn shell(instance: &mut TimelineInstance) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = parts.first().map(|c| c.to_lowercase()) else {
            continue;
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "next" | "n" => advance(instance, None),
            "choose" | "c" => match parts.get(1).and_then(|n| n.parse::<usize>().ok()) {
                Some(index) => advance(instance, Some(index)),
                None => println!("Usage: choose <n>"),
            },
            "vars" => print_variables(instance),
            "history" => {
                let timeline = instance.timeline();
                for id in instance.history() {
                    match timeline.node(*id) {
                        Some(node) => println!("  {}", node.describe()),
                        None => println!("  {} (missing)", id),
                    }
                }
            }
            "save" => match parts.get(1) {
                Some(path) => match instance.save(Path::new(path)) {
                    Ok(()) => println!("Saved to {}", path),
                    Err(e) => println!("ERROR: {}", e),
                },
                None => println!("Usage: save <path>"),
            },
            "load" => match parts.get(1) {
                Some(path) => match TimelineInstance::restore(Path::new(path)) {
                    Ok(restored) => {
                        *instance = restored;
                        println!("Restored '{}' from {}", instance.timeline().name(), path);
                    }
                    Err(e) => println!("ERROR: {}", e),
                },
                None => println!("Usage: load <path>"),
            },
            _ => println!("Unknown command: {}. Type 'help' for commands.", cmd),
        }
    }
}

fn advance(instance: &mut TimelineInstance, choice: Option<usize>) {
    let mut print = |event: &TimelineEvent| print_event(event);
    if let Err(e) = instance.advance(choice, &mut print) {
        println!("ERROR: {}", e);
    }
}

fn print_event(event: &TimelineEvent) {
    match event {
        TimelineEvent::SceneChanges { scene } => println!("\n== {} ==", scene.name),
        TimelineEvent::CharacterEnters { character } => println!("  [{} enters]", character.name),
        TimelineEvent::CharacterLeaves { character } => println!("  [{} leaves]", character.name),
        TimelineEvent::Dialog { speaker, text } => println!("{}: {}", speaker.name, text),
        TimelineEvent::Choice { choices } => {
            for (index, choice) in choices {
                if choice.is_quoted_dialog {
                    println!("  {}) \"{}\"", index, choice.text);
                } else {
                    println!("  {}) {}", index, choice.text);
                }
            }
        }
        TimelineEvent::TimelineEnds => println!("\n-- The End --"),
    }
}

fn print_variables(instance: &TimelineInstance) {
    let timeline: &Timeline = instance.timeline();
    for (id, value) in instance.variables().sorted() {
        let name = timeline.variable(id).map_or("?", |v| v.name.as_str());
        println!("  {} = {}", name, value);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  next            advance past dialog");
    println!("  choose <n>      pick an offered choice");
    println!("  vars            show variable values");
    println!("  history         show visited nodes");
    println!("  save <path>     save the playthrough");
    println!("  load <path>     restore a saved playthrough");
    println!("  quit            exit");
}
