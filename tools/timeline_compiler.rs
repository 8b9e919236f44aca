//! timeline_compiler - converts timelines between RON source and the binary
//! format read by the player.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ham_timeline::core::document::TimelineDocument;
use ham_timeline::core::timeline::Timeline;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "timeline_compiler")]
#[command(about = "Convert HAM timelines between RON and binary")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile RON source to a binary timeline
    Compile {
        /// Input .ron file
        input: PathBuf,

        /// Output binary file
        output: PathBuf,

        /// Fail if the timeline has structural defects
        #[arg(long)]
        check: bool,
    },

    /// Decompile a binary timeline to RON source
    Decompile {
        /// Input binary file
        input: PathBuf,

        /// Output .ron file
        output: PathBuf,
    },

    /// Write a new timeline with a narrator, a scene and an intro line
    New {
        /// Output file; .ron writes source, anything else binary
        output: PathBuf,

        /// Timeline name
        #[arg(short, long, default_value = "Untitled")]
        name: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            check,
        } => {
            let timeline = TimelineDocument::load_from_ron(&input)
                .and_then(TimelineDocument::into_timeline)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let report = timeline.check_integrity();
            if !report.is_clean() {
                if check {
                    anyhow::bail!("{} has structural defects: {}", input.display(), report);
                }
                tracing::warn!("{}: {}", input.display(), report);
            }
            timeline
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Compiled {} -> {} ({} nodes)",
                input.display(),
                output.display(),
                timeline.node_count()
            );
        }
        Commands::Decompile { input, output } => {
            let timeline = Timeline::load(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            TimelineDocument::from_timeline(&timeline)
                .save_ron(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Decompiled {} -> {}", input.display(), output.display());
        }
        Commands::New { output, name } => {
            let timeline = Timeline::with_defaults(name);
            write_any(&timeline, &output)?;
            println!("Created '{}' at {}", timeline.name(), output.display());
        }
    }

    Ok(())
}

fn write_any(timeline: &Timeline, path: &Path) -> Result<()> {
    if path.extension().and_then(|ext| ext.to_str()) == Some("ron") {
        TimelineDocument::from_timeline(timeline).save_ron(path)?;
    } else {
        timeline.save(path)?;
    }
    Ok(())
}
