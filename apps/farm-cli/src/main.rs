//! # farm
//!
//! Command-line front end for farm activity planning.
//!
//! - `farm activity create/list/show/update/progress/cancel/compare/history/ack/delete`
//! - `farm goal add/record/remove` — quantifiable targets on an activity
//! - `farm labor record` — progress nudge from a saved labor record
//! - `farm stats` — fleet-wide summary
//!
//! State lives under `<project>/.farm/`. Logs go to stderr; set `RUST_LOG`
//! to change the level.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Plan farm activities and track them against real execution.
#[derive(Parser)]
#[command(name = "farm", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and track activities.
    Activity {
        #[command(subcommand)]
        command: commands::activity::ActivityCommands,
    },
    /// Manage an activity's goals.
    Goal {
        #[command(subcommand)]
        command: commands::goal::GoalCommands,
    },
    /// Labor record notifications.
    Labor {
        #[command(subcommand)]
        command: commands::labor::LaborCommands,
    },
    /// Summary statistics over every activity.
    Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("farm_planning=info".parse()?)
                .add_directive("farm=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let ctx = commands::Context::open(&project_root, cli.json)?;

    match &cli.command {
        Commands::Activity { command } => commands::activity::execute(command, &ctx),
        Commands::Goal { command } => commands::goal::execute(command, &ctx),
        Commands::Labor { command } => commands::labor::execute(command, &ctx),
        Commands::Stats => commands::stats::execute(&ctx),
    }
}
