//! Headless pagegrab driver: replay scripted sessions and manage the
//! persisted copy history.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pagegrab::replay::{self, Script};
use pagegrab::Database;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pagegrab", about = "Headless element-grab overlay engine", version)]
struct Cli {
    /// Database directory for history and toolbar placement
    #[arg(long, env = "PAGEGRAB_DB_PATH", global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON session script and print the snapshots it produces
    Replay {
        script: PathBuf,
        /// Print only the final clipboard and history instead of every frame
        #[arg(long)]
        summary: bool,
        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Inspect or clear persisted history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    Clear,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagegrab=warn,pagegrab_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn to_json(value: &impl serde::Serialize, pretty: bool) -> Result<String> {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    encoded.context("failed to encode output")
}

fn run_replay(path: &PathBuf, db: Option<&str>, summary: bool, pretty: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let script: Script = serde_json::from_str(&raw)
        .with_context(|| format!("invalid script {}", path.display()))?;
    let outcome = replay::run(&script, db).context("replay failed")?;

    if summary {
        println!("{}", to_json(&(&outcome.clipboard, &outcome.history), pretty)?);
        return Ok(());
    }
    for frame in &outcome.frames {
        println!("{}", to_json(frame, pretty)?);
    }
    Ok(())
}

fn run_history(action: HistoryAction, db: Option<&str>) -> Result<()> {
    let path = db.context("--db (or PAGEGRAB_DB_PATH) is required for history commands")?;
    let database = Database::new(path).with_context(|| format!("failed to open database at {path}"))?;
    match action {
        HistoryAction::List { limit } => {
            let items = database.history.list(limit).context("failed to list history")?;
            if items.is_empty() {
                println!("No history items.");
            }
            for item in items {
                let kind = item
                    .comment_text
                    .as_deref()
                    .map(|comment| format!("comment {comment:?}"))
                    .unwrap_or_else(|| "copy".to_string());
                println!(
                    "{}  {}  {} ({} element{})  {}",
                    item.id,
                    item.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    item.element_name,
                    item.elements_count,
                    if item.elements_count == 1 { "" } else { "s" },
                    kind
                );
            }
        }
        HistoryAction::Clear => {
            database.history.clear().context("failed to clear history")?;
            tracing::info!(path, "history cleared");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let db = cli.db.as_deref();
    match cli.command {
        Commands::Replay {
            script,
            summary,
            pretty,
        } => run_replay(&script, db, summary, pretty),
        Commands::History { action } => run_history(action, db),
    }
}
