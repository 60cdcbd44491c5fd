//! Binary entry point for chatlevels.
//!
//! Hosts the leveling stage over newline-delimited JSON: chat messages come
//! in on stdin, annotated messages and level-up notifications go out on
//! stdout.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stdout/print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]

use anyhow::{Context, Result};
use chatlevels::config::LevelsConfig;
use chatlevels::hooks::{HostContext, LevelsHook, PipelineStage};
use chatlevels::models::ChatMessage;
use chatlevels::observability::{self, LoggingConfig};
use chatlevels::storage::{ExperienceStore, SqliteExperienceStore};
use chatlevels::LevelCatalog;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Chatlevels - experience and levels for chat communities.
#[derive(Parser)]
#[command(name = "chatlevels")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "CHATLEVELS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Score JSON chat messages read line by line from stdin.
    Run {
        /// Chat style directory containing levels.xml.
        #[arg(short, long)]
        style: PathBuf,
    },

    /// Print the level ladder for the configured progression model.
    Levels {
        /// Chat style directory containing levels.xml.
        #[arg(short, long)]
        style: PathBuf,
    },

    /// Show stored experience.
    Show {
        /// Only this user.
        user: Option<String>,

        /// Chat style directory, to also print level names.
        #[arg(short, long)]
        style: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(Some(&config.logging), cli.verbose);
    if let Err(e) = observability::init(logging) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    let result = match cli.command {
        Commands::Run { style } => cmd_run(&config, style).await,
        Commands::Levels { style } => cmd_levels(&config, &style),
        Commands::Show { user, style } => cmd_show(&config, user.as_deref(), style.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<LevelsConfig> {
    match path {
        Some(path) => LevelsConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(LevelsConfig::load_default()),
    }
}

async fn cmd_run(config: &LevelsConfig, style: PathBuf) -> Result<()> {
    if let Some(parent) = config.store_path().parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating store directory {}", parent.display()))?;
    }

    let host = HostContext::new().with_webchat(style);
    let hook = Arc::new(LevelsHook::load(config, &host).context("levels module failed to start")?);
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatMessage>();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let message: ChatMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed message");
                continue;
            },
        };

        let stage = Arc::clone(&hook);
        let queue = tx.clone();
        // Store access blocks on SQLite
        let annotated = tokio::task::spawn_blocking(move || stage.process(message, &queue))
            .await
            .context("scoring task panicked")?;

        println!("{}", serde_json::to_string(&annotated)?);
        while let Ok(notification) = rx.try_recv() {
            println!("{}", serde_json::to_string(&notification)?);
        }
    }

    Ok(())
}

fn cmd_levels(config: &LevelsConfig, style: &Path) -> Result<()> {
    let catalog = LevelCatalog::load(
        &LevelCatalog::path_in(style),
        config.experience,
        config.exp_for_level,
    )?;

    println!("Model: {}", catalog.model());
    println!("{:>4}  {:>10}  Name", "Rank", "Experience");
    for level in catalog.levels() {
        println!("{:>4}  {:>10}  {}", level.rank, level.threshold, level.name);
    }

    if !catalog.specials().is_empty() {
        println!();
        println!("Special levels:");
        let mut specials: Vec<_> = catalog.specials().values().collect();
        specials.sort_by(|a, b| a.nick.cmp(&b.nick));
        for special in specials {
            println!("  {}  {}", special.nick, special.name.as_deref().unwrap_or("-"));
        }
    }

    Ok(())
}

fn cmd_show(config: &LevelsConfig, user: Option<&str>, style: Option<&Path>) -> Result<()> {
    let store_path = config.store_path();
    if !store_path.exists() {
        println!("No level store at {}", store_path.display());
        return Ok(());
    }
    let store = SqliteExperienceStore::new(&store_path)?;

    let catalog = style
        .map(|dir| {
            LevelCatalog::load(&LevelCatalog::path_in(dir), config.experience, config.exp_for_level)
        })
        .transpose()?;
    let level_name = |experience: u64| {
        catalog
            .as_ref()
            .and_then(|c| c.level(c.index_for(experience)))
            .map_or_else(String::new, |level| level.name.clone())
    };

    match user {
        Some(user) => {
            let experience = store.get(user)?.unwrap_or(0);
            println!("{user}  {experience}  {}", level_name(experience));
        },
        None => {
            for row in store.list()? {
                println!("{}  {}  {}", row.user, row.experience, level_name(row.experience));
            }
        },
    }

    Ok(())
}
