//! Fighter Arena CLI - check strategies and run duels between them
//!
//! - `check` runs the submission pipeline on a file and reports problems
//! - `duel` pits two submissions against each other and prints the results

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use fighter_arena::app::AppState;
use fighter_arena::config::{Config, MatchMode};
use fighter_arena::game::MatchController;
use fighter_arena::protocol::{Language, MatchResults};
use fighter_arena::rules;
use fighter_arena::script::ScriptProgram;

/// Fighter Arena - programmable duel simulator
#[derive(Parser, Debug)]
#[command(name = "fighter-arena")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a strategy file
    Check {
        file: PathBuf,

        /// rules or script (default: from the file extension)
        #[arg(short, long)]
        language: Option<Language>,
    },

    /// Run a match between two strategy files and print the results as JSON
    Duel {
        file_a: PathBuf,
        file_b: PathBuf,

        /// Drive the match with the async runner at the configured tick rate
        #[arg(long)]
        realtime: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    init_tracing(&config.log_level);

    match args.command {
        Commands::Check { file, language } => {
            let language = language.unwrap_or_else(|| infer_language(&file));
            check(&file, language, &config)
        }
        Commands::Duel {
            file_a,
            file_b,
            realtime,
        } => {
            // Duels are between submissions, so they always run scripted
            config.matches.mode = MatchMode::Scripted;
            let sources = [load(&file_a)?, load(&file_b)?];

            let results = if realtime {
                tokio::runtime::Runtime::new()?.block_on(duel_realtime(config, sources))?
            } else {
                duel_stepped(&config, sources)?
            };

            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize tracing/logging; output goes to stderr so stdout stays JSON
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn infer_language(path: &Path) -> Language {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("rhai") => Language::Script,
        _ => Language::Rules,
    }
}

fn load(path: &Path) -> anyhow::Result<(Language, String)> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok((infer_language(path), source))
}

fn check(path: &Path, language: Language, config: &Config) -> anyhow::Result<ExitCode> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let (errors, warnings) = match language {
        Language::Rules => match rules::compile(&source) {
            Ok(compiled) => (Vec::new(), compiled.warnings),
            Err(errors) => (errors, Vec::new()),
        },
        Language::Script => match ScriptProgram::compile(&source, config.matches.script_budget()) {
            Ok(_) => (Vec::new(), Vec::new()),
            Err(report) => (report.messages(), Vec::new()),
        },
    };

    for warning in &warnings {
        eprintln!("warning: {warning}");
    }
    for error in &errors {
        eprintln!("error: {error}");
    }

    if errors.is_empty() {
        println!("{}: ok ({language})", path.display());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}: rejected with {} error(s)", path.display(), errors.len());
        Ok(ExitCode::FAILURE)
    }
}

fn duel_stepped(config: &Config, sources: [(Language, String); 2]) -> anyhow::Result<MatchResults> {
    let participants = [Uuid::new_v4(), Uuid::new_v4()];
    let mut controller =
        MatchController::new(Uuid::new_v4(), participants[0], participants[1], config.matches.clone());

    for (participant, (language, source)) in participants.iter().zip(&sources) {
        let reply = controller.submit_strategy(*participant, *language, source)?;
        if !reply.accepted {
            bail!("strategy rejected: {}", reply.errors.join("; "));
        }
    }

    info!(match_id = %controller.id(), "Running stepped duel");
    Ok(controller.run_to_completion()?)
}

async fn duel_realtime(config: Config, sources: [(Language, String); 2]) -> anyhow::Result<MatchResults> {
    let state = AppState::new(config);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let (handle, task) = state.start_match(a, b);

    for (participant, (language, source)) in [a, b].into_iter().zip(sources) {
        let reply = handle.submit_strategy(participant, language, source).await?;
        if !reply.accepted {
            bail!("strategy rejected: {}", reply.errors.join("; "));
        }
        handle.set_ready(participant).await?;
    }

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let fighter_arena::protocol::MatchEvent::Snapshot(snapshot) = event {
                info!(
                    tick = snapshot.tick,
                    health_a = snapshot.fighter_a.health,
                    health_b = snapshot.fighter_b.health,
                    "Tick"
                );
            }
        }
    });

    Ok(task.await??)
}
