use std::io::{self, BufRead, Write};
use std::rc::Rc;

use anyhow::{Context, Result};
use arena::Observation;
use clap::{Parser, Subcommand};
use tracing::info;

use review_agents::{
    build_backend, run_accept, run_paper_decision, run_paper_review, BackendConfig, HumanInput,
    NoHumans, RunArgs,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Review every paper: reviews, rebuttals, discussion and metareview
    Review(RunArgs),
    /// Area chairs decide papers in batches using the stored metareviews
    Decide(RunArgs),
    /// Compute accepted papers from the stored decisions
    Accept(RunArgs),
}

/// Reads human actions from stdin. An action ends at a line holding a single `.`.
struct TerminalInput;

impl HumanInput for TerminalInput {
    fn prompt(&mut self, observation: &Observation) -> Result<String> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "\n=== {} | phase {} ({}) ===",
            observation.participant.id, observation.phase_index, observation.phase_name
        )?;
        for message in &observation.messages {
            writeln!(out, "{}", message.render())?;
        }
        writeln!(out, "\nYour action (end with a line containing only '.'):")?;
        out.flush()?;

        let mut lines = Vec::new();
        for line in io::stdin().lock().lines() {
            let line = line.context("failed to read from stdin")?;
            if line.trim() == "." {
                break;
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }
}

fn human_input(args: &RunArgs) -> Box<dyn HumanInput> {
    if args.humans.is_empty() {
        Box::new(NoHumans)
    } else {
        Box::new(TerminalInput)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Review(args) => {
            let backend = BackendConfig::from_env(args.backend, &args.model_name)?;
            let backend = build_backend(&backend)?;
            info!(backend = backend.name(), experiment = %args.experiment_name, "paper review");
            let mut human = human_input(&args);
            let report = run_paper_review(&args, Rc::from(backend), human.as_mut())?;
            info!(
                reviewed = report.reviewed.len(),
                skipped = report.skipped.len(),
                resumed = report.resumed.len(),
                "paper review finished"
            );
        }
        Command::Decide(args) => {
            let backend = BackendConfig::from_env(args.backend, &args.model_name)?;
            let backend = build_backend(&backend)?;
            info!(backend = backend.name(), experiment = %args.experiment_name, "paper decision");
            let mut human = human_input(&args);
            let report = run_paper_decision(&args, Rc::from(backend), human.as_mut())?;
            info!(
                batches = report.batches,
                excluded = report.excluded.len(),
                stored_batches = report.stored_batches,
                "paper decision finished"
            );
        }
        Command::Accept(args) => {
            let report = run_accept(&args)?;
            let ids: Vec<String> = report.accepted.iter().map(|id| id.to_string()).collect();
            info!(
                total = report.total,
                accepted = report.accepted.len(),
                "acceptance finished"
            );
            println!("{}", ids.join("\n"));
        }
    }
    Ok(())
}
