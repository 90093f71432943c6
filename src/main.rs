//! credence CLI: verify sources and ingest claims.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use credence::config::Config;
use credence::integrator::{Claim, KnowledgeIntegrator};
use credence::source::{SourceVerifier, extract_publish_date};

#[derive(Parser)]
#[command(name = "credence", version, about = "Source-verified fact ingestion")]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score the credibility and bias of one source.
    Verify {
        /// Source URL.
        url: String,

        /// File holding the source text.
        #[arg(long)]
        text_file: Option<PathBuf>,

        /// Publish date (YYYY-MM-DD).
        #[arg(long)]
        publish_date: Option<NaiveDate>,
    },

    /// Ingest claims from a JSON file and print outcomes and subject summaries.
    Ingest {
        /// Path to a JSON array of claims.
        #[arg(long)]
        file: PathBuf,
    },

    /// Extract a publish date from free text.
    ExtractDate {
        /// Text to scan.
        text: String,
    },

    /// Re-ingest claims from a JSON file on every scheduler tick.
    #[cfg(feature = "daemon")]
    Daemon {
        /// Path to a JSON array of claims.
        #[arg(long)]
        file: PathBuf,

        /// Stop after this many cycles (0 = run until Ctrl+C).
        #[arg(long, default_value = "0")]
        max_cycles: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::default()),
    }
}

fn load_claims(path: &PathBuf) -> Result<Vec<Claim>> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    serde_json::from_str(&content).into_diagnostic()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Verify {
            url,
            text_file,
            publish_date,
        } => {
            let text = match text_file {
                Some(path) => Some(std::fs::read_to_string(path).into_diagnostic()?),
                None => None,
            };
            let verifier = SourceVerifier::new(config.verifier);
            let result = verifier.verify(&url, text.as_deref(), publish_date);
            print_json(&result)?;
        }

        Commands::Ingest { file } => {
            let claims = load_claims(&file)?;
            let integrator = KnowledgeIntegrator::new(config);

            let outcomes: Vec<_> = claims.iter().map(|c| integrator.ingest(c)).collect();
            let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
            tracing::info!(
                claims = claims.len(),
                accepted,
                rejected = claims.len() - accepted,
                "ingestion complete"
            );

            let summaries: BTreeMap<String, _> = integrator
                .subjects()
                .into_iter()
                .filter_map(|s| integrator.subject_summary(&s).map(|r| (s, r)))
                .collect();
            print_json(&serde_json::json!({
                "outcomes": outcomes,
                "summaries": summaries,
                "graph": integrator.graph().stats(),
            }))?;
        }

        Commands::ExtractDate { text } => match extract_publish_date(&text) {
            Some(date) => println!("{date}"),
            None => println!("no date found"),
        },

        #[cfg(feature = "daemon")]
        Commands::Daemon { file, max_cycles } => {
            use std::sync::Arc;

            use credence::daemon::{IngestDaemon, ingest_trigger};
            use credence::trigger::{TriggerContext, TriggerManager};

            let claims = load_claims(&file)?;
            let cooldown = config.triggers.tick_interval_secs;
            let integrator = Arc::new(KnowledgeIntegrator::new(config.clone()));

            let mut triggers = TriggerManager::new(config.triggers);
            triggers.register(ingest_trigger("ingest", Arc::clone(&integrator), claims, cooldown))?;

            let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
            let mut daemon = IngestDaemon::new(triggers).with_max_cycles(max_cycles);
            runtime.block_on(daemon.run(TriggerContext::new));

            let subjects = integrator.subjects();
            println!("{} subjects, {} graph nodes", subjects.len(), integrator.graph().node_count());
        }
    }

    Ok(())
}
