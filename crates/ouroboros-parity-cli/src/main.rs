//! CLI driver: parses a YAML/JSON validation config, loads the two sides'
//! fixture tables into in-memory engines, and runs the validation.

mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ouroboros_parity_core::config::Config;
use ouroboros_parity_core::{MetricRegistry, Run};

#[derive(Parser)]
#[command(name = "ouroboros-parity", version, about = "Dual-engine dataset validation")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug-level tracing output on stderr.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single validation described by a config file against two
    /// in-memory fixture files.
    Validate {
        /// Path to the YAML or JSON validation config.
        #[arg(long)]
        config: PathBuf,

        /// Path to the source side's JSON table fixture.
        #[arg(long)]
        source_fixture: PathBuf,

        /// Path to the target side's JSON table fixture. Defaults to the
        /// source fixture when omitted, for same-engine smoke tests.
        #[arg(long)]
        target_fixture: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    match cli.command {
        Command::Validate {
            config,
            source_fixture,
            target_fixture,
        } => run_validate(config, source_fixture, target_fixture).await,
    }
}

async fn run_validate(config_path: PathBuf, source_fixture: PathBuf, target_fixture: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path)?;

    let source_engine = fixtures::load_engine(&source_fixture)?;
    let (target_engine, same_instance) = match target_fixture {
        Some(path) => (fixtures::load_engine(&path)?, false),
        None => (fixtures::load_engine(&source_fixture)?, true),
    };
    let _ = same_instance; // kept for readability of the same-engine smoke-test path

    let registry = Arc::new(MetricRegistry::new());
    let run = Run::new(
        config,
        registry,
        Arc::new(source_engine),
        Arc::new(target_engine),
        true,
    );

    run.execute().await.context("validation run failed")?;
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing config {} as JSON", path.display()))
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {} as YAML", path.display()))
    }
}
