//! PhiQL command line evaluator
//!
//! Usage: phiql --spec <file> [--rows <file>] [--explain]
//!
//! Exit codes:
//!   0 - Success
//!   2 - Invalid configuration or Phi spec
//!   3 - Evaluation error

use std::io;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use phiql::config::{ConfigError, EvalConfig};
use phiql::executor::{ExecutorEngine, ExecutorError, ResultSink, Schema, TableSink};
use phiql::planner::{Phi, PlannerError};

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate a Phi-operator query over a sales file")]
struct Cli {
    /// Phi spec file
    #[arg(long, env = "PHIQL_SPEC")]
    spec: PathBuf,

    /// Comma-separated sales rows to evaluate against
    #[arg(long, env = "PHIQL_ROWS")]
    rows: Option<PathBuf>,

    /// Print the plan before evaluating
    #[arg(long)]
    explain: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot read spec file {path}: {source}")]
    SpecFile { path: PathBuf, source: io::Error },

    #[error("Invalid spec: {0}")]
    Planner(#[from] PlannerError),

    #[error("No rows file given; pass --rows or set PHIQL_ROWS")]
    MissingRows,

    #[error("Evaluation failed: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Cannot write output: {0}")]
    Output(#[source] io::Error),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_)
            | CliError::SpecFile { .. }
            | CliError::Planner(_)
            | CliError::MissingRows => 2,
            CliError::Executor(_) | CliError::Output(_) => 3,
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = EvalConfig::from_env()?;

    let text = tokio::fs::read_to_string(&cli.spec)
        .await
        .map_err(|source| CliError::SpecFile {
            path: cli.spec.clone(),
            source,
        })?;
    let phi = Phi::build(&text)?;

    tracing::info!(
        spec = %cli.spec.display(),
        grouping_vars = phi.grouping_var_predicates().count(),
        aggregates = phi.aggregates().len(),
        "Built Phi plan"
    );

    if cli.explain {
        print!("{}", phi);
        if cli.rows.is_none() {
            return Ok(());
        }
    }

    let rows = cli.rows.ok_or(CliError::MissingRows)?;
    let engine = ExecutorEngine::new(Schema::sales(), config);
    let result = engine.execute_file(&phi, &rows).await?;

    let mut sink = TableSink::new(io::stdout().lock());
    sink.write_result(&result).map_err(CliError::Output)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("ERROR: {}", e);
        std::process::exit(e.exit_code());
    }
}
