//! rowform CLI - validate and run formula transformations

mod rows;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rowform::{FormulaTransformation, Row, RowOutcome, TransformationRequest};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rowform")]
#[command(
    author,
    version,
    about = "Validate and run column formula transformations"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a formula configuration and print its overview
    Validate {
        /// Configuration JSON with `settings.expressions` and `columns.input`
        config: PathBuf,
    },

    /// List the catalog columns the formulas of a body reference
    ExtractInput {
        /// JSON with `expressions` and `columns` lists
        body: PathBuf,
    },

    /// Transform rows and print one JSON result per row
    Run {
        /// Transformation request JSON (transformation, stream, batch)
        request: PathBuf,

        /// Input rows, as JSON Lines or CSV with a header row
        rows: PathBuf,

        /// Number of worker threads
        #[arg(short, long, default_value = "1")]
        threads: usize,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::ExtractInput { body } => extract_input(&body),
        Commands::Run {
            request,
            rows,
            threads,
        } => run(&request, &rows, threads),
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("rowform={log_level}"))
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("'{}' is not valid JSON", path.display()))
}

/// Print a configuration error as `{"error": ..}` and fail
fn report(error: rowform::ConfigurationError) -> Result<ExitCode> {
    tracing::info!("Rejected configuration ({} error)", error.kind());
    println!("{}", serde_json::json!({ "error": error.to_string() }));
    Ok(ExitCode::FAILURE)
}

fn validate(path: &Path) -> Result<ExitCode> {
    let data = read_json(path)?;
    match rowform::validate_json(&data) {
        Ok(overview) => {
            print!("{overview}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => report(e),
    }
}

fn extract_input(path: &Path) -> Result<ExitCode> {
    let body = read_json(path)?;
    match rowform::extract_input(&body) {
        Ok(columns) => {
            println!("{}", serde_json::to_string_pretty(&columns)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => report(e),
    }
}

fn run(request_path: &Path, rows_path: &Path, threads: usize) -> Result<ExitCode> {
    let request: TransformationRequest = serde_json::from_value(read_json(request_path)?)
        .with_context(|| format!("'{}' is not a transformation request", request_path.display()))?;
    let rows = rows::read_rows(rows_path, request.input_columns())?;

    let transformation = FormulaTransformation::new(request);
    let outcomes = evaluate_rows(&transformation, &rows, threads.max(1));

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let (mut deleted, mut failed) = (0usize, 0usize);
    for outcome in &outcomes {
        match outcome {
            RowOutcome::Delete => deleted += 1,
            RowOutcome::Fail(_) => failed += 1,
            RowOutcome::Done(_) => {}
        }
        writeln!(out, "{}", outcome.to_json())?;
    }
    out.flush()?;

    eprintln!(
        "Transformed {} rows ({} deleted, {} failed)",
        outcomes.len(),
        deleted,
        failed
    );
    Ok(ExitCode::SUCCESS)
}

/// Evaluate `rows` on up to `threads` scoped threads, keeping input order
fn evaluate_rows(
    transformation: &FormulaTransformation,
    rows: &[Row],
    threads: usize,
) -> Vec<RowOutcome> {
    if threads == 1 || rows.len() < 2 {
        return rows.iter().map(|row| transformation.evaluate(row)).collect();
    }

    let chunk_size = (rows.len() + threads - 1) / threads;
    std::thread::scope(|scope| {
        let handles: Vec<_> = rows
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|row| transformation.evaluate(row))
                        .collect::<Vec<_>>()
                });
                (chunk.len(), handle)
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|(len, handle)| {
                handle.join().unwrap_or_else(|_| {
                    vec![RowOutcome::Fail("worker thread panicked".to_string()); len]
                })
            })
            .collect()
    })
}
