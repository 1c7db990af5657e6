// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Podcheck — proof-of-delivery document validation
//
// Entry point. Initialises logging, loads the configuration, builds the OCR
// engine pool and dispatches the subcommand. Results go to stdout, logs to
// stderr.
//
// Exit codes: 0 every document was classified, 1 fatal error (bad
// configuration, unreadable directory), 2 at least one document failed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use podcheck_classify::{BatchFailure, BatchOutcome, ClassificationSummary, Pipeline};
use podcheck_core::config::PodConfig;
use podcheck_core::error::Result;
use podcheck_core::ClassificationResult;
use podcheck_ocr::{EnginePool, engine_from_settings};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "podcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate proof-of-delivery documents", long_about = None)]
struct Cli {
    /// Configuration file (.toml or .json); built-in defaults when omitted
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty, global = true)]
    format: OutputFormat,

    /// Worker threads (defaults to the configured value, then one per core)
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one or more document images
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Classify every supported image in a directory
    Batch { dir: PathBuf },
    /// Load and validate a configuration file
    CheckConfig { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Serialize)]
struct Report<'a> {
    results: &'a [ClassificationResult],
    failures: &'a [BatchFailure],
    summary: ClassificationSummary,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, class = ?e.class(), "podcheck failed");
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        config,
        format,
        workers,
        command,
    } = cli;
    match command {
        Commands::CheckConfig { file } => check_config(&file),
        Commands::Classify { files } => classify(load_config(config.as_deref(), workers)?, files, format),
        Commands::Batch { dir } => {
            let config = load_config(config.as_deref(), workers)?;
            let paths = podcheck_classify::discover(&dir, &config.batch)?;
            if paths.is_empty() {
                warn!(dir = %dir.display(), "No supported documents found");
            }
            classify(config, paths, format)
        }
    }
}

fn load_config(path: Option<&Path>, workers: Option<usize>) -> Result<PodConfig> {
    let mut config = match path {
        Some(path) => PodConfig::from_file(path)?,
        None => PodConfig::default(),
    };
    if let Some(workers) = workers {
        config.batch.workers = workers;
    }
    Ok(config)
}

fn classify(config: PodConfig, paths: Vec<PathBuf>, format: OutputFormat) -> Result<ExitCode> {
    let workers = config.batch.effective_workers();
    let settings = config.ocr.clone();
    let pipeline = Pipeline::new(config)?;

    // Fail fast on a bad backend descriptor instead of inside every worker.
    let probe = engine_from_settings(&settings)?;
    if probe.is_disabled() {
        warn!("No OCR backends configured; every document will be reported as illegible");
    }
    let pool = EnginePool::new(workers, move || engine_from_settings(&settings));

    let outcome = podcheck_classify::run(&pipeline, &paths, &pool, workers)?;
    emit(&outcome, format)?;
    Ok(if outcome.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn check_config(path: &Path) -> Result<ExitCode> {
    let config = PodConfig::from_file(path)?;
    engine_from_settings(&config.ocr)?;
    info!(path = %path.display(), "Configuration is valid");
    println!(
        "{}: ok ({} zones, {} required fields, {} OCR backends)",
        path.display(),
        config.zones.len(),
        config.required_fields.len(),
        config.ocr.backends.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn emit(outcome: &BatchOutcome, format: OutputFormat) -> Result<()> {
    let summary = ClassificationSummary::from_results(&outcome.results);
    match format {
        OutputFormat::Json => {
            let report = Report {
                results: &outcome.results,
                failures: &outcome.failures,
                summary,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Pretty => {
            for result in &outcome.results {
                print_result(result);
            }
            for failure in &outcome.failures {
                println!("{}: FAILED ({})", failure.source, failure.error);
            }
            println!();
            println!(
                "{} documents: {} valid, {} invalid ({:.1}% valid)",
                summary.total, summary.valid, summary.invalid, summary.validation_rate
            );
            for (code, count) in &summary.by_code {
                println!("  {:<20} {count}", code.as_str());
            }
            if !summary.top_issues.is_empty() {
                println!("Most frequent issues:");
                for issue in &summary.top_issues {
                    println!("  {:>4}  {}", issue.count, issue.message);
                }
            }
        }
    }
    Ok(())
}

fn print_result(result: &ClassificationResult) {
    println!(
        "{}: {} ({}) confidence {:.2} {}",
        result.page.source,
        result.classification_code,
        result.label,
        result.confidence.value(),
        if result.is_valid { "VALID" } else { "INVALID" }
    );
    for issue in &result.issues {
        println!("    [{:?}] {}", issue.severity, issue.message);
    }
    for recommendation in &result.recommendations {
        println!("    -> {recommendation}");
    }
}
