//! CLI command implementations
//!
//! This module contains the business logic for CLI commands, extracted
//! from main.rs for testability.

// CLI glue code - relaxed lint requirements
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::catalog::{default_catalog, ModelSpec, DEFAULT_REPETITIONS};
use crate::driver::{BenchmarkDriver, BenchmarkPlan};
use crate::error::{MedirError, Result};
use crate::http_client::{OllamaClient, DEFAULT_BASE_URL};
use crate::report::{ResultsSink, DEFAULT_OUTPUT};
use crate::runner::BenchmarkRecord;
use crate::server::{ServerConfig, ServerSupervisor};

/// Medir - benchmark local Ollama models sequentially
///
/// Starts the inference server, runs every model in the catalog against a
/// fixed prompt, and writes per-run latency and throughput to a CSV file.
#[derive(Parser)]
#[command(name = "medir")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the benchmark across the model catalog
    ///
    /// Examples:
    ///   medir run
    ///   medir run --model llama3:8b --repetitions 1
    ///   medir run --output /tmp/bench.csv --no-progress
    Run {
        /// Server base URL
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        url: String,

        /// Output CSV path
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: String,

        /// Repetitions per model
        #[arg(short, long, default_value = "3")]
        repetitions: usize,

        /// Prompt sent to every model (default: the DNA-bases question)
        #[arg(short, long)]
        prompt: Option<String>,

        /// Benchmark only these models (name:parameters, repeatable)
        #[arg(short, long, value_name = "MODEL")]
        model: Vec<String>,

        /// Generation timeout in seconds per request (pulls are unbounded)
        #[arg(short, long, default_value = "60")]
        timeout: u64,

        /// Persist collected records when the run aborts early
        #[arg(long)]
        keep_partial: bool,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,

        /// Command used to launch the inference server
        #[arg(long, default_value = "ollama serve")]
        server_cmd: String,
    },
    /// List the benchmark model catalog
    Models {
        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Check whether the server is reachable and ready
    Check {
        /// Server base URL
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        url: String,
    },
}

/// Dispatches a parsed command line to its handler
pub fn entrypoint(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            url,
            output,
            repetitions,
            prompt,
            model,
            timeout,
            keep_partial,
            no_progress,
            server_cmd,
        } => handle_run(RunConfig {
            url,
            output,
            repetitions,
            prompt,
            models: model,
            timeout,
            keep_partial,
            no_progress,
            server_cmd,
        }),
        Commands::Models { format } => handle_models(&format),
        Commands::Check { url } => handle_check(&url),
    }
}

/// Resolved arguments for the `run` subcommand
pub struct RunConfig {
    /// Server base URL
    pub url: String,
    /// Output CSV path
    pub output: String,
    /// Repetitions per model
    pub repetitions: usize,
    /// Prompt override
    pub prompt: Option<String>,
    /// Raw `name:parameters` model references; empty means full catalog
    pub models: Vec<String>,
    /// Generation timeout in seconds per request
    pub timeout: u64,
    /// Persist collected records when the run aborts early
    pub keep_partial: bool,
    /// Disable the progress bar
    pub no_progress: bool,
    /// Command used to launch the inference server
    pub server_cmd: String,
}

/// Execute the full benchmark
pub fn handle_run(config: RunConfig) -> Result<()> {
    if config.repetitions == 0 {
        return Err(MedirError::InvalidConfiguration(
            "repetitions must be at least 1".to_string(),
        ));
    }

    let catalog = resolve_catalog(&config.models)?;
    let (server_command, server_args) = parse_server_command(&config.server_cmd)?;

    println!("Benchmark Configuration:");
    println!("  Server: {}", config.url);
    println!("  Server command: {}", config.server_cmd);
    println!("  Models: {}", catalog.len());
    println!("  Repetitions: {}", config.repetitions);
    println!("  Timeout: {}s", config.timeout);
    println!("  Output: {}", config.output);
    println!();

    let client = OllamaClient::with_timeout(&config.url, config.timeout);

    let arg_refs: Vec<&str> = server_args.iter().map(String::as_str).collect();
    let server_config = ServerConfig::new().with_command(&server_command, &arg_refs);
    let probe_client = client.clone();
    let supervisor = ServerSupervisor::new(server_config)
        .with_readiness_probe(move || probe_client.health_check().unwrap_or(false));

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        eprintln!("[cli] Warning: failed to install interrupt handler: {e}");
    }

    let mut plan = BenchmarkPlan::new()
        .with_catalog(catalog)
        .with_repetitions(config.repetitions)
        .with_keep_partial(config.keep_partial)
        .with_progress(!config.no_progress);
    if let Some(prompt) = &config.prompt {
        plan = plan.with_prompt(prompt);
    }

    let sink = ResultsSink::new(&config.output);
    let mut driver = BenchmarkDriver::new(plan).with_interrupt(interrupt);

    println!("Starting inference server...");
    let records = driver.run(&supervisor, &client, &sink)?;

    println!();
    print_summary(&records);
    println!();
    println!("Results saved to: {}", config.output);
    Ok(())
}

/// Print the model catalog
pub fn handle_models(format: &str) -> Result<()> {
    let catalog = default_catalog();

    if format == "json" {
        let json = serde_json::to_string_pretty(&catalog).map_err(|e| MedirError::FormatError {
            reason: format!("Failed to serialize catalog: {e}"),
        })?;
        println!("{json}");
        return Ok(());
    }

    println!("{:<16} {:>12}", "NAME", "PARAMETERS");
    println!("{}", "-".repeat(30));
    for model in &catalog {
        println!("{:<16} {:>12}", model.name, model.parameters);
    }
    println!();
    println!(
        "{} models, {} repetitions each by default",
        catalog.len(),
        DEFAULT_REPETITIONS
    );
    Ok(())
}

/// Probe server readiness and report the result
pub fn handle_check(url: &str) -> Result<()> {
    let client = OllamaClient::new(url);
    println!("Checking server at {url}...");

    if client.health_check()? {
        println!("Server is ready.");
        Ok(())
    } else {
        Err(MedirError::ServerError(
            "Server responded but is not ready".to_string(),
        ))
    }
}

fn resolve_catalog(raw_models: &[String]) -> Result<Vec<ModelSpec>> {
    if raw_models.is_empty() {
        return Ok(default_catalog());
    }
    raw_models
        .iter()
        .map(|raw| {
            ModelSpec::parse(raw).ok_or_else(|| {
                MedirError::InvalidConfiguration(format!(
                    "Invalid model reference '{raw}' (expected name:parameters)"
                ))
            })
        })
        .collect()
}

fn parse_server_command(raw: &str) -> Result<(String, Vec<String>)> {
    let mut parts = raw.split_whitespace();
    let command = parts.next().ok_or_else(|| {
        MedirError::InvalidConfiguration("server command must not be empty".to_string())
    })?;
    Ok((command.to_string(), parts.map(ToString::to_string).collect()))
}

fn print_summary(records: &[BenchmarkRecord]) {
    println!(
        "{:<24} {:>12} {:>16}  STATUS",
        "MODEL", "RUNTIME (s)", "SPEED (tok/s)"
    );
    println!("{}", "-".repeat(64));
    for record in records {
        let status = if record.is_failure() {
            record.answer.as_str()
        } else {
            "ok"
        };
        println!(
            "{:<24} {:>12.2} {:>16.2}  {}",
            format!("{}:{}", record.model, record.parameters),
            record.runtime_seconds,
            record.tokens_per_second,
            status
        );
    }

    let failures = records.iter().filter(|r| r.is_failure()).count();
    println!();
    println!("{} runs, {} failed", records.len(), failures);
}
