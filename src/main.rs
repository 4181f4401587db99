//! Medir CLI - sequential benchmark harness for local Ollama model servers
//!
//! # Commands
//!
//! - `run` - Benchmark the model catalog against a local inference server
//! - `models` - List the benchmark model catalog
//! - `check` - Probe server readiness

use clap::Parser;
use medir::cli::{entrypoint, Cli};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = entrypoint(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
