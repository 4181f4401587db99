//! # Medir
//!
//! Sequential benchmark orchestrator for local Ollama model servers.
//!
//! Medir (Spanish: "to measure") manages the full lifecycle of a local
//! inference server, exercises a fixed catalog of model variants against a
//! standardized prompt, measures per-run latency and throughput, and writes
//! a durable CSV record of the results.
//!
//! ## Features
//!
//! - **Single-command benchmarking**: `medir run` covers the whole catalog
//! - **Sequential by design**: one model loaded, queried, and unloaded at a
//!   time, respecting a shared bounded memory budget
//! - **Resilient cleanup**: the server subprocess is stopped on every exit
//!   path, including faults and interruption
//! - **Durable results**: per-run latency and throughput as a CSV artifact
//!
//! ## Example
//!
//! ```rust
//! use medir::catalog::ModelSpec;
//! use medir::driver::BenchmarkPlan;
//!
//! let plan = BenchmarkPlan::new()
//!     .with_catalog(vec![ModelSpec::new("llama3", "8b")])
//!     .with_repetitions(3);
//!
//! assert_eq!(plan.total_runs(), 3);
//! ```
//!
//! ## Architecture
//!
//! Components, leaf-first:
//! - **Server supervisor**: owns the inference server subprocess (start,
//!   readiness, terminate)
//! - **Model runner**: per-variant fetch, generate, unload sequence
//! - **Benchmark driver**: catalog x repetition iteration with guaranteed
//!   supervisor shutdown
//! - **Results sink**: ordered CSV persistence
//!
//! ## Quality Standards
//!
//! - Clippy Warnings: 0 (enforced)
//! - Every failure mode covered by a test double, no live server required

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // u64/usize -> f64 for metrics is acceptable
#![allow(clippy::cast_possible_truncation)] // usize -> u64 progress totals are small
#![allow(clippy::cast_possible_wrap)] // u32 pid -> i32 for signal delivery is safe
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::missing_panics_doc)] // Allow missing Panics doc sections
#![allow(clippy::doc_markdown)] // Allow technical terms without backticks
#![allow(clippy::uninlined_format_args)] // Prefer explicit format args
#![allow(clippy::float_cmp)] // Allow float comparisons in tests

/// Benchmark model catalog and standard prompt
pub mod catalog;
/// CLI command implementations (extracted for testability)
pub mod cli;
/// Benchmark driver: catalog iteration and guaranteed server shutdown
pub mod driver;
pub mod error;
/// HTTP client for the Ollama server API
///
/// Implements actual HTTP calls to a local model server.
/// **NO MOCK DATA** - measures real network latency and inference timing.
pub mod http_client;
/// CSV persistence of benchmark results
pub mod report;
pub mod runner;
/// Inference server process supervision
pub mod server;

// Re-exports for convenience
pub use error::{MedirError, Result};
pub use runner::BenchmarkRecord;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        // VERSION is a compile-time constant from CARGO_PKG_VERSION, so it's never empty
        assert!(VERSION.starts_with("0."));
        assert!(VERSION.contains('.'));
    }
}
