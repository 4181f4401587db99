//! Tabular persistence of benchmark results
//!
//! Each persist call writes a complete, self-contained CSV snapshot: header
//! row first, then one row per record in run order. No merging with prior
//! artifacts.

use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::error::{MedirError, Result};
use crate::runner::BenchmarkRecord;

/// Default artifact location relative to the working directory
pub const DEFAULT_OUTPUT: &str = "results/ollama_benchmark.csv";

/// Column header, written even for an empty result set
const HEADER: [&str; 5] = [
    "Model",
    "Parameters",
    "Answer",
    "Runtime (s)",
    "Speed (tokens/s)",
];

/// Serializes an ordered record sequence to a CSV artifact
#[derive(Debug, Clone)]
pub struct ResultsSink {
    destination: PathBuf,
}

impl ResultsSink {
    /// Create a sink writing to the given path
    #[must_use]
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    /// Path the artifact is written to
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Write all records to the destination, overwriting any prior artifact
    ///
    /// Creates the containing directory if absent. An empty record slice
    /// still produces an artifact with the header row.
    ///
    /// # Errors
    /// `PersistError` if the directory, file, or any row cannot be written.
    pub fn persist(&self, records: &[BenchmarkRecord]) -> Result<()> {
        if let Some(parent) = self.destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MedirError::PersistError(format!(
                        "Failed to create results directory '{}': {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.destination)
            .map_err(|e| {
                MedirError::PersistError(format!(
                    "Failed to create '{}': {e}",
                    self.destination.display()
                ))
            })?;

        writer
            .write_record(HEADER)
            .map_err(|e| MedirError::PersistError(format!("Failed to write header: {e}")))?;

        for record in records {
            writer
                .serialize(record)
                .map_err(|e| MedirError::PersistError(format!("Failed to write record: {e}")))?;
        }

        writer
            .flush()
            .map_err(|e| MedirError::PersistError(format!("Failed to flush results: {e}")))?;
        Ok(())
    }
}
