//! Model catalog types
//!
//! A benchmark run is driven by an ordered list of [`ModelSpec`] entries.
//! The catalog is always injected into the driver; [`default_catalog`] is a
//! convenience list of variants sized to fit a 48 GB memory budget, paired
//! with [`DEFAULT_PROMPT`] as the standard single-query workload.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Question asked of every model variant
pub const DEFAULT_PROMPT: &str =
    "In molecular biology, what are the four canonical bases of DNA?";

/// Default number of repetitions per model variant
pub const DEFAULT_REPETITIONS: usize = 3;

/// One benchmarkable model variant: base name plus parameter-size tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Base model name (e.g. "gemma3")
    pub name: String,
    /// Parameter-count tag (e.g. "27b")
    pub parameters: String,
}

impl ModelSpec {
    /// Create a spec from a name and parameter tag
    #[must_use]
    pub fn new(name: &str, parameters: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.to_string(),
        }
    }

    /// Full model key in the server's `name:tag` form
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.parameters)
    }

    /// Parse a `name:tag` string into a spec
    ///
    /// Returns `None` when either side of the colon is missing or empty.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (name, parameters) = s.split_once(':')?;
        if name.is_empty() || parameters.is_empty() {
            return None;
        }
        Some(Self::new(name, parameters))
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.parameters)
    }
}

/// The built-in benchmark catalog
///
/// Variants at or above 7B parameters that still fit within a 48 GB memory
/// budget, in the order they are benchmarked.
#[must_use]
pub fn default_catalog() -> Vec<ModelSpec> {
    [
        ("gemma3", "12b"),
        ("gemma3", "27b"),
        ("deepseek-r1", "7b"),
        ("deepseek-r1", "8b"),
        ("deepseek-r1", "14b"),
        ("deepseek-r1", "32b"),
        ("deepseek-r1", "70b"),
        ("deepseek-llm", "7b"),
        ("deepseek-llm", "67b"),
        ("deepseek-v2", "16b"),
        ("llama2", "7b"),
        ("llama2", "13b"),
        ("llama2", "70b"),
        ("llama3", "8b"),
        ("llama3", "70b"),
        ("llama3.1", "8b"),
        ("llama3.1", "70b"),
        ("llama3.3", "70b"),
    ]
    .iter()
    .map(|(name, parameters)| ModelSpec::new(name, parameters))
    .collect()
}
