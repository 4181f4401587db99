//! Per-model benchmark execution
//!
//! One [`ModelRunner::run`] call covers a model variant's full lifecycle:
//! fetch weights, issue a single non-streaming generation, classify the
//! outcome, unload, and cool down. Transient faults (timeout, non-200
//! status) become sentinel records; transport and parse failures propagate.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::ModelSpec;
use crate::error::{MedirError, Result};
use crate::http_client::{GenerateRequest, GenerateResponse, OllamaClient};

/// Answer sentinel for a non-success HTTP status
pub const SENTINEL_ERROR: &str = "Error";
/// Answer sentinel for a request timeout
pub const SENTINEL_TIMEOUT: &str = "Timeout";
/// Answer sentinel for a success response with no `response` field
pub const SENTINEL_NO_RESPONSE: &str = "No response";

/// Measured outcome of one (model, repetition) trial
///
/// Field order matches the persisted column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Model base name
    #[serde(rename = "Model")]
    pub model: String,
    /// Parameter-size tag
    #[serde(rename = "Parameters")]
    pub parameters: String,
    /// Generated text, or a sentinel when generation did not succeed
    #[serde(rename = "Answer")]
    pub answer: String,
    /// Wall-clock runtime in seconds, `0` on a failed generation
    #[serde(rename = "Runtime (s)")]
    pub runtime_seconds: f64,
    /// Generation throughput, `0` on a failed generation
    #[serde(rename = "Speed (tokens/s)")]
    pub tokens_per_second: f64,
}

impl BenchmarkRecord {
    /// Whether this record carries a failure sentinel instead of an answer
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.answer == SENTINEL_ERROR || self.answer == SENTINEL_TIMEOUT
    }
}

/// Request surface the runner needs from an inference server
///
/// [`OllamaClient`] is the production implementation; [`MockBackend`]
/// substitutes scripted outcomes in tests.
pub trait InferenceBackend {
    /// Ensure the model weights are present locally
    ///
    /// # Errors
    /// Transport or server failures; callers treat these as non-fatal.
    fn fetch(&self, model_key: &str) -> Result<()>;

    /// Issue one non-streaming generation request
    ///
    /// # Errors
    /// `RequestTimeout`, `HttpStatus`, `ConnectionError`, or `FormatError`.
    fn generate(&self, model_key: &str, prompt: &str) -> Result<GenerateResponse>;

    /// Ask the server to release the model
    ///
    /// # Errors
    /// Transport or server failures; callers treat these as non-fatal.
    fn unload(&self, model_key: &str) -> Result<()>;
}

impl InferenceBackend for OllamaClient {
    fn fetch(&self, model_key: &str) -> Result<()> {
        self.pull(model_key)
    }

    fn generate(&self, model_key: &str, prompt: &str) -> Result<GenerateResponse> {
        let request = GenerateRequest::new(model_key, prompt);
        OllamaClient::generate(self, &request)
    }

    fn unload(&self, model_key: &str) -> Result<()> {
        OllamaClient::unload(self, model_key)
    }
}

/// Executes the fetch, generate, unload sequence for one model variant
pub struct ModelRunner {
    prompt: String,
    cooldown: Duration,
}

impl ModelRunner {
    /// Create a runner with the given prompt and the default 5 s cooldown
    #[must_use]
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            cooldown: Duration::from_secs(5),
        }
    }

    /// Set the post-unload cooldown
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Prompt sent with every generation request
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Configured post-unload cooldown
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Benchmark one model variant and return its record
    ///
    /// Fetch failures are logged and the run continues (the generation step
    /// surfaces the real failure). Timeouts and non-success statuses become
    /// sentinel records without retry. The unload request and cooldown run
    /// on every path, including ahead of a propagated failure.
    ///
    /// # Errors
    /// `ConnectionError` or `FormatError` from the generation call; these
    /// are not representable as a sentinel and abort the benchmark.
    pub fn run<B: InferenceBackend>(&self, backend: &B, model: &ModelSpec) -> Result<BenchmarkRecord> {
        let key = model.key();

        if let Err(e) = backend.fetch(&key) {
            eprintln!("[runner] Warning: failed to fetch weights for '{key}': {e}");
        }

        let outcome = match backend.generate(&key, &self.prompt) {
            Ok(response) => {
                let runtime_seconds = response.runtime_seconds();
                let tokens_per_second = response.tokens_per_second();
                let answer = response
                    .response
                    .unwrap_or_else(|| SENTINEL_NO_RESPONSE.to_string());
                Ok((answer, runtime_seconds, tokens_per_second))
            }
            Err(e @ MedirError::RequestTimeout { .. }) => {
                eprintln!("[runner] Warning: {e}");
                Ok((SENTINEL_TIMEOUT.to_string(), 0.0, 0.0))
            }
            Err(e @ MedirError::HttpStatus { .. }) => {
                eprintln!("[runner] Warning: {e}");
                Ok((SENTINEL_ERROR.to_string(), 0.0, 0.0))
            }
            Err(e) => Err(e),
        };

        // Unload and cooldown run even when generation failed
        if let Err(e) = backend.unload(&key) {
            eprintln!("[runner] Warning: failed to unload '{key}': {e}");
        }
        std::thread::sleep(self.cooldown);

        let (answer, runtime_seconds, tokens_per_second) = outcome?;
        Ok(BenchmarkRecord {
            model: model.name.clone(),
            parameters: model.parameters.clone(),
            answer,
            runtime_seconds,
            tokens_per_second,
        })
    }
}

impl Default for ModelRunner {
    fn default() -> Self {
        Self::new(crate::catalog::DEFAULT_PROMPT)
    }
}

// =============================================================================
// Mock backend
// =============================================================================

/// Scripted outcome for one [`MockBackend`] generation call
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this response
    Respond(GenerateResponse),
    /// Fail with a request timeout
    Timeout,
    /// Fail with the given HTTP status
    Status(u16),
    /// Fail with an unrecoverable connection error
    Fail(String),
    /// Panic inside the generation call
    Panic,
}

impl MockOutcome {
    /// Successful response with the given text and canned metrics
    /// (5 s runtime, 50 tokens/s)
    #[must_use]
    pub fn respond(answer: &str) -> Self {
        Self::respond_with(Some(answer), 5_000_000_000, 100, 2_000_000_000)
    }

    /// Successful response with explicit text and timing fields
    #[must_use]
    pub fn respond_with(
        answer: Option<&str>,
        total_duration: u64,
        eval_count: usize,
        eval_duration: u64,
    ) -> Self {
        Self::Respond(GenerateResponse {
            model: String::new(),
            response: answer.map(ToString::to_string),
            done: true,
            total_duration,
            load_duration: 0,
            prompt_eval_count: 0,
            prompt_eval_duration: 0,
            eval_count,
            eval_duration,
        })
    }
}

/// Scriptable in-memory backend for exercising the runner and driver
/// without a server
///
/// Generation outcomes are consumed from a queue in call order; once the
/// queue is empty every call returns the fallback outcome. Call counts and
/// the sequence of generated model keys are recorded for assertions.
pub struct MockBackend {
    script: RefCell<VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    fail_fetch: bool,
    fail_unload: bool,
    fetch_calls: Cell<usize>,
    generate_calls: Cell<usize>,
    unload_calls: Cell<usize>,
    generated_keys: RefCell<Vec<String>>,
}

impl MockBackend {
    /// Backend whose every generation succeeds with canned metrics
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            fallback: MockOutcome::respond("mock response"),
            fail_fetch: false,
            fail_unload: false,
            fetch_calls: Cell::new(0),
            generate_calls: Cell::new(0),
            unload_calls: Cell::new(0),
            generated_keys: RefCell::new(Vec::new()),
        }
    }

    /// Queue one scripted outcome, consumed before the fallback applies
    #[must_use]
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.script.borrow_mut().push_back(outcome);
        self
    }

    /// Replace the fallback outcome used once the script is exhausted
    #[must_use]
    pub fn with_fallback(mut self, outcome: MockOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Make every fetch call fail
    #[must_use]
    pub fn with_failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Make every unload call fail
    #[must_use]
    pub fn with_failing_unload(mut self) -> Self {
        self.fail_unload = true;
        self
    }

    /// Number of fetch calls observed
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.get()
    }

    /// Number of generation calls observed
    #[must_use]
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.get()
    }

    /// Number of unload calls observed
    #[must_use]
    pub fn unload_calls(&self) -> usize {
        self.unload_calls.get()
    }

    /// Model keys passed to generate, in call order
    #[must_use]
    pub fn generated_keys(&self) -> Vec<String> {
        self.generated_keys.borrow().clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn fetch(&self, _model_key: &str) -> Result<()> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        if self.fail_fetch {
            return Err(MedirError::ConnectionError(
                "mock fetch failure".to_string(),
            ));
        }
        Ok(())
    }

    fn generate(&self, model_key: &str, _prompt: &str) -> Result<GenerateResponse> {
        self.generate_calls.set(self.generate_calls.get() + 1);
        self.generated_keys.borrow_mut().push(model_key.to_string());

        let outcome = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            MockOutcome::Respond(response) => Ok(response),
            MockOutcome::Timeout => Err(MedirError::RequestTimeout {
                model: model_key.to_string(),
                timeout_secs: 60,
            }),
            MockOutcome::Status(status) => Err(MedirError::HttpStatus {
                status,
                endpoint: "/api/generate".to_string(),
            }),
            MockOutcome::Fail(reason) => Err(MedirError::ConnectionError(reason)),
            MockOutcome::Panic => panic!("mock backend panic"),
        }
    }

    fn unload(&self, _model_key: &str) -> Result<()> {
        self.unload_calls.set(self.unload_calls.get() + 1);
        if self.fail_unload {
            return Err(MedirError::ConnectionError(
                "mock unload failure".to_string(),
            ));
        }
        Ok(())
    }
}
