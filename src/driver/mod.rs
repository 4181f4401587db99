//! Benchmark sequencing across the model catalog
//!
//! The driver owns the run's state machine: start the server, visit every
//! (model, repetition) pair in catalog-then-repetition order, stop the
//! server on every exit path, and hand the collected records to the sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::{default_catalog, ModelSpec, DEFAULT_PROMPT, DEFAULT_REPETITIONS};
use crate::error::{MedirError, Result};
use crate::report::ResultsSink;
use crate::runner::{BenchmarkRecord, InferenceBackend, ModelRunner};
use crate::server::{ServerGuard, ServerSupervisor};

/// Position of a driver in its run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkPhase {
    /// Constructed, not yet run
    Idle,
    /// Waiting for the server to start and settle
    ServerStarting,
    /// Visiting (model, repetition) pairs
    Iterating,
    /// Stopping the server after the loop exited
    ServerStopping,
    /// Run completed and results handed to the sink
    Done,
}

/// Everything a benchmark run needs decided up front
///
/// The catalog is injected here rather than read from a global, so tests
/// can substitute small catalogs.
#[derive(Debug, Clone)]
pub struct BenchmarkPlan {
    /// Ordered model variants to benchmark
    pub catalog: Vec<ModelSpec>,
    /// Repetitions per model variant
    pub repetitions: usize,
    /// Prompt sent with every generation request
    pub prompt: String,
    /// Post-unload cooldown inside each run
    pub cooldown: Duration,
    /// Pause between consecutive runs
    pub pause: Duration,
    /// Persist partial results when a run aborts mid-loop
    pub keep_partial: bool,
    /// Render a progress bar while iterating
    pub show_progress: bool,
}

impl Default for BenchmarkPlan {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            repetitions: DEFAULT_REPETITIONS,
            prompt: DEFAULT_PROMPT.to_string(),
            cooldown: Duration::from_secs(5),
            pause: Duration::from_secs(5),
            keep_partial: false,
            show_progress: true,
        }
    }
}

impl BenchmarkPlan {
    /// Default plan: full catalog, three repetitions, standard prompt
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the model catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: Vec<ModelSpec>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Set the repetition count per model
    #[must_use]
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Replace the prompt
    #[must_use]
    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    /// Set the post-unload cooldown
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the inter-run pause
    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Persist whatever was collected when a run aborts
    #[must_use]
    pub fn with_keep_partial(mut self, keep_partial: bool) -> Self {
        self.keep_partial = keep_partial;
        self
    }

    /// Enable or disable the progress bar
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Total (model, repetition) pairs this plan visits
    #[must_use]
    pub fn total_runs(&self) -> usize {
        self.catalog.len() * self.repetitions
    }
}

/// Sequences a full benchmark run
pub struct BenchmarkDriver {
    plan: BenchmarkPlan,
    phase: BenchmarkPhase,
    interrupt: Option<Arc<AtomicBool>>,
}

impl BenchmarkDriver {
    /// Create a driver for the given plan
    #[must_use]
    pub fn new(plan: BenchmarkPlan) -> Self {
        Self {
            plan,
            phase: BenchmarkPhase::Idle,
            interrupt: None,
        }
    }

    /// Install an interruption flag checked between runs
    ///
    /// A set flag aborts the loop with `Interrupted` before the next run
    /// starts; an in-flight generation call is never cut short.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Current state-machine phase
    #[must_use]
    pub fn phase(&self) -> BenchmarkPhase {
        self.phase
    }

    /// Plan this driver executes
    #[must_use]
    pub fn plan(&self) -> &BenchmarkPlan {
        &self.plan
    }

    /// Execute the full benchmark run
    ///
    /// The server is stopped on every exit path once `start` has succeeded,
    /// including faults and panics inside the loop. A stop failure on the
    /// normal path is logged and does not prevent persistence. On a fault
    /// the collected records are persisted only when the plan keeps
    /// partial results; the fault is returned either way.
    ///
    /// # Errors
    /// Start failures from the supervisor, `Interrupted` when the flag was
    /// set, unrecoverable runner faults, or a persist failure on the
    /// normal path.
    pub fn run<B: InferenceBackend>(
        &mut self,
        supervisor: &ServerSupervisor,
        backend: &B,
        sink: &ResultsSink,
    ) -> Result<Vec<BenchmarkRecord>> {
        self.phase = BenchmarkPhase::ServerStarting;
        let handle = supervisor.start()?;
        let mut guard = ServerGuard::new(supervisor, handle);

        self.phase = BenchmarkPhase::Iterating;
        let progress = self.make_progress();
        let mut records = Vec::with_capacity(self.plan.total_runs());
        let outcome = self.iterate(backend, &mut records, progress.as_ref());

        self.phase = BenchmarkPhase::ServerStopping;
        if let Err(e) = guard.release() {
            eprintln!("[driver] Warning: failed to stop server: {e}");
        }

        match outcome {
            Ok(()) => {
                if let Some(bar) = progress {
                    bar.finish_with_message("complete");
                }
                sink.persist(&records)?;
                self.phase = BenchmarkPhase::Done;
                Ok(records)
            }
            Err(e) => {
                if let Some(bar) = progress {
                    bar.abandon();
                }
                if self.plan.keep_partial && !records.is_empty() {
                    if let Err(persist_err) = sink.persist(&records) {
                        eprintln!(
                            "[driver] Warning: failed to persist partial results: {persist_err}"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn iterate<B: InferenceBackend>(
        &self,
        backend: &B,
        records: &mut Vec<BenchmarkRecord>,
        progress: Option<&ProgressBar>,
    ) -> Result<()> {
        let runner = ModelRunner::new(&self.plan.prompt).with_cooldown(self.plan.cooldown);
        let total = self.plan.total_runs();
        let mut completed = 0usize;

        for model in &self.plan.catalog {
            for _repetition in 0..self.plan.repetitions {
                if self.interrupted() {
                    return Err(MedirError::Interrupted);
                }
                if let Some(bar) = progress {
                    bar.set_message(model.key());
                }

                let record = runner.run(backend, model)?;
                records.push(record);

                if let Some(bar) = progress {
                    bar.inc(1);
                }
                completed += 1;
                if completed < total {
                    std::thread::sleep(self.plan.pause);
                }
            }
        }
        Ok(())
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn make_progress(&self) -> Option<ProgressBar> {
        if !self.plan.show_progress {
            return None;
        }
        let bar = ProgressBar::new(self.plan.total_runs() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(bar)
    }
}
