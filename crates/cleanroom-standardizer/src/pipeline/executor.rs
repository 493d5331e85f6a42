//! Concurrent execution of initial mapping requests.
//!
//! Tasks sit in one shared queue drained by at most `max_workers` scoped
//! threads. Workers only call the provider; parsing, repair and progress
//! reporting happen on the calling thread as results arrive over a channel,
//! so the result map has a single writer.

use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, info};

use crate::ai::AIProvider;
use crate::error::{Result, StandardizerError};
use crate::pipeline::progress::{CancellationToken, ProgressReporter, ProgressUpdate, WorkflowStage};
use crate::prompts::initial_mapping_prompt;
use crate::response::resolve_mapping;
use crate::types::{ColumnGroupIdentity, Mapping, MappingSlot, Warning, WarningKind};

/// One mapping request: the value set of one column in one group.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingTask {
    pub identity: ColumnGroupIdentity,
    pub values: Vec<String>,
}

impl MappingTask {
    pub fn new(identity: ColumnGroupIdentity, values: Vec<String>) -> Self {
        Self { identity, values }
    }
}

/// Collected results of one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub mappings: BTreeMap<ColumnGroupIdentity, MappingSlot>,
    pub warnings: Vec<Warning>,
    pub succeeded: usize,
    pub failed: usize,
}

impl GenerationOutcome {
    fn record_ready(&mut self, identity: ColumnGroupIdentity, mapping: Mapping) {
        self.mappings.insert(identity, MappingSlot::ready(mapping));
        self.succeeded += 1;
    }

    fn record_failed(&mut self, identity: ColumnGroupIdentity, reason: String) {
        self.warnings.push(
            Warning::new(WarningKind::TaskFailed, format!("Mapping request failed: {reason}"))
                .with_subject(identity.to_string()),
        );
        self.mappings.insert(identity, MappingSlot::failed(reason));
        self.failed += 1;
    }
}

/// Runs mapping tasks against a provider with a bounded worker pool.
///
/// Without a provider every task gets its identity mapping.
pub struct MappingExecutor<'a> {
    ai_provider: Option<&'a dyn AIProvider>,
    max_workers: usize,
    cancellation_token: Option<&'a CancellationToken>,
    progress_reporter: Option<&'a dyn ProgressReporter>,
}

impl<'a> MappingExecutor<'a> {
    pub fn new(ai_provider: Option<&'a dyn AIProvider>, max_workers: usize) -> Self {
        Self {
            ai_provider,
            max_workers: max_workers.max(1),
            cancellation_token: None,
            progress_reporter: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn with_progress(mut self, reporter: Option<&'a dyn ProgressReporter>) -> Self {
        self.progress_reporter = reporter;
        self
    }

    /// Number of worker threads used for `tasks` tasks.
    pub fn worker_count(&self, tasks: usize) -> usize {
        self.max_workers.min(tasks).max(1)
    }

    /// Run every task and collect one slot per task.
    ///
    /// A failed request fills its own slot with an error marker and does not
    /// affect other tasks. Returns [`StandardizerError::Cancelled`] when the
    /// token was cancelled during the run.
    pub fn run(&self, tasks: Vec<MappingTask>) -> Result<GenerationOutcome> {
        let total = tasks.len();
        let mut outcome = GenerationOutcome::default();

        match self.ai_provider {
            None => {
                for (idx, task) in tasks.into_iter().enumerate() {
                    self.check_cancelled()?;
                    let label = task.identity.to_string();
                    outcome.record_ready(task.identity, Mapping::identity(&task.values));
                    self.report(ProgressUpdate::with_items(
                        WorkflowStage::Generating,
                        label,
                        idx + 1,
                        total,
                        "Identity mapping created",
                    ));
                }
            }
            Some(provider) => self.run_concurrent(provider, tasks, &mut outcome),
        }

        self.check_cancelled()?;
        info!(
            "Generated {} mappings ({} failed)",
            outcome.succeeded, outcome.failed
        );
        Ok(outcome)
    }

    fn run_concurrent(
        &self,
        provider: &dyn AIProvider,
        tasks: Vec<MappingTask>,
        outcome: &mut GenerationOutcome,
    ) {
        let total = tasks.len();
        let workers = self.worker_count(total);
        let queue = Mutex::new(VecDeque::from(tasks));
        let token = self.cancellation_token;
        let (tx, rx) = mpsc::channel::<(MappingTask, anyhow::Result<String>)>();

        info!("Dispatching {} mapping requests on {} workers", total, workers);

        thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        if token.is_some_and(CancellationToken::is_cancelled) {
                            debug!("Worker {} stopping: cancelled", worker);
                            break;
                        }
                        let Some(task) = queue.lock().pop_front() else {
                            break;
                        };
                        debug!("Worker {} requesting {}", worker, task.identity);
                        let result = provider.complete(&initial_mapping_prompt(&task.values));
                        if tx.send((task, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (done, (task, result)) in rx.iter().enumerate() {
                let label = task.identity.to_string();
                let message = match result {
                    Ok(raw) => {
                        let resolution = resolve_mapping(&raw, &task.values, &label);
                        outcome.warnings.extend(resolution.warnings);
                        outcome.record_ready(task.identity, resolution.mapping);
                        "Mapping ready"
                    }
                    Err(e) => {
                        error!("{}: mapping request failed: {}", label, e);
                        outcome.record_failed(task.identity, e.to_string());
                        "Mapping request failed"
                    }
                };
                self.report(ProgressUpdate::with_items(
                    WorkflowStage::Generating,
                    label,
                    done + 1,
                    total,
                    message,
                ));
            }
        });
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_some_and(CancellationToken::is_cancelled) {
            return Err(StandardizerError::Cancelled);
        }
        Ok(())
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(reporter) = self.progress_reporter {
            reporter.report(update);
        }
    }
}
