//! The standardizer: drives each workflow step against a [`Session`].
//!
//! The standardizer holds configuration and collaborators; all state lives
//! in the session, so one standardizer can serve many sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ai::AIProvider;
use crate::clustering::{AiClusterer, ClusteringOutcome, RuleBasedClusterer, cluster_columns};
use crate::config::{ConfigValidationError, StandardizerConfig};
use crate::error::{Result, StandardizerError};
use crate::io::{DatasetSummary, ExportReport, export_all, load_file};
use crate::pipeline::executor::{MappingExecutor, MappingTask};
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate, WorkflowStage,
};
use crate::pipeline::refinement::Refiner;
use crate::profiler::ColumnProfiler;
use crate::reporting::{AnalysisReport, GenerationReport, RefinementReport, stats_rows};
use crate::session::Session;
use crate::types::{ColumnGroup, Warning, WarningKind};

/// Runs the standardization workflow.
///
/// Use [`Standardizer::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use cleanroom_standardizer::{Session, Standardizer};
/// use cleanroom_standardizer::ai::OpenRouterProvider;
/// use std::sync::Arc;
///
/// let provider = Arc::new(OpenRouterProvider::new(api_key)?);
/// let standardizer = Standardizer::builder().ai_provider(provider).build()?;
///
/// let mut session = Session::new();
/// standardizer.load_files(&mut session, &["sales.csv".into()], &[])?;
/// standardizer.analyze(&mut session)?;
/// standardizer.generate_mappings(&mut session)?;
/// standardizer.finish(&mut session)?;
/// let report = standardizer.export(&session)?;
///
/// // Without AI (rule-based)
/// let standardizer = Standardizer::builder().build()?;
/// ```
pub struct Standardizer {
    config: StandardizerConfig,
    ai_provider: Option<Arc<dyn AIProvider>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(Standardizer: Send, Sync);

impl Standardizer {
    /// Create a new standardizer builder.
    pub fn builder() -> StandardizerBuilder {
        StandardizerBuilder::default()
    }

    pub fn config(&self) -> &StandardizerConfig {
        &self.config
    }

    /// Whether an LLM provider is configured.
    pub fn has_ai(&self) -> bool {
        self.ai_provider.is_some()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Load input files into the session.
    ///
    /// `sheets` restricts which workbook sheets are loaded; empty loads all.
    pub fn load_files(
        &self,
        session: &mut Session,
        paths: &[PathBuf],
        sheets: &[String],
    ) -> Result<Vec<DatasetSummary>> {
        self.run_step("Loading", || {
            let mut loaded = Vec::new();
            for (idx, path) in paths.iter().enumerate() {
                self.check_cancelled()?;
                self.report_progress(ProgressUpdate::with_items(
                    WorkflowStage::Loading,
                    path.display().to_string(),
                    idx,
                    paths.len(),
                    format!("Loading {}", path.display()),
                ));
                loaded.extend(load_file(path, sheets)?);
            }
            let summaries = loaded.iter().map(|d| d.summary()).collect();
            session.add_datasets(loaded)?;
            Ok(summaries)
        })
    }

    /// Find eligible columns, cluster them and select the groups to map.
    ///
    /// Auto groups with fewer than `min_auto_group_size` columns are not
    /// selected. Replaces any previous group selection in the session.
    ///
    /// # Errors
    ///
    /// [`StandardizerError::NoDatasetsLoaded`] and
    /// [`StandardizerError::NoEligibleColumns`] when there is nothing to
    /// cluster.
    pub fn analyze(&self, session: &mut Session) -> Result<AnalysisReport> {
        self.run_step("Analysis", || self.analyze_internal(session))
    }

    fn analyze_internal(&self, session: &mut Session) -> Result<AnalysisReport> {
        if session.is_finished() {
            return Err(StandardizerError::SessionFinished);
        }
        if session.groups_frozen() {
            return Err(StandardizerError::GroupsFrozen);
        }
        if session.datasets().is_empty() {
            return Err(StandardizerError::NoDatasetsLoaded);
        }

        self.report_progress(ProgressUpdate::new(
            WorkflowStage::Analyzing,
            0.0,
            "Profiling columns...",
        ));
        let eligible = ColumnProfiler::eligible_columns(session.datasets(), &self.config);
        if eligible.is_empty() {
            return Err(StandardizerError::NoEligibleColumns);
        }
        info!("Found {} eligible string columns", eligible.len());

        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            WorkflowStage::Analyzing,
            0.3,
            format!("Clustering {} columns...", eligible.len()),
        ));
        let outcome: ClusteringOutcome = match &self.ai_provider {
            Some(provider) => cluster_columns(
                &AiClusterer::new(provider.as_ref(), self.config.prompt_sample_size),
                &eligible,
            ),
            None => cluster_columns(&RuleBasedClusterer, &eligible),
        };
        self.check_cancelled()?;

        let selected: Vec<ColumnGroup> = outcome
            .groups
            .iter()
            .filter(|g| g.len() >= self.config.min_auto_group_size)
            .cloned()
            .collect();
        if selected.is_empty() {
            warn!(
                "No group has at least {} columns; add custom groups to continue",
                self.config.min_auto_group_size
            );
        }

        let summaries = selected
            .iter()
            .map(|g| ColumnProfiler::group_summary(session.datasets(), g))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Clustering produced {} groups, {} selected",
            outcome.groups.len(),
            selected.len()
        );
        session.set_auto_groups(selected)?;

        Ok(AnalysisReport {
            datasets: session.datasets().iter().map(|d| d.summary()).collect(),
            eligible_columns: eligible.len(),
            groups: outcome.groups,
            selected: summaries,
            used_fallback: outcome.used_fallback,
            warnings: outcome.warnings,
        })
    }

    /// Generate one mapping per (group, column) pair of the session's
    /// groups, concurrently.
    ///
    /// Columns without any value are skipped. A failed request leaves a
    /// failed slot for that column only. Freezes the groups.
    pub fn generate_mappings(&self, session: &mut Session) -> Result<GenerationReport> {
        self.run_step("Mapping generation", || self.generate_internal(session))
    }

    /// Discard the current mappings and generate them again from the
    /// current groups. Only allowed before any feedback round.
    pub fn regenerate(&self, session: &mut Session) -> Result<GenerationReport> {
        self.run_step("Mapping regeneration", || {
            session.reopen_groups()?;
            self.generate_internal(session)
        })
    }

    fn generate_internal(&self, session: &mut Session) -> Result<GenerationReport> {
        let start_time = Instant::now();
        if session.is_finished() {
            return Err(StandardizerError::SessionFinished);
        }
        if session.groups_frozen() {
            return Err(StandardizerError::GroupsFrozen);
        }

        let identities = session.identities();
        if identities.is_empty() {
            return Err(StandardizerError::NoGroupsSelected);
        }

        let mut warnings = Vec::new();
        let mut tasks = Vec::with_capacity(identities.len());
        let mut skipped_empty = 0;
        for identity in identities {
            let values = ColumnProfiler::value_set(session.datasets(), &identity.column)?;
            if values.is_empty() {
                debug!("{}: no values, skipped", identity);
                warnings.push(
                    Warning::new(WarningKind::EmptyColumn, "Column has no values; no mapping generated")
                        .with_subject(identity.to_string()),
                );
                skipped_empty += 1;
                continue;
            }
            tasks.push(MappingTask::new(identity, values));
        }

        let task_count = tasks.len();
        self.report_progress(ProgressUpdate::with_items(
            WorkflowStage::Generating,
            "Dispatching",
            0,
            task_count,
            format!("Requesting {task_count} mappings..."),
        ));

        let outcome = MappingExecutor::new(self.ai_provider.as_deref(), self.config.max_workers)
            .with_cancellation(&self.cancellation_token)
            .with_progress(self.progress_reporter.as_deref())
            .run(tasks)?;

        warnings.extend(outcome.warnings);
        let stats = stats_rows(&outcome.mappings);
        let (succeeded, failed) = (outcome.succeeded, outcome.failed);
        session.install_mappings(outcome.mappings);

        Ok(GenerationReport {
            tasks: task_count,
            succeeded,
            failed,
            skipped_empty,
            stats,
            warnings,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Apply the pending feedback and advance the iteration.
    ///
    /// Once the session is finished this has no effect besides a warning.
    pub fn process_feedback(&self, session: &mut Session) -> Result<RefinementReport> {
        self.run_step("Refinement", || self.refine_internal(session))
    }

    fn refine_internal(&self, session: &mut Session) -> Result<RefinementReport> {
        if !session.mappings_generated() {
            return Err(StandardizerError::MappingsNotGenerated);
        }

        if session.is_finished() {
            info!("Session is finished; feedback processing skipped");
            return Ok(RefinementReport {
                iteration: session.iteration(),
                refined: 0,
                unchanged: session.mappings().len(),
                failed: 0,
                stats: stats_rows(session.mappings()),
                warnings: vec![Warning::new(
                    WarningKind::FeedbackIgnored,
                    "Session is finished; feedback processing has no effect",
                )],
            });
        }

        info!(
            "Processing {} corrections (iteration {})",
            session.pending_feedback(),
            session.iteration()
        );
        let outcome = Refiner::new(self.ai_provider.as_deref(), self.config.enforce_feedback)
            .with_cancellation(&self.cancellation_token)
            .with_progress(self.progress_reporter.as_deref())
            .refine_all(session.mappings(), session.feedback())?;

        let stats = stats_rows(&outcome.mappings);
        session.complete_round(outcome.mappings);

        Ok(RefinementReport {
            iteration: session.iteration(),
            refined: outcome.refined,
            unchanged: outcome.unchanged,
            failed: outcome.failed,
            stats,
            warnings: outcome.warnings,
        })
    }

    /// Mark the session's mappings as final.
    pub fn finish(&self, session: &mut Session) -> Result<()> {
        session.finish()
    }

    /// Write the mappings workbook and the cleaned data workbook.
    ///
    /// Per-workbook failures are recorded in the report; this only fails
    /// when the session is not finished.
    pub fn export(&self, session: &Session) -> Result<ExportReport> {
        self.run_step("Export", || {
            if !session.is_finished() {
                return Err(StandardizerError::SessionNotFinished);
            }
            self.report_progress(ProgressUpdate::new(
                WorkflowStage::Exporting,
                0.0,
                format!("Writing workbooks to {}", self.config.output_dir.display()),
            ));
            let report = export_all(&self.config, session.datasets(), session.mappings());
            if !report.is_complete() {
                warn!("Export finished with errors");
            }
            Ok(report)
        })
    }

    /// Run a step, reporting its completion, cancellation or failure.
    fn run_step<T>(&self, step: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        match f() {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete(format!("{step} completed")));
                Ok(result)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("{} error: {}", step, e);
                Err(e)
            }
        }
    }

    /// Check if cancellation has been requested.
    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(StandardizerError::Cancelled);
        }
        Ok(())
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Builder for creating a [`Standardizer`] instance.
///
/// Use [`Standardizer::builder()`] to get started.
///
/// # Example
///
/// ```rust,ignore
/// use cleanroom_standardizer::{CancellationToken, Standardizer, StandardizerConfig};
///
/// let token = CancellationToken::new();
///
/// let standardizer = Standardizer::builder()
///     .config(StandardizerConfig::default())
///     .cancellation_token(token)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?;
/// ```
#[derive(Default)]
pub struct StandardizerBuilder {
    config: Option<StandardizerConfig>,
    ai_provider: Option<Arc<dyn AIProvider>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(StandardizerBuilder: Send);

impl StandardizerBuilder {
    /// Set the workflow configuration.
    pub fn config(mut self, config: StandardizerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the LLM provider used for clustering, generation and refinement.
    ///
    /// Without a provider the standardizer runs in rule-based mode: columns
    /// are grouped by name, mappings start as identity mappings and
    /// corrections are applied directly.
    pub fn ai_provider(mut self, provider: Arc<dyn AIProvider>) -> Self {
        self.ai_provider = Some(provider);
        self
    }

    /// Set a progress reporter for receiving updates during each step.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use cleanroom_standardizer::{ProgressReporter, ProgressUpdate};
    /// use std::sync::Arc;
    ///
    /// struct MyReporter;
    ///
    /// impl ProgressReporter for MyReporter {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         println!("{}: {}", update.stage.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let standardizer = Standardizer::builder()
    ///     .progress_reporter(Arc::new(MyReporter))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token.
    ///
    /// Clone the token and call [`CancellationToken::cancel()`] from any
    /// thread. Mapping workers stop taking new requests and the running step
    /// returns [`StandardizerError::Cancelled`].
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the standardizer.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Standardizer, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Standardizer {
            config,
            ai_provider: self.ai_provider,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedProvider;
    use crate::io::Dataset;
    use crate::types::{ColumnGroupIdentity, ColumnRef, FeedbackEntry, GroupId, RefinementState};
    use polars::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn brand_session() -> Session {
        let mut session = Session::new();
        let sales = df![
            "Brand" => ["PEPSI MAX", "PEPSI", "  COKE ", "COCA COLA", "PEPSI"],
            "Units" => [1.0, 2.0, 3.0, 4.0, 5.0],
        ]
        .unwrap();
        let stock = df!["brand" => ["Pepsi", "Coke Zero"]].unwrap();
        session
            .add_datasets(vec![
                Dataset::new("sales.csv", "sales.csv", sales),
                Dataset::new("stock.csv", "stock.csv", stock),
            ])
            .unwrap();
        session
    }

    fn sales_brand() -> ColumnGroupIdentity {
        ColumnGroupIdentity::new(GroupId::auto(1), ColumnRef::new("sales.csv", "Brand"))
    }

    #[test]
    fn test_standardizer_builder_default() {
        let standardizer = Standardizer::builder().build().unwrap();
        assert!(!standardizer.has_ai());
        assert_eq!(standardizer.config().max_workers, 5);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = StandardizerConfig {
            max_workers: 0,
            ..StandardizerConfig::default()
        };
        assert!(Standardizer::builder().config(config).build().is_err());
    }

    #[test]
    fn test_builder_with_cancellation_token() {
        let token = CancellationToken::new();
        let standardizer = Standardizer::builder()
            .cancellation_token(token.clone())
            .build()
            .unwrap();

        assert!(standardizer.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(
            standardizer.check_cancelled(),
            Err(StandardizerError::Cancelled)
        ));
    }

    #[test]
    fn test_builder_with_progress_callback() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let standardizer = Standardizer::builder()
            .on_progress(move |_update| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        standardizer.report_progress(ProgressUpdate::new(WorkflowStage::Analyzing, 0.5, "Test"));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_analyze_without_datasets() {
        let standardizer = Standardizer::builder().build().unwrap();
        let err = standardizer.analyze(&mut Session::new()).unwrap_err();
        assert!(err.is_blocking());
    }

    #[test]
    fn test_analyze_without_text_columns() {
        let standardizer = Standardizer::builder().build().unwrap();
        let mut session = Session::new();
        let frame = df!["Units" => [1.0, 2.0]].unwrap();
        session.add_dataset(Dataset::new("n.csv", "n.csv", frame)).unwrap();

        let err = standardizer.analyze(&mut session).unwrap_err();
        assert!(matches!(err, StandardizerError::NoEligibleColumns));
    }

    #[test]
    fn test_rule_based_workflow() {
        let standardizer = Standardizer::builder().build().unwrap();
        let mut session = brand_session();

        let analysis = standardizer.analyze(&mut session).unwrap();
        assert_eq!(analysis.eligible_columns, 2);
        assert_eq!(analysis.selected.len(), 1);
        assert_eq!(analysis.selected[0].total_unique_values, 6);

        let generation = standardizer.generate_mappings(&mut session).unwrap();
        assert_eq!(generation.tasks, 2);
        assert_eq!(generation.succeeded, 2);
        assert_eq!(session.state(), Some(RefinementState::AwaitingInitialReview));

        let mapping = session.mapping(&sales_brand()).unwrap().mapping().unwrap();
        assert_eq!(mapping.originals(), vec!["PEPSI MAX", "PEPSI", "COKE", "COCA COLA"]);

        session
            .add_feedback(&sales_brand(), FeedbackEntry::new("PEPSI MAX", "PEPSI"))
            .unwrap();
        let round = standardizer.process_feedback(&mut session).unwrap();
        assert_eq!(round.iteration, 1);
        assert_eq!(round.refined, 1);
        assert_eq!(round.unchanged, 1);

        let mapping = session.mapping(&sales_brand()).unwrap().mapping().unwrap();
        assert_eq!(mapping.distinct_canonical_count(), 3);
        assert_eq!(session.state(), Some(RefinementState::Refining));
    }

    #[test]
    fn test_min_group_size_filters_singletons() {
        let config = StandardizerConfig::builder().min_auto_group_size(3).build().unwrap();
        let standardizer = Standardizer::builder().config(config).build().unwrap();
        let mut session = brand_session();

        let analysis = standardizer.analyze(&mut session).unwrap();
        assert_eq!(analysis.groups.len(), 1);
        assert!(analysis.selected.is_empty());

        let err = standardizer.generate_mappings(&mut session).unwrap_err();
        assert!(matches!(err, StandardizerError::NoGroupsSelected));
    }

    #[test]
    fn test_ai_workflow_uses_provider() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .when("YOUR CLUSTERING RESULT", "[[\"sales.csv::Brand\", \"stock.csv::brand\"]]")
                .when("\"PEPSI MAX\"", "PEPSI MAX=PEPSI\nPEPSI=PEPSI\nCOKE=COCA COLA\nCOCA COLA=COCA COLA")
                .when("\"Coke Zero\"", "ERR: upstream timeout"),
        );
        let standardizer = Standardizer::builder()
            .ai_provider(provider.clone())
            .build()
            .unwrap();
        let mut session = brand_session();

        standardizer.analyze(&mut session).unwrap();
        let generation = standardizer.generate_mappings(&mut session).unwrap();

        assert_eq!(generation.succeeded, 1);
        assert_eq!(generation.failed, 1);
        assert_eq!(provider.calls(), 3);
        let mapping = session.mapping(&sales_brand()).unwrap().mapping().unwrap();
        assert_eq!(mapping.distinct_canonical_count(), 2);
        assert_eq!(generation.stats[0].stats.reduction_percentage, 50.0);
    }

    #[test]
    fn test_regenerate_locked_after_feedback_round() {
        let standardizer = Standardizer::builder().build().unwrap();
        let mut session = brand_session();
        standardizer.analyze(&mut session).unwrap();
        standardizer.generate_mappings(&mut session).unwrap();

        assert!(matches!(
            standardizer.generate_mappings(&mut session),
            Err(StandardizerError::GroupsFrozen)
        ));
        standardizer.regenerate(&mut session).unwrap();
        assert_eq!(session.iteration(), 0);

        standardizer.process_feedback(&mut session).unwrap();
        assert!(matches!(
            standardizer.regenerate(&mut session),
            Err(StandardizerError::RegenerationLocked)
        ));
    }

    #[test]
    fn test_processing_after_finish_has_no_effect() {
        let standardizer = Standardizer::builder().build().unwrap();
        let mut session = brand_session();
        standardizer.analyze(&mut session).unwrap();
        standardizer.generate_mappings(&mut session).unwrap();
        standardizer.finish(&mut session).unwrap();

        let before = session.mappings().clone();
        let round = standardizer.process_feedback(&mut session).unwrap();

        assert_eq!(round.iteration, 0);
        assert_eq!(round.warnings[0].kind, WarningKind::FeedbackIgnored);
        assert_eq!(session.mappings(), &before);
        assert_eq!(session.state(), Some(RefinementState::Finished));
    }

    #[test]
    fn test_export_requires_finish() {
        let standardizer = Standardizer::builder().build().unwrap();
        let mut session = brand_session();
        standardizer.analyze(&mut session).unwrap();
        standardizer.generate_mappings(&mut session).unwrap();

        assert!(matches!(
            standardizer.export(&session),
            Err(StandardizerError::SessionNotFinished)
        ));
    }

    #[test]
    fn test_export_writes_both_workbooks() {
        let dir = tempfile::tempdir().unwrap();
        let config = StandardizerConfig::builder().output_dir(dir.path()).build().unwrap();
        let standardizer = Standardizer::builder().config(config).build().unwrap();
        let mut session = brand_session();
        standardizer.analyze(&mut session).unwrap();
        standardizer.generate_mappings(&mut session).unwrap();
        standardizer.finish(&mut session).unwrap();

        let report = standardizer.export(&session).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.mappings.sheets, 2);
        assert_eq!(report.cleaned.sheets, 2);
        assert!(report.mappings.path.exists());
    }

    #[test]
    fn test_cancelled_generation_reports_cancelled() {
        let token = CancellationToken::new();
        let cancelled = Arc::new(AtomicUsize::new(0));
        let cancelled_clone = cancelled.clone();
        let standardizer = Standardizer::builder()
            .cancellation_token(token.clone())
            .on_progress(move |update| {
                if update.stage == WorkflowStage::Cancelled {
                    cancelled_clone.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap();
        let mut session = brand_session();
        standardizer.analyze(&mut session).unwrap();

        token.cancel();
        let err = standardizer.generate_mappings(&mut session).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(!session.mappings_generated());
    }
}
