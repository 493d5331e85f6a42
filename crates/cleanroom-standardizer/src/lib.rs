//! Cleanroom Standardizer Library
//!
//! LLM-assisted standardization of inconsistent string values (brand names,
//! categories, regions) across several tabular datasets.
//!
//! # Overview
//!
//! - **Column Profiling**: finds the predominantly-text columns of every dataset
//! - **Column Clustering**: groups equivalent columns across datasets, repairing
//!   whatever the model gets wrong
//! - **Mapping Generation**: one `original=canonical` mapping per column, requested
//!   concurrently on a bounded worker pool
//! - **Refinement**: reviewer corrections are fed back round after round until the
//!   session is finished
//! - **Export**: a mappings workbook and a cleaned-data workbook with
//!   `<column>_standardized` columns
//! - **Rule-Based Mode**: runs without an LLM, grouping by column name and
//!   applying corrections directly
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cleanroom_standardizer::{FeedbackEntry, Session, Standardizer};
//! use cleanroom_standardizer::ai::OpenRouterProvider;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(OpenRouterProvider::new(api_key)?);
//! let standardizer = Standardizer::builder()
//!     .ai_provider(provider)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! let mut session = Session::new();
//! standardizer.load_files(&mut session, &["sales.csv".into(), "stock.xlsx".into()], &[])?;
//! let analysis = standardizer.analyze(&mut session)?;
//! let generation = standardizer.generate_mappings(&mut session)?;
//!
//! let key = session.mappings().keys().next().cloned().unwrap();
//! session.add_feedback(&key, FeedbackEntry::new("PEPSI MAX", "PEPSI"))?;
//! standardizer.process_feedback(&mut session)?;
//!
//! standardizer.finish(&mut session)?;
//! let export = standardizer.export(&session)?;
//! ```
//!
//! # AI Providers
//!
//! - [`ai::OpenRouterProvider`] - OpenRouter API
//! - [`ai::GeminiProvider`] - Google Gemini API
//!
//! To implement your own provider, see the [`ai`] module documentation.

pub mod ai;
pub mod cleaner;
pub mod clustering;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod profiler;
pub mod prompts;
pub mod reporting;
pub mod response;
pub mod session;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{canonicalize, canonicalize_cell};
pub use clustering::{
    AiClusterer, ClusteringOutcome, ColumnClusterer, RuleBasedClusterer, cluster_columns,
};
pub use config::{ConfigValidationError, StandardizerConfig, StandardizerConfigBuilder};
pub use error::{Result as StandardizerResult, ResultExt, StandardizerError};
pub use io::{Dataset, DatasetSummary, ExportReport};
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, ItemCount, MappingExecutor, ProgressReporter,
    ProgressUpdate, Refiner, Standardizer, StandardizerBuilder, WorkflowStage,
};
pub use profiler::ColumnProfiler;
pub use reporting::{
    AnalysisReport, GenerationReport, GroupSummary, MappingStats, RefinementReport, SessionReport,
};
pub use response::{ParseFailure, complete_mapping, parse_mapping, resolve_mapping};
pub use session::Session;
pub use types::{
    ColumnGroup, ColumnGroupIdentity, ColumnRef, ColumnSample, FeedbackEntry, GroupId, GroupKind,
    Mapping, MappingEntry, MappingSlot, RefinementState, Warning, WarningKind,
};
