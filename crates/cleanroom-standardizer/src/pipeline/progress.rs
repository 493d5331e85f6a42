//! Progress reporting and cancellation for the standardization workflow.
//!
//! The workflow is driven one step at a time (load, analyze, generate, any
//! number of refinement rounds, export), so progress is reported per step:
//! `progress` is the fraction of the current step, not of the session.
//! Mapping generation is the long step. Each finished request produces an
//! update, and a shared [`CancellationToken`] stops workers from taking new
//! requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use cleanroom_standardizer::{CancellationToken, Standardizer};
//!
//! let token = CancellationToken::new();
//! let standardizer = Standardizer::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Workflow step an update belongs to, or how the step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Loading,
    /// Profiling columns and clustering them into groups
    Analyzing,
    /// Requesting initial mappings
    Generating,
    /// Applying a feedback round
    Refining,
    Exporting,
    Complete,
    Cancelled,
    Failed,
}

impl WorkflowStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Files",
            Self::Analyzing => "Clustering Columns",
            Self::Generating => "Generating Mappings",
            Self::Refining => "Applying Feedback",
            Self::Exporting => "Writing Workbooks",
            Self::Complete => "Done",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Whether the update closes a step.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Failed)
    }
}

/// Position within a step that works through a list of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub done: usize,
    pub total: usize,
}

/// One progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: WorkflowStage,
    /// Fraction of the current step, 0.0 to 1.0.
    pub progress: f32,
    pub message: String,
    /// What the update is about, e.g. `"Column Group 1 - sales.csv: Brand"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemCount>,
}

impl ProgressUpdate {
    pub fn new(stage: WorkflowStage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            subject: None,
            items: None,
        }
    }

    /// Update after `done` of `total` items; progress is `done / total`.
    pub fn with_items(
        stage: WorkflowStage,
        subject: impl Into<String>,
        done: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let fraction = if total == 0 { 0.0 } else { done as f32 / total as f32 };
        Self {
            subject: Some(subject.into()),
            items: Some(ItemCount { done, total }),
            ..Self::new(stage, fraction, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(WorkflowStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(WorkflowStage::Cancelled, 0.0, "Cancelled by user")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(WorkflowStage::Failed, 0.0, message)
    }
}

/// Receives progress updates.
///
/// Updates are sent from the thread that drives the workflow; mapping
/// workers never report directly.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F> {
    callback: F,
}

impl<F: Fn(ProgressUpdate) + Send + Sync> ClosureProgressReporter<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: Fn(ProgressUpdate) + Send + Sync> ProgressReporter for ClosureProgressReporter<F> {
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update)
    }
}

/// Cancels running work from another thread.
///
/// Clones share one flag. Mapping workers check it before taking each
/// request; requests already in flight run to completion. Once set the flag
/// stays set, so a cancelled standardizer needs a fresh token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
