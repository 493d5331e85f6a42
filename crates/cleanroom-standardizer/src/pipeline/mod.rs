//! Pipeline module.
//!
//! This module provides the standardizer and the components it drives:
//! the concurrent mapping executor and the feedback refiner.

mod builder;
mod executor;
pub mod progress;
mod refinement;

pub use builder::{Standardizer, StandardizerBuilder};
pub use executor::{GenerationOutcome, MappingExecutor, MappingTask};
pub use progress::{
    CancellationToken, ClosureProgressReporter, ItemCount, ProgressReporter, ProgressUpdate,
    WorkflowStage,
};
pub use refinement::{Refiner, RefinementDisposition, RoundOutcome};
