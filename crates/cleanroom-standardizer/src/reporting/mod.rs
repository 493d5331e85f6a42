//! Reports returned by each workflow step.
//!
//! Every step returns a serializable report so the CLI can print a summary
//! or emit JSON without reaching into the session.
//!
//! # Example
//!
//! ```rust,ignore
//! use cleanroom_standardizer::reporting::SessionReport;
//!
//! let report = SessionReport::from_session(&session);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::io::DatasetSummary;
use crate::session::Session;
use crate::types::{
    ColumnGroup, ColumnGroupIdentity, MappingSlot, RefinementState, Warning,
};

// ============================================================================
// Statistics
// ============================================================================

/// How much a mapping shrinks its value set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MappingStats {
    /// Number of original values.
    pub original_count: usize,
    /// Number of distinct canonical values.
    pub standardized_count: usize,
    pub reduction: usize,
    /// Reduction as a percentage of the original count, one decimal.
    pub reduction_percentage: f64,
}

impl MappingStats {
    pub fn new(original_count: usize, standardized_count: usize) -> Self {
        let reduction = original_count.saturating_sub(standardized_count);
        let reduction_percentage = if original_count == 0 {
            0.0
        } else {
            (reduction as f64 / original_count as f64 * 1000.0).round() / 10.0
        };
        Self {
            original_count,
            standardized_count,
            reduction,
            reduction_percentage,
        }
    }
}

/// Stats of one mapping, labelled by its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingStatsRow {
    pub key: String,
    pub stats: MappingStats,
}

/// Stats rows for every ready slot, in key order.
pub fn stats_rows<'a>(
    slots: impl IntoIterator<Item = (&'a ColumnGroupIdentity, &'a MappingSlot)>,
) -> Vec<MappingStatsRow> {
    slots
        .into_iter()
        .filter_map(|(identity, slot)| {
            slot.mapping().map(|mapping| MappingStatsRow {
                key: identity.to_string(),
                stats: mapping.stats(),
            })
        })
        .collect()
}

// ============================================================================
// Step reports
// ============================================================================

/// Overview of one column group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Display name, e.g. "Column Group 1".
    pub name: String,
    /// `"<dataset>: <column>"` per column.
    pub columns: Vec<String>,
    /// Distinct canonicalized values across all columns of the group.
    pub total_unique_values: usize,
    /// One line per column with its first few values.
    pub samples: Vec<String>,
}

/// Result of analyzing the loaded datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub datasets: Vec<DatasetSummary>,
    pub eligible_columns: usize,
    /// Every detected group, including singletons.
    pub groups: Vec<ColumnGroup>,
    /// Summaries of the groups selected for mapping generation.
    pub selected: Vec<GroupSummary>,
    /// True when clustering failed and every column became its own group.
    pub used_fallback: bool,
    pub warnings: Vec<Warning>,
}

/// Result of the initial mapping generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Columns without any value; no mapping was requested for them.
    pub skipped_empty: usize,
    pub stats: Vec<MappingStatsRow>,
    pub warnings: Vec<Warning>,
    pub duration_ms: u64,
}

/// Result of one feedback round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementReport {
    /// Iteration reached by this round.
    pub iteration: u32,
    /// Mappings re-requested with feedback.
    pub refined: usize,
    /// Mappings without feedback, passed through unchanged.
    pub unchanged: usize,
    /// Refinements that failed and kept the previous mapping.
    pub failed: usize,
    pub stats: Vec<MappingStatsRow>,
    pub warnings: Vec<Warning>,
}

/// One mapping in the session report.
#[derive(Debug, Clone, Serialize)]
pub struct MappingRecord {
    pub key: ColumnGroupIdentity,
    pub label: String,
    pub slot: MappingSlot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MappingStats>,
}

/// Snapshot of a whole session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub generated_at: String,
    pub session_started_at: String,
    pub state: Option<RefinementState>,
    pub iteration: u32,
    pub datasets: Vec<DatasetSummary>,
    pub groups: Vec<ColumnGroup>,
    pub mappings: Vec<MappingRecord>,
}

impl SessionReport {
    pub fn from_session(session: &Session) -> Self {
        let mappings = session
            .mappings()
            .iter()
            .map(|(key, slot)| MappingRecord {
                key: key.clone(),
                label: key.to_string(),
                slot: slot.clone(),
                stats: slot.mapping().map(|m| m.stats()),
            })
            .collect();

        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            session_started_at: session.created_at().to_rfc3339(),
            state: session.state(),
            iteration: session.iteration(),
            datasets: session.datasets().iter().map(|d| d.summary()).collect(),
            groups: session.groups().to_vec(),
            mappings,
        }
    }

    /// Total original and canonical value counts over all ready mappings.
    pub fn totals(&self) -> MappingStats {
        let (original, standardized) = self
            .mappings
            .iter()
            .filter_map(|record| record.stats)
            .fold((0, 0), |(o, s), stats| {
                (o + stats.original_count, s + stats.standardized_count)
            });
        MappingStats::new(original, standardized)
    }
}
