//! Core data types shared across the standardizer.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::StandardizerError;
use crate::reporting::MappingStats;

// =============================================================================
// Columns and groups
// =============================================================================

/// A column in one dataset.
///
/// Column names repeat across datasets, so the dataset name is part of the
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub dataset: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(dataset: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            column: column.into(),
        }
    }

    /// Label used to name this column in a clustering prompt.
    pub fn qualified_label(&self) -> String {
        format!("{}::{}", self.dataset, self.column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.dataset, self.column)
    }
}

/// Parses `dataset::column` or the display form `dataset: column`.
impl FromStr for ColumnRef {
    type Err = StandardizerError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let label = label.trim();
        let (dataset, column) = label
            .split_once("::")
            .or_else(|| label.split_once(": "))
            .map(|(d, c)| (d.trim(), c.trim()))
            .filter(|(d, c)| !d.is_empty() && !c.is_empty())
            .ok_or_else(|| StandardizerError::InvalidColumnLabel(label.to_string()))?;
        Ok(Self::new(dataset, column))
    }
}

/// A column reference with the canonicalized samples used for clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSample {
    pub column: ColumnRef,
    pub samples: Vec<String>,
    /// Count of all non-null string values in the column.
    pub total_values: usize,
}

/// Where a group came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// Produced by the clustering engine.
    Auto,
    /// Created by the user.
    Custom,
}

/// Stable identity of a column group.
///
/// The index is 1-based and assigned when the group is created; it is never
/// recomputed from a display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId {
    pub kind: GroupKind,
    pub index: usize,
}

impl GroupId {
    pub fn auto(index: usize) -> Self {
        Self {
            kind: GroupKind::Auto,
            index,
        }
    }

    pub fn custom(index: usize) -> Self {
        Self {
            kind: GroupKind::Custom,
            index,
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            GroupKind::Auto => write!(f, "Column Group {}", self.index),
            GroupKind::Custom => write!(f, "Custom Column Group {}", self.index),
        }
    }
}

/// An ordered set of columns treated as semantically equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnGroup {
    pub id: GroupId,
    pub columns: Vec<ColumnRef>,
}

impl ColumnGroup {
    pub fn new(id: GroupId, columns: Vec<ColumnRef>) -> Self {
        Self { id, columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &ColumnRef) -> bool {
        self.columns.contains(column)
    }
}

/// Key of a mapping: one column inside one group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnGroupIdentity {
    pub group: GroupId,
    pub column: ColumnRef,
}

impl ColumnGroupIdentity {
    pub fn new(group: GroupId, column: ColumnRef) -> Self {
        Self { group, column }
    }
}

impl fmt::Display for ColumnGroupIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.group, self.column)
    }
}

// =============================================================================
// Mappings
// =============================================================================

/// One `original -> canonical` assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub original: String,
    pub canonical: String,
}

impl MappingEntry {
    pub fn new(original: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            canonical: canonical.into(),
        }
    }
}

/// An ordered list of mapping entries for one value set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    entries: Vec<MappingEntry>,
}

impl Mapping {
    pub fn new(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    /// Every value maps to itself.
    pub fn identity(values: &[String]) -> Self {
        Self {
            entries: values
                .iter()
                .map(|v| MappingEntry::new(v.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<MappingEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn originals(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.original.clone()).collect()
    }

    pub fn contains_original(&self, original: &str) -> bool {
        self.entries.iter().any(|e| e.original == original)
    }

    pub fn canonical_for(&self, original: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.original == original)
            .map(|e| e.canonical.as_str())
    }

    /// Replace the canonical value of `original`. Returns false if absent.
    pub fn set_canonical(&mut self, original: &str, canonical: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.original == original) {
            Some(entry) => {
                entry.canonical = canonical.to_string();
                true
            }
            None => false,
        }
    }

    pub fn distinct_canonical_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.canonical.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Canonical values that are not themselves original values.
    pub fn out_of_domain_canonicals(&self) -> Vec<String> {
        let domain: HashSet<&str> = self.entries.iter().map(|e| e.original.as_str()).collect();
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| !domain.contains(e.canonical.as_str()))
            .filter(|e| seen.insert(e.canonical.as_str()))
            .map(|e| e.canonical.clone())
            .collect()
    }

    /// Lookup table from original to canonical value.
    pub fn as_lookup(&self) -> HashMap<&str, &str> {
        self.entries
            .iter()
            .map(|e| (e.original.as_str(), e.canonical.as_str()))
            .collect()
    }

    /// `original=canonical` lines, the wire format used in prompts.
    pub fn to_lines(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}={}", e.original, e.canonical))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn stats(&self) -> MappingStats {
        MappingStats::new(self.len(), self.distinct_canonical_count())
    }
}

/// Result slot for one mapping task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MappingSlot {
    Ready { mapping: Mapping },
    Failed { error: String },
}

impl MappingSlot {
    pub fn ready(mapping: Mapping) -> Self {
        Self::Ready { mapping }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Ready { mapping } => Some(mapping),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A reviewer correction against one mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub original: String,
    pub corrected: String,
}

impl FeedbackEntry {
    pub fn new(original: impl Into<String>, corrected: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            corrected: corrected.into(),
        }
    }
}

// =============================================================================
// Workflow state and diagnostics
// =============================================================================

/// State of the refinement loop once mappings exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefinementState {
    /// Iteration 0, no feedback processed yet.
    AwaitingInitialReview,
    /// At least one feedback round processed.
    Refining,
    /// Terminal.
    Finished,
}

impl fmt::Display for RefinementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AwaitingInitialReview => "awaiting initial review",
            Self::Refining => "refining",
            Self::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// Category of a repaired or tolerated problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Eligible column absent from the clustering response.
    MissingColumn,
    /// Clustering response named a column that does not exist.
    HallucinatedColumn,
    /// Clustering response listed a column more than once.
    DuplicateColumn,
    /// Clustering response was unusable; every column became its own group.
    ClusteringFallback,
    /// Mapping response omitted original values.
    MissingValues,
    /// Mapping response contained values outside the value set.
    UnknownValues,
    /// Mapping response listed an original value more than once.
    DuplicateValues,
    /// Canonical value is not one of the original values.
    InventedCanonical,
    /// No usable mapping lines; identity mapping used instead.
    UnparseableResponse,
    /// A mapping request failed.
    TaskFailed,
    /// A refinement request failed; the previous mapping was kept.
    RefinementFailed,
    /// The model ignored a correction and it was re-applied.
    FeedbackEnforced,
    /// Feedback referenced a mapping or value that could not be used.
    FeedbackIgnored,
    /// A workbook or sheet could not be written.
    ExportFailed,
    /// A column was skipped for lack of values.
    EmptyColumn,
}

/// A non-fatal problem that was repaired or skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: None,
            message: message.into(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "[{}] {}", subject, self.message),
            None => f.write_str(&self.message),
        }
    }
}
