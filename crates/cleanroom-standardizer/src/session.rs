//! Session state for one standardization run.
//!
//! The session owns everything the workflow produces: datasets, column
//! groups, mappings, pending feedback and the refinement counter. It is
//! mutated only by the controlling thread; [`Session::reset`] rebuilds it
//! from scratch.
//!
//! Lifecycle:
//!
//! ```text
//! load -> analyze -> edit groups -> generate -> (feedback, process)* -> finish -> export
//! ```
//!
//! Groups freeze once mappings exist. Feedback can only target existing
//! mappings and is cleared after each round.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{Result, StandardizerError};
use crate::io::Dataset;
use crate::profiler::ColumnProfiler;
use crate::types::{
    ColumnGroup, ColumnGroupIdentity, ColumnRef, FeedbackEntry, GroupId, GroupKind, MappingSlot,
    RefinementState,
};

/// Explicit session context passed to every workflow step.
#[derive(Debug, Clone)]
pub struct Session {
    datasets: Vec<Dataset>,
    /// Groups selected by the last analysis, restored by `reset_groups`.
    auto_groups: Vec<ColumnGroup>,
    groups: Vec<ColumnGroup>,
    next_custom_index: usize,
    mappings: BTreeMap<ColumnGroupIdentity, MappingSlot>,
    feedback: BTreeMap<ColumnGroupIdentity, Vec<FeedbackEntry>>,
    iteration: u32,
    mappings_generated: bool,
    finished: bool,
    created_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            datasets: Vec::new(),
            auto_groups: Vec::new(),
            groups: Vec::new(),
            next_custom_index: 1,
            mappings: BTreeMap::new(),
            feedback: BTreeMap::new(),
            iteration: 0,
            mappings_generated: false,
            finished: false,
            created_at: Utc::now(),
        }
    }

    /// Discard everything and start over.
    pub fn reset(&mut self) {
        info!("Session reset");
        *self = Self::new();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ------------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------------

    /// Add loaded datasets. A dataset with an existing name replaces the old
    /// one.
    pub fn add_datasets(&mut self, datasets: impl IntoIterator<Item = Dataset>) -> Result<()> {
        self.ensure_editable()?;
        for dataset in datasets {
            match self.datasets.iter_mut().find(|d| d.name == dataset.name) {
                Some(existing) => {
                    debug!("Replacing dataset '{}'", dataset.name);
                    *existing = dataset;
                }
                None => self.datasets.push(dataset),
            }
        }
        Ok(())
    }

    pub fn add_dataset(&mut self, dataset: Dataset) -> Result<()> {
        self.add_datasets(std::iter::once(dataset))
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    /// Groups that mapping generation will run over.
    pub fn groups(&self) -> &[ColumnGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&ColumnGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// True once mappings exist; group edits are rejected from then on.
    pub fn groups_frozen(&self) -> bool {
        self.mappings_generated
    }

    /// Install the groups selected by an analysis pass. Custom groups are
    /// dropped.
    pub(crate) fn set_auto_groups(&mut self, groups: Vec<ColumnGroup>) -> Result<()> {
        self.ensure_editable()?;
        self.auto_groups = groups.clone();
        self.groups = groups;
        self.next_custom_index = 1;
        Ok(())
    }

    /// Append an empty custom group and return its id.
    pub fn add_custom_group(&mut self) -> Result<GroupId> {
        self.ensure_editable()?;
        let id = GroupId::custom(self.next_custom_index);
        self.next_custom_index += 1;
        self.groups.push(ColumnGroup::new(id, Vec::new()));
        debug!("Added {}", id);
        Ok(id)
    }

    /// Replace the columns of a group. Every column must exist; repeats are
    /// dropped.
    pub fn set_group_columns(&mut self, id: GroupId, columns: Vec<ColumnRef>) -> Result<()> {
        self.ensure_editable()?;
        for column in &columns {
            ColumnProfiler::ensure_column(&self.datasets, column)?;
        }

        let group = self
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| StandardizerError::GroupNotFound(id.to_string()))?;

        let mut unique: Vec<ColumnRef> = Vec::with_capacity(columns.len());
        for column in columns {
            if !unique.contains(&column) {
                unique.push(column);
            }
        }
        group.columns = unique;
        Ok(())
    }

    /// Add a custom group holding `columns`. Nothing is added when a column
    /// does not exist.
    pub fn add_group_with_columns(&mut self, columns: Vec<ColumnRef>) -> Result<GroupId> {
        let id = self.add_custom_group()?;
        if let Err(e) = self.set_group_columns(id, columns) {
            self.groups.retain(|g| g.id != id);
            self.next_custom_index -= 1;
            return Err(e);
        }
        Ok(id)
    }

    pub fn remove_group(&mut self, id: GroupId) -> Result<ColumnGroup> {
        self.ensure_editable()?;
        let idx = self
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| StandardizerError::GroupNotFound(id.to_string()))?;
        Ok(self.groups.remove(idx))
    }

    /// Restore the groups of the last analysis and drop custom groups.
    pub fn reset_groups(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.groups = self.auto_groups.clone();
        self.next_custom_index = 1;
        Ok(())
    }

    /// Discard generated mappings so groups can be edited and generation
    /// run again. Only allowed before any feedback round.
    pub fn reopen_groups(&mut self) -> Result<()> {
        if self.finished {
            return Err(StandardizerError::SessionFinished);
        }
        if self.iteration > 0 {
            return Err(StandardizerError::RegenerationLocked);
        }
        self.mappings.clear();
        self.feedback.clear();
        self.mappings_generated = false;
        Ok(())
    }

    /// Every (group, column) pair, in group order. Auto groups come before
    /// custom ones in the mapping table because of key ordering.
    pub fn identities(&self) -> Vec<ColumnGroupIdentity> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.columns
                    .iter()
                    .map(move |c| ColumnGroupIdentity::new(g.id, c.clone()))
            })
            .collect()
    }

    pub fn custom_group_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| g.id.kind == GroupKind::Custom)
            .count()
    }

    // ------------------------------------------------------------------------
    // Mappings and refinement state
    // ------------------------------------------------------------------------

    pub fn mappings(&self) -> &BTreeMap<ColumnGroupIdentity, MappingSlot> {
        &self.mappings
    }

    pub fn mapping(&self, identity: &ColumnGroupIdentity) -> Option<&MappingSlot> {
        self.mappings.get(identity)
    }

    /// Find a mapping key by its display label, e.g.
    /// `"Column Group 1 - sales.csv: Brand"`.
    pub fn find_identity(&self, label: &str) -> Option<&ColumnGroupIdentity> {
        let label = label.trim();
        self.mappings.keys().find(|k| k.to_string() == label)
    }

    /// Store freshly generated mappings. Resets the iteration counter and
    /// freezes the groups.
    pub(crate) fn install_mappings(&mut self, mappings: BTreeMap<ColumnGroupIdentity, MappingSlot>) {
        self.mappings = mappings;
        self.feedback.clear();
        self.iteration = 0;
        self.mappings_generated = true;
    }

    /// Store the result of a feedback round and advance the iteration.
    pub(crate) fn complete_round(&mut self, mappings: BTreeMap<ColumnGroupIdentity, MappingSlot>) {
        self.mappings = mappings;
        self.feedback.clear();
        self.iteration += 1;
        debug!("Advanced to iteration {}", self.iteration);
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn mappings_generated(&self) -> bool {
        self.mappings_generated
    }

    /// Refinement state, or `None` before mappings exist.
    pub fn state(&self) -> Option<RefinementState> {
        if !self.mappings_generated {
            None
        } else if self.finished {
            Some(RefinementState::Finished)
        } else if self.iteration == 0 {
            Some(RefinementState::AwaitingInitialReview)
        } else {
            Some(RefinementState::Refining)
        }
    }

    /// Mark the mappings as final. Calling it again has no effect.
    pub fn finish(&mut self) -> Result<()> {
        if !self.mappings_generated {
            return Err(StandardizerError::MappingsNotGenerated);
        }
        if !self.finished {
            info!("Session finished at iteration {}", self.iteration);
            self.finished = true;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Feedback
    // ------------------------------------------------------------------------

    /// Queue a correction for the next round.
    ///
    /// The original value must be an entry of the mapping. A later
    /// correction of the same value replaces the earlier one.
    pub fn add_feedback(&mut self, identity: &ColumnGroupIdentity, entry: FeedbackEntry) -> Result<()> {
        if self.finished {
            return Err(StandardizerError::SessionFinished);
        }
        if !self.mappings_generated {
            return Err(StandardizerError::MappingsNotGenerated);
        }
        let slot = self
            .mappings
            .get(identity)
            .ok_or_else(|| StandardizerError::MappingNotFound(identity.to_string()))?;

        let known = slot
            .mapping()
            .is_some_and(|m| m.contains_original(&entry.original));
        if !known {
            return Err(StandardizerError::ValueNotInMapping {
                mapping: identity.to_string(),
                value: entry.original,
            });
        }

        let pending = self.feedback.entry(identity.clone()).or_default();
        match pending.iter_mut().find(|e| e.original == entry.original) {
            Some(existing) => existing.corrected = entry.corrected,
            None => pending.push(entry),
        }
        Ok(())
    }

    pub fn feedback(&self) -> &BTreeMap<ColumnGroupIdentity, Vec<FeedbackEntry>> {
        &self.feedback
    }

    pub fn feedback_for(&self, identity: &ColumnGroupIdentity) -> &[FeedbackEntry] {
        self.feedback.get(identity).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of corrections queued for the next round.
    pub fn pending_feedback(&self) -> usize {
        self.feedback.values().map(Vec::len).sum()
    }

    pub fn clear_feedback(&mut self) {
        self.feedback.clear();
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.finished {
            return Err(StandardizerError::SessionFinished);
        }
        if self.mappings_generated {
            return Err(StandardizerError::GroupsFrozen);
        }
        Ok(())
    }
}
