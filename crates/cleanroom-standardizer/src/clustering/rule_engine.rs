//! Name-based column clustering used when no LLM is configured.

use tracing::debug;

use super::{ClusteringOutcome, ColumnClusterer};
use crate::types::{ColumnRef, ColumnSample};

/// Groups columns whose names match after lowercasing and dropping
/// everything but letters and digits. Groups keep discovery order.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedClusterer;

impl RuleBasedClusterer {
    /// Key two column names must share to be grouped.
    pub fn normalize_name(name: &str) -> String {
        name.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }
}

impl ColumnClusterer for RuleBasedClusterer {
    fn cluster(&self, columns: &[ColumnSample]) -> ClusteringOutcome {
        let mut keyed: Vec<(String, Vec<ColumnRef>)> = Vec::new();

        for sample in columns {
            let key = Self::normalize_name(&sample.column.column);
            match keyed.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(sample.column.clone()),
                None => keyed.push((key, vec![sample.column.clone()])),
            }
        }

        debug!(
            "Rule-based clustering: {} columns into {} groups",
            columns.len(),
            keyed.len()
        );
        ClusteringOutcome::from_partition(
            keyed.into_iter().map(|(_, members)| members).collect(),
            Vec::new(),
            false,
        )
    }
}
