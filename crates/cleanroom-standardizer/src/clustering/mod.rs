//! Column clustering.
//!
//! Both engines return a partition of the eligible columns: every column in
//! exactly one group, groups numbered from 1 in output order. Problems with
//! an LLM answer are repaired and reported as warnings; clustering itself
//! never fails.

mod ai_engine;
mod partition;
mod rule_engine;

pub use ai_engine::AiClusterer;
pub use partition::repair_partition;
pub use rule_engine::RuleBasedClusterer;

use serde::Serialize;
use tracing::debug;

use crate::types::{ColumnGroup, ColumnRef, ColumnSample, GroupId, Warning};

/// Trait for clustering engines.
pub trait ColumnClusterer: Send + Sync {
    /// Partition `columns` into groups of equivalent columns.
    fn cluster(&self, columns: &[ColumnSample]) -> ClusteringOutcome;
}

/// A partition of the eligible columns plus what was repaired on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringOutcome {
    pub groups: Vec<ColumnGroup>,
    pub warnings: Vec<Warning>,
    /// Every column became its own group because the answer was unusable.
    pub used_fallback: bool,
}

impl ClusteringOutcome {
    /// Number ordered column lists as auto groups starting at 1.
    pub(crate) fn from_partition(
        partition: Vec<Vec<ColumnRef>>,
        warnings: Vec<Warning>,
        used_fallback: bool,
    ) -> Self {
        let groups = partition
            .into_iter()
            .filter(|columns| !columns.is_empty())
            .enumerate()
            .map(|(idx, columns)| ColumnGroup::new(GroupId::auto(idx + 1), columns))
            .collect();
        Self {
            groups,
            warnings,
            used_fallback,
        }
    }

    /// One group per column, in input order.
    pub(crate) fn singletons(
        columns: &[ColumnSample],
        warnings: Vec<Warning>,
        used_fallback: bool,
    ) -> Self {
        let partition = columns.iter().map(|c| vec![c.column.clone()]).collect();
        Self::from_partition(partition, warnings, used_fallback)
    }
}

/// Cluster `columns` with `engine`.
///
/// Fewer than two columns cannot be grouped, so they are returned as
/// singletons without consulting the engine.
pub fn cluster_columns(engine: &dyn ColumnClusterer, columns: &[ColumnSample]) -> ClusteringOutcome {
    if columns.len() < 2 {
        debug!("{} eligible column(s); nothing to cluster", columns.len());
        return ClusteringOutcome::singletons(columns, Vec::new(), false);
    }
    engine.cluster(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedProvider;

    fn sample(dataset: &str, column: &str) -> ColumnSample {
        ColumnSample {
            column: ColumnRef::new(dataset, column),
            samples: vec!["x".to_string()],
            total_values: 1,
        }
    }

    #[test]
    fn test_single_column_skips_engine() {
        let provider = ScriptedProvider::new().otherwise("[[\"a.csv::Brand\"]]");
        let engine = AiClusterer::new(&provider, 20);

        let outcome = cluster_columns(&engine, &[sample("a.csv", "Brand")]);
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].id, GroupId::auto(1));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_no_columns_no_groups() {
        let outcome = cluster_columns(&RuleBasedClusterer, &[]);
        assert!(outcome.groups.is_empty());
        assert!(!outcome.used_fallback);
    }

    #[test]
    fn test_from_partition_drops_empty_and_numbers_from_one() {
        let outcome = ClusteringOutcome::from_partition(
            vec![
                vec![],
                vec![ColumnRef::new("a.csv", "x")],
                vec![ColumnRef::new("b.csv", "y")],
            ],
            Vec::new(),
            false,
        );
        let ids: Vec<GroupId> = outcome.groups.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![GroupId::auto(1), GroupId::auto(2)]);
    }
}
