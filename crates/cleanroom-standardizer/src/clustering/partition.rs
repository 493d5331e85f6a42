//! Turning a parsed clustering answer into a valid partition.

use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::ClusteringOutcome;
use crate::response::list_values;
use crate::types::{ColumnRef, ColumnSample, Warning, WarningKind};

/// Resolve labels to columns and repair the result into a partition.
///
/// A label is matched against the `dataset::column` form first, then the
/// `dataset: column` display form, then a bare column name when exactly one
/// input column has that name. Unknown and ambiguous labels are dropped as
/// hallucinations; a column listed twice stays in its first group; columns
/// the answer left out are appended as singleton groups.
pub fn repair_partition(raw_groups: Vec<Vec<String>>, columns: &[ColumnSample]) -> ClusteringOutcome {
    let mut by_label: HashMap<String, &ColumnRef> = HashMap::with_capacity(columns.len() * 2);
    let mut by_name: HashMap<&str, Vec<&ColumnRef>> = HashMap::new();
    for sample in columns {
        by_label.insert(sample.column.qualified_label(), &sample.column);
        by_label.insert(sample.column.to_string(), &sample.column);
        by_name
            .entry(sample.column.column.as_str())
            .or_default()
            .push(&sample.column);
    }

    let mut assigned: HashSet<&ColumnRef> = HashSet::with_capacity(columns.len());
    let mut hallucinated = Vec::new();
    let mut duplicated = Vec::new();
    let mut partition: Vec<Vec<ColumnRef>> = Vec::with_capacity(raw_groups.len());

    for raw_group in raw_groups {
        let mut members = Vec::new();
        for label in raw_group {
            let label = label.trim();
            if let Some(column) = by_label.get(label) {
                if assigned.insert(*column) {
                    members.push((*column).clone());
                } else {
                    duplicated.push(label.to_string());
                }
            } else if let Some([column]) = by_name.get(label).map(Vec::as_slice) {
                if assigned.insert(*column) {
                    members.push((*column).clone());
                } else {
                    duplicated.push(label.to_string());
                }
            } else {
                hallucinated.push(label.to_string());
            }
        }
        partition.push(members);
    }

    let missing: Vec<&ColumnRef> = columns
        .iter()
        .map(|s| &s.column)
        .filter(|c| !assigned.contains(c))
        .collect();

    let mut warnings = Vec::new();
    if !hallucinated.is_empty() {
        warn!("Clustering named {} unknown column(s)", hallucinated.len());
        warnings.push(Warning::new(
            WarningKind::HallucinatedColumn,
            format!(
                "Dropped {} unknown column(s): {}",
                hallucinated.len(),
                list_values(&hallucinated)
            ),
        ));
    }
    if !duplicated.is_empty() {
        warn!("Clustering repeated {} column(s)", duplicated.len());
        warnings.push(Warning::new(
            WarningKind::DuplicateColumn,
            format!(
                "Kept the first group for {} repeated column(s): {}",
                duplicated.len(),
                list_values(&duplicated)
            ),
        ));
    }
    if !missing.is_empty() {
        let labels: Vec<String> = missing.iter().map(|c| c.qualified_label()).collect();
        warn!("Clustering left out {} column(s)", missing.len());
        warnings.push(Warning::new(
            WarningKind::MissingColumn,
            format!(
                "Added {} missing column(s) as their own groups: {}",
                missing.len(),
                list_values(&labels)
            ),
        ));
    }

    partition.extend(missing.into_iter().map(|c| vec![c.clone()]));
    ClusteringOutcome::from_partition(partition, warnings, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupId;
    use pretty_assertions::assert_eq;

    fn sample(dataset: &str, column: &str) -> ColumnSample {
        ColumnSample {
            column: ColumnRef::new(dataset, column),
            samples: Vec::new(),
            total_values: 0,
        }
    }

    fn columns() -> Vec<ColumnSample> {
        vec![
            sample("a.csv", "Brand"),
            sample("b.csv", "brand_name"),
            sample("a.csv", "Region"),
        ]
    }

    fn labels(outcome: &ClusteringOutcome) -> Vec<Vec<String>> {
        outcome
            .groups
            .iter()
            .map(|g| g.columns.iter().map(|c| c.qualified_label()).collect())
            .collect()
    }

    fn raw(groups: &[&[&str]]) -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|g| g.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_exact_partition_no_warnings() {
        let outcome = repair_partition(
            raw(&[&["a.csv::Brand", "b.csv::brand_name"], &["a.csv::Region"]]),
            &columns(),
        );
        assert_eq!(
            labels(&outcome),
            vec![
                vec!["a.csv::Brand", "b.csv::brand_name"],
                vec!["a.csv::Region"]
            ]
        );
        assert!(outcome.warnings.is_empty());
        assert!(!outcome.used_fallback);
    }

    #[test]
    fn test_missing_column_becomes_singleton() {
        let outcome = repair_partition(raw(&[&["a.csv::Brand", "b.csv::brand_name"]]), &columns());

        assert_eq!(outcome.groups.len(), 2);
        assert_eq!(outcome.groups[1].id, GroupId::auto(2));
        assert_eq!(labels(&outcome)[1], vec!["a.csv::Region"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::MissingColumn);
    }

    #[test]
    fn test_hallucinated_column_dropped() {
        let outcome = repair_partition(
            raw(&[
                &["a.csv::Brand", "c.csv::Maker", "b.csv::brand_name"],
                &["a.csv::Region"],
            ]),
            &columns(),
        );

        assert_eq!(labels(&outcome)[0], vec!["a.csv::Brand", "b.csv::brand_name"]);
        assert_eq!(outcome.groups.len(), 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::HallucinatedColumn);
        assert!(outcome.warnings[0].message.contains("c.csv::Maker"));
    }

    #[test]
    fn test_duplicate_column_keeps_first_group() {
        let outcome = repair_partition(
            raw(&[
                &["a.csv::Brand", "b.csv::brand_name"],
                &["a.csv::Brand", "a.csv::Region"],
            ]),
            &columns(),
        );

        assert_eq!(labels(&outcome)[1], vec!["a.csv::Region"]);
        assert_eq!(outcome.warnings[0].kind, WarningKind::DuplicateColumn);
    }

    #[test]
    fn test_bare_and_display_labels_resolve() {
        let outcome = repair_partition(
            raw(&[&["Brand", "b.csv: brand_name"], &["Region"]]),
            &columns(),
        );
        assert_eq!(
            labels(&outcome),
            vec![
                vec!["a.csv::Brand", "b.csv::brand_name"],
                vec!["a.csv::Region"]
            ]
        );
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_ambiguous_bare_label_is_dropped() {
        let mut shared = columns();
        shared.push(sample("b.csv", "Region"));

        let outcome = repair_partition(
            raw(&[&["a.csv::Brand", "b.csv::brand_name"], &["Region"]]),
            &shared,
        );

        assert_eq!(
            labels(&outcome),
            vec![
                vec!["a.csv::Brand", "b.csv::brand_name"],
                vec!["a.csv::Region"],
                vec!["b.csv::Region"]
            ]
        );
        let kinds: Vec<WarningKind> = outcome.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::HallucinatedColumn, WarningKind::MissingColumn]);
        assert!(outcome.warnings[0].message.contains("Region"));
    }

    #[test]
    fn test_group_of_only_unknowns_removed() {
        let outcome = repair_partition(
            raw(&[&["ghost"], &["a.csv::Brand", "b.csv::brand_name", "a.csv::Region"]]),
            &columns(),
        );
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].id, GroupId::auto(1));
        assert_eq!(outcome.groups[0].len(), 3);
    }
}
