//! LLM-backed column clustering.

use tracing::{info, warn};

use super::{ClusteringOutcome, ColumnClusterer, repair_partition};
use crate::ai::AIProvider;
use crate::prompts::clustering_prompt;
use crate::response::{parse_cluster_response, preview};
use crate::types::{ColumnSample, Warning, WarningKind};

/// Clusters columns by asking an LLM to group them.
///
/// # Example
///
/// ```rust,ignore
/// use cleanroom_standardizer::ai::OpenRouterProvider;
/// use cleanroom_standardizer::clustering::{AiClusterer, cluster_columns};
///
/// let provider = OpenRouterProvider::new("api-key")?;
/// let engine = AiClusterer::new(&provider, 20);
/// let outcome = cluster_columns(&engine, &columns);
/// ```
pub struct AiClusterer<'a> {
    ai_provider: &'a dyn AIProvider,
    prompt_sample_size: usize,
}

impl<'a> AiClusterer<'a> {
    pub fn new(ai_provider: &'a dyn AIProvider, prompt_sample_size: usize) -> Self {
        Self {
            ai_provider,
            prompt_sample_size,
        }
    }

    fn fallback(columns: &[ColumnSample], reason: String) -> ClusteringOutcome {
        warn!("Clustering fell back to one group per column: {}", reason);
        let warning = Warning::new(
            WarningKind::ClusteringFallback,
            format!("Clustering failed ({reason}); every column is its own group"),
        );
        ClusteringOutcome::singletons(columns, vec![warning], true)
    }
}

impl ColumnClusterer for AiClusterer<'_> {
    fn cluster(&self, columns: &[ColumnSample]) -> ClusteringOutcome {
        let prompt = clustering_prompt(columns, self.prompt_sample_size);
        info!(
            "Requesting clustering of {} columns from {}",
            columns.len(),
            self.ai_provider.name()
        );

        let raw = match self.ai_provider.complete(&prompt) {
            Ok(raw) => raw,
            Err(e) => return Self::fallback(columns, format!("request failed: {e}")),
        };

        match parse_cluster_response(&raw) {
            Ok(groups) => {
                let outcome = repair_partition(groups, columns);
                info!("Clustering produced {} groups", outcome.groups.len());
                outcome
            }
            Err(failure) => Self::fallback(
                columns,
                format!("{}; response was: {}", failure.reason, preview(&raw)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedProvider;
    use crate::types::{ColumnRef, GroupId};

    fn columns() -> Vec<ColumnSample> {
        ["Brand", "brand_name", "Region"]
            .iter()
            .zip(["a.csv", "b.csv", "a.csv"])
            .map(|(column, dataset)| ColumnSample {
                column: ColumnRef::new(dataset, *column),
                samples: vec!["COKE".to_string()],
                total_values: 1,
            })
            .collect()
    }

    #[test]
    fn test_cluster_with_valid_response() {
        let provider = ScriptedProvider::new().otherwise(
            "```json\n[[\"a.csv::Brand\", \"b.csv::brand_name\"], [\"a.csv::Region\"]]\n```",
        );
        let engine = AiClusterer::new(&provider, 20);

        let outcome = engine.cluster(&columns());
        assert_eq!(outcome.groups.len(), 2);
        assert_eq!(outcome.groups[0].len(), 2);
        assert!(outcome.warnings.is_empty());
        assert!(provider.prompts()[0].contains("Column: 'a.csv::Brand'"));
    }

    #[test]
    fn test_bare_string_group_is_repaired_as_missing() {
        let provider =
            ScriptedProvider::new().otherwise(r#"[["a.csv::Brand", "b.csv::brand_name"], "a.csv::Region"]"#);
        let engine = AiClusterer::new(&provider, 20);

        let outcome = engine.cluster(&columns());
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.groups.len(), 2);
        assert_eq!(outcome.groups[1].columns, vec![ColumnRef::new("a.csv", "Region")]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::MissingColumn);
    }

    #[test]
    fn test_cluster_malformed_response_falls_back() {
        let provider = ScriptedProvider::new().otherwise("Here are your groups: Brand and Region");
        let engine = AiClusterer::new(&provider, 20);

        let outcome = engine.cluster(&columns());
        assert!(outcome.used_fallback);
        assert_eq!(outcome.groups.len(), 3);
        assert_eq!(outcome.groups[2].id, GroupId::auto(3));
        assert_eq!(outcome.warnings[0].kind, WarningKind::ClusteringFallback);
        assert!(outcome.warnings[0].message.contains("Here are your groups"));
    }

    #[test]
    fn test_cluster_transport_error_falls_back() {
        let provider = ScriptedProvider::new().otherwise("ERR: connection reset");
        let engine = AiClusterer::new(&provider, 20);

        let outcome = engine.cluster(&columns());
        assert!(outcome.used_fallback);
        assert_eq!(outcome.groups.len(), 3);
        assert!(outcome.warnings[0].message.contains("connection reset"));
    }
}
