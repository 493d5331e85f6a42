//! Clustering response parser.

use serde_json::Value;
use tracing::debug;

use super::ParseFailure;
use crate::cleaner::strip_code_fences;

/// Parse a JSON array of arrays of column labels.
///
/// Top-level elements that are not arrays (bare strings included) are
/// skipped, which leaves their columns to the missing-column repair.
/// Non-string labels are rendered as text so the resolver can report them.
/// Anything that is not a JSON array is a total failure.
pub fn parse_cluster_response(raw_text: &str) -> Result<Vec<Vec<String>>, ParseFailure> {
    let body = strip_code_fences(raw_text);
    if body.is_empty() {
        return Err(ParseFailure::new(raw_text, "empty response"));
    }

    let value: Value = serde_json::from_str(&body)
        .map_err(|e| ParseFailure::new(raw_text, format!("invalid JSON: {e}")))?;

    let Value::Array(groups) = value else {
        return Err(ParseFailure::new(raw_text, "expected a JSON array of arrays"));
    };

    let mut parsed = Vec::with_capacity(groups.len());
    for group in groups {
        match group {
            Value::Array(items) => parsed.push(items.into_iter().map(label_text).collect()),
            other => debug!("Skipping non-list clustering element: {}", other),
        }
    }

    Ok(parsed)
}

fn label_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_list() {
        let raw = r#"[["a.csv::Brand", "b.csv::Brand Name"], ["a.csv::Region"]]"#;
        let groups = parse_cluster_response(raw).unwrap();
        assert_eq!(
            groups,
            vec![
                vec!["a.csv::Brand".to_string(), "b.csv::Brand Name".to_string()],
                vec!["a.csv::Region".to_string()],
            ]
        );
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n[[\"x\"], [\"y\", \"z\"]]\n```";
        assert_eq!(parse_cluster_response(raw).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_skips_non_list_elements() {
        let raw = r#"[["x", 7], "y", {"bad": true}]"#;
        let groups = parse_cluster_response(raw).unwrap();
        assert_eq!(groups, vec![vec!["x".to_string(), "7".to_string()]]);
    }

    #[test]
    fn test_parse_rejects_prose() {
        let failure = parse_cluster_response("Here are the groups: Brand and Region").unwrap_err();
        assert!(failure.reason.starts_with("invalid JSON"));
        assert!(failure.raw_text.contains("Here are the groups"));
    }

    #[test]
    fn test_parse_rejects_object() {
        let failure = parse_cluster_response(r#"{"groups": []}"#).unwrap_err();
        assert_eq!(failure.reason, "expected a JSON array of arrays");
    }
}
