//! Parsing and repair of free-text LLM responses.
//!
//! Parsing is a tagged result: either a structure was recovered or a
//! [`ParseFailure`] carries the raw text and a reason. Repairs run as
//! explicit stages afterwards and report what they changed as warnings.

mod clusters;
mod mapping;
mod repair;

pub use clusters::parse_cluster_response;
pub use mapping::{ParseFailure, parse_mapping};
pub use repair::{MappingResolution, complete_mapping, enforce_feedback, resolve_mapping};

/// Longest raw-text excerpt kept in a warning message.
const RAW_PREVIEW_LEN: usize = 200;

/// Shorten `text` for a log line or warning.
pub(crate) fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(RAW_PREVIEW_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Render a short list of values for a warning message.
pub(crate) fn list_values(values: &[String]) -> String {
    const SHOWN: usize = 5;
    let quoted: Vec<String> = values.iter().take(SHOWN).map(|v| format!("'{v}'")).collect();
    if values.len() > SHOWN {
        format!("{} and {} more", quoted.join(", "), values.len() - SHOWN)
    } else {
        quoted.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        let short = preview(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), RAW_PREVIEW_LEN + 3);
        assert_eq!(preview("  ok "), "ok");
    }

    #[test]
    fn test_list_values() {
        let values: Vec<String> = (1..=7).map(|i| format!("v{i}")).collect();
        assert_eq!(
            list_values(&values),
            "'v1', 'v2', 'v3', 'v4', 'v5' and 2 more"
        );
        assert_eq!(list_values(&values[..2]), "'v1', 'v2'");
    }
}
