//! `original=canonical` line parser.

use serde::Serialize;
use thiserror::Error;

use crate::cleaner::strip_code_fences;
use crate::types::{Mapping, MappingEntry};

/// A response from which no usable structure could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{reason}")]
pub struct ParseFailure {
    /// The unmodified response, kept for diagnostics.
    pub raw_text: String,
    pub reason: String,
}

impl ParseFailure {
    pub fn new(raw_text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            reason: reason.into(),
        }
    }
}

/// Parse a mapping response into ordered `(original, canonical)` pairs.
///
/// Code fences are stripped, each line is split on its first `=`, and both
/// sides are trimmed. Lines without `=` or with an empty side are skipped.
/// Checking the result against the value set is left to
/// [`complete_mapping`](super::complete_mapping).
pub fn parse_mapping(raw_text: &str) -> Result<Mapping, ParseFailure> {
    if raw_text.trim().is_empty() {
        return Err(ParseFailure::new(raw_text, "empty response"));
    }

    let body = strip_code_fences(raw_text);
    let entries: Vec<MappingEntry> = body
        .lines()
        .filter_map(|line| {
            let (original, canonical) = line.split_once('=')?;
            let (original, canonical) = (original.trim(), canonical.trim());
            if original.is_empty() || canonical.is_empty() {
                None
            } else {
                Some(MappingEntry::new(original, canonical))
            }
        })
        .collect();

    if entries.is_empty() {
        return Err(ParseFailure::new(
            raw_text,
            "no 'original=canonical' lines found",
        ));
    }

    Ok(Mapping::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(mapping: &Mapping) -> Vec<(&str, &str)> {
        mapping
            .entries()
            .iter()
            .map(|e| (e.original.as_str(), e.canonical.as_str()))
            .collect()
    }

    #[test]
    fn test_parse_simple_lines() {
        let mapping = parse_mapping("A=B\nC=D\n").unwrap();
        assert_eq!(pairs(&mapping), vec![("A", "B"), ("C", "D")]);
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let mapping = parse_mapping("E=MC2=PHYSICS").unwrap();
        assert_eq!(pairs(&mapping), vec![("E", "MC2=PHYSICS")]);
    }

    #[test]
    fn test_parse_trims_and_skips_invalid_lines() {
        let raw = "Here is the mapping:\n  PEPSI MAX = PEPSI \n=ORPHAN\nDANGLING=\n\nCOKE=COCA COLA";
        let mapping = parse_mapping(raw).unwrap();
        assert_eq!(
            pairs(&mapping),
            vec![("PEPSI MAX", "PEPSI"), ("COKE", "COCA COLA")]
        );
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let raw = "```\nGATORADE 5V5=GATORADE\nGATORADE=GATORADE\n```";
        let mapping = parse_mapping(raw).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.canonical_for("GATORADE 5V5"), Some("GATORADE"));
    }

    #[test]
    fn test_parse_keeps_duplicates_for_repair() {
        let mapping = parse_mapping("A=A\nA=B").unwrap();
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_parse_failure_preserves_raw_text() {
        let raw = "I could not map these values.";
        let failure = parse_mapping(raw).unwrap_err();
        assert_eq!(failure.raw_text, raw);
        assert!(failure.reason.contains("original=canonical"));
    }

    #[test]
    fn test_parse_empty_response() {
        let failure = parse_mapping("   ").unwrap_err();
        assert_eq!(failure.reason, "empty response");
    }
}
