//! Repair stages applied to a parsed mapping.
//!
//! Order matters: unknown originals are dropped first, then duplicates, then
//! missing originals are appended as self-mapped entries. Invented canonical
//! values are only flagged.

use std::collections::HashSet;
use tracing::{debug, warn};

use super::{ParseFailure, list_values, parse_mapping, preview};
use crate::types::{FeedbackEntry, Mapping, MappingEntry, Warning, WarningKind};

/// A mapping that covers its value set exactly, plus what was repaired.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingResolution {
    pub mapping: Mapping,
    pub warnings: Vec<Warning>,
    /// Set when the response was unusable and the identity mapping was used.
    pub parse_failure: Option<ParseFailure>,
}

/// Bring a parsed mapping into exact agreement with `expected`.
///
/// After this call the originals are exactly `expected`: unknown ones are
/// dropped, repeats keep their first entry and missing values are appended
/// mapped to themselves, in `expected` order.
pub fn complete_mapping(
    parsed: Mapping,
    expected: &[String],
    subject: &str,
) -> (Mapping, Vec<Warning>) {
    let domain: HashSet<&str> = expected.iter().map(String::as_str).collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(expected.len());
    let mut unknown = Vec::new();
    let mut duplicated = Vec::new();
    let mut kept = Vec::with_capacity(expected.len());

    for entry in parsed.into_entries() {
        if !domain.contains(entry.original.as_str()) {
            unknown.push(entry.original);
        } else if !seen.insert(entry.original.clone()) {
            duplicated.push(entry.original);
        } else {
            kept.push(entry);
        }
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|v| !seen.contains(v.as_str()))
        .cloned()
        .collect();
    kept.extend(missing.iter().map(|v| MappingEntry::new(v.clone(), v.clone())));

    let mapping = Mapping::new(kept);
    let mut warnings = Vec::new();

    if !unknown.is_empty() {
        warn!("{}: dropped {} unknown values", subject, unknown.len());
        warnings.push(
            Warning::new(
                WarningKind::UnknownValues,
                format!(
                    "Dropped {} value(s) not in the input: {}",
                    unknown.len(),
                    list_values(&unknown)
                ),
            )
            .with_subject(subject),
        );
    }

    if !duplicated.is_empty() {
        warn!("{}: dropped {} duplicate entries", subject, duplicated.len());
        warnings.push(
            Warning::new(
                WarningKind::DuplicateValues,
                format!(
                    "Kept the first entry for {} repeated value(s): {}",
                    duplicated.len(),
                    list_values(&duplicated)
                ),
            )
            .with_subject(subject),
        );
    }

    if !missing.is_empty() {
        warn!("{}: {} values missing, mapped to themselves", subject, missing.len());
        warnings.push(
            Warning::new(
                WarningKind::MissingValues,
                format!(
                    "{} value(s) missing from the response were mapped to themselves: {}",
                    missing.len(),
                    list_values(&missing)
                ),
            )
            .with_subject(subject),
        );
    }

    let invented = mapping.out_of_domain_canonicals();
    if !invented.is_empty() {
        warn!("{}: {} canonical values are not input values", subject, invented.len());
        warnings.push(
            Warning::new(
                WarningKind::InventedCanonical,
                format!(
                    "{} canonical value(s) are not among the input values: {}",
                    invented.len(),
                    list_values(&invented)
                ),
            )
            .with_subject(subject),
        );
    }

    (mapping, warnings)
}

/// Parse and repair an initial mapping response.
///
/// A response without usable lines falls back to the identity mapping so
/// the workflow can always continue.
pub fn resolve_mapping(raw_text: &str, expected: &[String], subject: &str) -> MappingResolution {
    match parse_mapping(raw_text) {
        Ok(parsed) => {
            debug!("{}: parsed {} entries", subject, parsed.len());
            let (mapping, warnings) = complete_mapping(parsed, expected, subject);
            MappingResolution {
                mapping,
                warnings,
                parse_failure: None,
            }
        }
        Err(failure) => {
            warn!(
                "{}: {} ({}); using identity mapping",
                subject,
                failure.reason,
                preview(&failure.raw_text)
            );
            let warning = Warning::new(
                WarningKind::UnparseableResponse,
                format!(
                    "{}; every value maps to itself. Raw response: {}",
                    failure.reason,
                    preview(&failure.raw_text)
                ),
            )
            .with_subject(subject);
            MappingResolution {
                mapping: Mapping::identity(expected),
                warnings: vec![warning],
                parse_failure: Some(failure),
            }
        }
    }
}

/// Re-apply reviewer corrections the model did not follow.
///
/// Corrections for values outside the mapping are ignored with a warning.
/// A re-applied correction whose value is not an original is flagged as an
/// invented canonical.
pub fn enforce_feedback(
    mapping: &mut Mapping,
    feedback: &[FeedbackEntry],
    subject: &str,
) -> Vec<Warning> {
    let mut overridden = Vec::new();
    let mut ignored = Vec::new();
    let mut invented = Vec::new();

    for entry in feedback {
        match mapping.canonical_for(&entry.original) {
            Some(current) if current == entry.corrected => {}
            Some(_) => {
                mapping.set_canonical(&entry.original, &entry.corrected);
                overridden.push(entry.original.clone());
                if !mapping.contains_original(&entry.corrected) && !invented.contains(&entry.corrected) {
                    invented.push(entry.corrected.clone());
                }
            }
            None => ignored.push(entry.original.clone()),
        }
    }

    let mut warnings = Vec::new();
    if !overridden.is_empty() {
        debug!("{}: re-applied {} corrections", subject, overridden.len());
        warnings.push(
            Warning::new(
                WarningKind::FeedbackEnforced,
                format!(
                    "Re-applied {} correction(s) the model did not follow: {}",
                    overridden.len(),
                    list_values(&overridden)
                ),
            )
            .with_subject(subject),
        );
    }
    if !invented.is_empty() {
        warn!("{}: corrections introduced {} new canonical values", subject, invented.len());
        warnings.push(
            Warning::new(
                WarningKind::InventedCanonical,
                format!(
                    "{} corrected value(s) are not among the input values: {}",
                    invented.len(),
                    list_values(&invented)
                ),
            )
            .with_subject(subject),
        );
    }
    if !ignored.is_empty() {
        warnings.push(
            Warning::new(
                WarningKind::FeedbackIgnored,
                format!(
                    "Ignored {} correction(s) for values not in the mapping: {}",
                    ignored.len(),
                    list_values(&ignored)
                ),
            )
            .with_subject(subject),
        );
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn kinds(warnings: &[Warning]) -> Vec<WarningKind> {
        warnings.iter().map(|w| w.kind).collect()
    }

    // -------------------------------------------------------------------------
    // complete_mapping
    // -------------------------------------------------------------------------

    #[test]
    fn test_complete_mapping_appends_missing() {
        let parsed = parse_mapping("A=A\nB=A").unwrap();
        let (mapping, warnings) = complete_mapping(parsed, &values(&["A", "B", "C"]), "t");

        assert_eq!(mapping.originals(), values(&["A", "B", "C"]));
        assert_eq!(mapping.canonical_for("C"), Some("C"));
        assert_eq!(kinds(&warnings), vec![WarningKind::MissingValues]);
    }

    #[test]
    fn test_complete_mapping_drops_unknown_originals() {
        let parsed = parse_mapping("A=A\nSPRITE=A\nB=B").unwrap();
        let (mapping, warnings) = complete_mapping(parsed, &values(&["A", "B"]), "t");

        assert_eq!(mapping.originals(), values(&["A", "B"]));
        assert_eq!(kinds(&warnings), vec![WarningKind::UnknownValues]);
        assert!(warnings[0].message.contains("'SPRITE'"));
    }

    #[test]
    fn test_complete_mapping_keeps_first_duplicate() {
        let parsed = parse_mapping("A=A\nA=B\nB=B").unwrap();
        let (mapping, warnings) = complete_mapping(parsed, &values(&["A", "B"]), "t");

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.canonical_for("A"), Some("A"));
        assert_eq!(kinds(&warnings), vec![WarningKind::DuplicateValues]);
    }

    #[test]
    fn test_complete_mapping_flags_invented_canonical() {
        let parsed = parse_mapping("A=B\nC=D").unwrap();
        let (mapping, warnings) = complete_mapping(parsed, &values(&["A", "C"]), "t");

        // flagged, not corrected
        assert_eq!(mapping.canonical_for("A"), Some("B"));
        assert_eq!(mapping.canonical_for("C"), Some("D"));
        assert_eq!(kinds(&warnings), vec![WarningKind::InventedCanonical]);
    }

    #[test]
    fn test_complete_mapping_clean_response_has_no_warnings() {
        let parsed = parse_mapping("COKE=COCA COLA\nCOCA COLA=COCA COLA").unwrap();
        let (mapping, warnings) =
            complete_mapping(parsed, &values(&["COKE", "COCA COLA"]), "t");
        assert_eq!(mapping.distinct_canonical_count(), 1);
        assert!(warnings.is_empty());
    }

    // -------------------------------------------------------------------------
    // resolve_mapping
    // -------------------------------------------------------------------------

    #[test]
    fn test_resolve_mapping_falls_back_to_identity() {
        let expected = values(&["X", "Y"]);
        let resolution = resolve_mapping("Sorry, I cannot help.", &expected, "t");

        assert_eq!(resolution.mapping, Mapping::identity(&expected));
        assert!(resolution.parse_failure.is_some());
        assert_eq!(kinds(&resolution.warnings), vec![WarningKind::UnparseableResponse]);
    }

    #[test]
    fn test_resolve_mapping_success() {
        let expected = values(&["PEPSI MAX", "PEPSI"]);
        let resolution = resolve_mapping("PEPSI MAX=PEPSI\nPEPSI=PEPSI", &expected, "t");
        assert!(resolution.parse_failure.is_none());
        assert_eq!(resolution.mapping.distinct_canonical_count(), 1);
    }

    // -------------------------------------------------------------------------
    // enforce_feedback
    // -------------------------------------------------------------------------

    #[test]
    fn test_enforce_feedback_overrides_ignored_correction() {
        let mut mapping = Mapping::identity(&values(&["COKE", "COCA COLA"]));
        let feedback = vec![FeedbackEntry::new("COKE", "COCA COLA")];

        let warnings = enforce_feedback(&mut mapping, &feedback, "t");

        assert_eq!(mapping.canonical_for("COKE"), Some("COCA COLA"));
        assert_eq!(kinds(&warnings), vec![WarningKind::FeedbackEnforced]);
    }

    #[test]
    fn test_enforce_feedback_flags_correction_outside_value_set() {
        let mut mapping = Mapping::identity(&values(&["COKE", "PEPSI"]));
        let feedback = vec![FeedbackEntry::new("COKE", "COCA-COLA CO")];

        let warnings = enforce_feedback(&mut mapping, &feedback, "t");

        assert_eq!(mapping.canonical_for("COKE"), Some("COCA-COLA CO"));
        assert_eq!(
            kinds(&warnings),
            vec![WarningKind::FeedbackEnforced, WarningKind::InventedCanonical]
        );
        assert!(warnings[1].message.contains("COCA-COLA CO"));
        assert_eq!(mapping.out_of_domain_canonicals(), vec!["COCA-COLA CO".to_string()]);
    }

    #[test]
    fn test_enforce_feedback_already_applied() {
        let mut mapping = parse_mapping("COKE=COCA COLA\nCOCA COLA=COCA COLA").unwrap();
        let feedback = vec![FeedbackEntry::new("COKE", "COCA COLA")];
        assert!(enforce_feedback(&mut mapping, &feedback, "t").is_empty());
    }

    #[test]
    fn test_enforce_feedback_unknown_value() {
        let mut mapping = Mapping::identity(&values(&["A"]));
        let feedback = vec![FeedbackEntry::new("Z", "A")];
        let warnings = enforce_feedback(&mut mapping, &feedback, "t");
        assert_eq!(kinds(&warnings), vec![WarningKind::FeedbackIgnored]);
        assert_eq!(mapping, Mapping::identity(&values(&["A"])));
    }
}
