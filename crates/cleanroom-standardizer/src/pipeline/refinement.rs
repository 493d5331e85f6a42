//! One feedback round over every mapping.
//!
//! Mappings without feedback pass through untouched. The rest are
//! re-requested with the reviewer's corrections; a failed request keeps the
//! previous mapping. Rounds run sequentially on the calling thread.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::ai::AIProvider;
use crate::error::{Result, StandardizerError};
use crate::pipeline::progress::{CancellationToken, ProgressReporter, ProgressUpdate, WorkflowStage};
use crate::prompts::refinement_prompt;
use crate::response::{complete_mapping, enforce_feedback, parse_mapping, preview};
use crate::types::{
    ColumnGroupIdentity, FeedbackEntry, Mapping, MappingSlot, Warning, WarningKind,
};

/// What happened to one mapping during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementDisposition {
    /// No feedback; the mapping was passed through.
    Unchanged,
    /// Feedback was applied.
    Refined,
    /// The refinement failed or was ignored; the previous mapping was kept.
    Failed,
}

/// Result of one round.
#[derive(Debug, Clone, Default)]
pub struct RoundOutcome {
    pub mappings: BTreeMap<ColumnGroupIdentity, MappingSlot>,
    pub refined: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub warnings: Vec<Warning>,
}

impl RoundOutcome {
    fn record(&mut self, identity: ColumnGroupIdentity, slot: MappingSlot, disposition: RefinementDisposition) {
        match disposition {
            RefinementDisposition::Unchanged => self.unchanged += 1,
            RefinementDisposition::Refined => self.refined += 1,
            RefinementDisposition::Failed => self.failed += 1,
        }
        self.mappings.insert(identity, slot);
    }
}

/// Applies reviewer feedback to mappings.
///
/// With a provider, each mapping with feedback is re-requested; without
/// one, corrections are written directly into the mapping.
pub struct Refiner<'a> {
    ai_provider: Option<&'a dyn AIProvider>,
    enforce_feedback: bool,
    cancellation_token: Option<&'a CancellationToken>,
    progress_reporter: Option<&'a dyn ProgressReporter>,
}

impl<'a> Refiner<'a> {
    pub fn new(ai_provider: Option<&'a dyn AIProvider>, enforce_feedback: bool) -> Self {
        Self {
            ai_provider,
            enforce_feedback,
            cancellation_token: None,
            progress_reporter: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn with_progress(mut self, reporter: Option<&'a dyn ProgressReporter>) -> Self {
        self.progress_reporter = reporter;
        self
    }

    /// Run one round over `mappings`.
    ///
    /// The returned map has exactly the keys of `mappings`. Feedback keyed by
    /// an unknown identity is reported and skipped.
    pub fn refine_all(
        &self,
        mappings: &BTreeMap<ColumnGroupIdentity, MappingSlot>,
        feedback: &BTreeMap<ColumnGroupIdentity, Vec<FeedbackEntry>>,
    ) -> Result<RoundOutcome> {
        let mut outcome = RoundOutcome::default();

        for identity in feedback.keys().filter(|k| !mappings.contains_key(*k)) {
            outcome.warnings.push(
                Warning::new(WarningKind::FeedbackIgnored, "Feedback for an unknown mapping was ignored")
                    .with_subject(identity.to_string()),
            );
        }

        let total = mappings
            .keys()
            .filter(|k| feedback.get(*k).is_some_and(|f| !f.is_empty()))
            .count();
        let mut done = 0;

        for (identity, slot) in mappings {
            let entries = feedback.get(identity).map(Vec::as_slice).unwrap_or_default();
            if entries.is_empty() {
                outcome.record(identity.clone(), slot.clone(), RefinementDisposition::Unchanged);
                continue;
            }

            self.check_cancelled()?;
            let label = identity.to_string();
            let (refined, warnings, disposition) = self.refine_one(&label, slot, entries);
            outcome.warnings.extend(warnings);
            outcome.record(identity.clone(), refined, disposition);

            done += 1;
            self.report(ProgressUpdate::with_items(
                WorkflowStage::Refining,
                label,
                done,
                total,
                match disposition {
                    RefinementDisposition::Failed => "Refinement failed; previous mapping kept",
                    _ => "Feedback applied",
                },
            ));
        }

        info!(
            "Refinement round: {} refined, {} unchanged, {} failed",
            outcome.refined, outcome.unchanged, outcome.failed
        );
        Ok(outcome)
    }

    /// Refine a single mapping with a non-empty feedback list.
    pub fn refine_one(
        &self,
        subject: &str,
        slot: &MappingSlot,
        feedback: &[FeedbackEntry],
    ) -> (MappingSlot, Vec<Warning>, RefinementDisposition) {
        let Some(mapping) = slot.mapping() else {
            let warning = Warning::new(
                WarningKind::FeedbackIgnored,
                format!(
                    "{} correction(s) ignored: the mapping was never generated",
                    feedback.len()
                ),
            )
            .with_subject(subject);
            return (slot.clone(), vec![warning], RefinementDisposition::Failed);
        };

        match self.ai_provider {
            None => {
                let mut updated = mapping.clone();
                let warnings = enforce_feedback(&mut updated, feedback, subject)
                    .into_iter()
                    .filter(|w| w.kind != WarningKind::FeedbackEnforced)
                    .collect();
                debug!("{}: applied {} corrections directly", subject, feedback.len());
                (MappingSlot::ready(updated), warnings, RefinementDisposition::Refined)
            }
            Some(provider) => match self.request(provider, subject, mapping, feedback) {
                Ok((updated, warnings)) => {
                    (MappingSlot::ready(updated), warnings, RefinementDisposition::Refined)
                }
                Err(reason) => {
                    warn!("{}: refinement failed, keeping previous mapping: {}", subject, reason);
                    let warning = Warning::new(
                        WarningKind::RefinementFailed,
                        format!("Refinement failed ({reason}); the previous mapping was kept"),
                    )
                    .with_subject(subject);
                    (slot.clone(), vec![warning], RefinementDisposition::Failed)
                }
            },
        }
    }

    fn request(
        &self,
        provider: &dyn AIProvider,
        subject: &str,
        mapping: &Mapping,
        feedback: &[FeedbackEntry],
    ) -> std::result::Result<(Mapping, Vec<Warning>), String> {
        let raw = provider
            .complete(&refinement_prompt(mapping, feedback))
            .map_err(|e| format!("request failed: {e}"))?;

        let parsed = parse_mapping(&raw)
            .map_err(|failure| format!("{}; response was: {}", failure.reason, preview(&failure.raw_text)))?;

        let (mut updated, mut warnings) = complete_mapping(parsed, &mapping.originals(), subject);
        if self.enforce_feedback {
            warnings.extend(enforce_feedback(&mut updated, feedback, subject));
        }
        Ok((updated, warnings))
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_some_and(CancellationToken::is_cancelled) {
            return Err(StandardizerError::Cancelled);
        }
        Ok(())
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(reporter) = self.progress_reporter {
            reporter.report(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedProvider;
    use crate::types::{ColumnRef, GroupId, MappingEntry};
    use pretty_assertions::assert_eq;

    fn identity(column: &str) -> ColumnGroupIdentity {
        ColumnGroupIdentity::new(GroupId::auto(1), ColumnRef::new("a.csv", column))
    }

    fn brands() -> Mapping {
        Mapping::identity(&[
            "COKE".to_string(),
            "COCA COLA".to_string(),
            "PEPSI".to_string(),
        ])
    }

    fn single(mapping: Mapping) -> BTreeMap<ColumnGroupIdentity, MappingSlot> {
        BTreeMap::from([(identity("Brand"), MappingSlot::ready(mapping))])
    }

    fn correction() -> BTreeMap<ColumnGroupIdentity, Vec<FeedbackEntry>> {
        BTreeMap::from([(identity("Brand"), vec![FeedbackEntry::new("COKE", "COCA COLA")])])
    }

    #[test]
    fn test_no_feedback_passes_through_without_calls() {
        let provider = ScriptedProvider::new().otherwise("COKE=PEPSI");
        let refiner = Refiner::new(Some(&provider), true);
        let mappings = single(brands());

        let outcome = refiner.refine_all(&mappings, &BTreeMap::new()).unwrap();

        assert_eq!(outcome.mappings, mappings);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_empty_feedback_list_counts_as_none() {
        let provider = ScriptedProvider::new().otherwise("COKE=PEPSI");
        let refiner = Refiner::new(Some(&provider), true);
        let feedback = BTreeMap::from([(identity("Brand"), Vec::new())]);

        let outcome = refiner.refine_all(&single(brands()), &feedback).unwrap();
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_refinement_applies_model_answer() {
        let provider = ScriptedProvider::new()
            .otherwise("COKE=COCA COLA\nCOCA COLA=COCA COLA\nPEPSI=PEPSI");
        let refiner = Refiner::new(Some(&provider), true);

        let outcome = refiner.refine_all(&single(brands()), &correction()).unwrap();
        let mapping = outcome.mappings[&identity("Brand")].mapping().unwrap();

        assert_eq!(mapping.canonical_for("COKE"), Some("COCA COLA"));
        assert_eq!(mapping.distinct_canonical_count(), 2);
        assert_eq!(outcome.refined, 1);
        assert!(outcome.warnings.is_empty());
        assert!(provider.prompts()[0].contains("\"corrected\": \"COCA COLA\""));
    }

    #[test]
    fn test_refinement_keeps_originals_stable() {
        // Model drops PEPSI and invents SPRITE.
        let provider = ScriptedProvider::new().otherwise("COKE=COCA COLA\nCOCA COLA=COCA COLA\nSPRITE=SPRITE");
        let refiner = Refiner::new(Some(&provider), true);

        let outcome = refiner.refine_all(&single(brands()), &correction()).unwrap();
        let mapping = outcome.mappings[&identity("Brand")].mapping().unwrap();

        assert_eq!(mapping.originals(), brands().originals());
        let kinds: Vec<WarningKind> = outcome.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::UnknownValues, WarningKind::MissingValues]);
    }

    #[test]
    fn test_ignored_correction_is_enforced() {
        let provider = ScriptedProvider::new().otherwise("COKE=COKE\nCOCA COLA=COCA COLA\nPEPSI=PEPSI");

        let outcome = Refiner::new(Some(&provider), true)
            .refine_all(&single(brands()), &correction())
            .unwrap();
        let mapping = outcome.mappings[&identity("Brand")].mapping().unwrap();
        assert_eq!(mapping.canonical_for("COKE"), Some("COCA COLA"));
        assert_eq!(outcome.warnings[0].kind, WarningKind::FeedbackEnforced);

        let outcome = Refiner::new(Some(&provider), false)
            .refine_all(&single(brands()), &correction())
            .unwrap();
        let mapping = outcome.mappings[&identity("Brand")].mapping().unwrap();
        assert_eq!(mapping.canonical_for("COKE"), Some("COKE"));
    }

    #[test]
    fn test_failed_request_keeps_previous_mapping() {
        let provider = ScriptedProvider::new().otherwise("ERR: rate limited");
        let refiner = Refiner::new(Some(&provider), true);
        let mappings = single(brands());

        let outcome = refiner.refine_all(&mappings, &correction()).unwrap();

        assert_eq!(outcome.mappings, mappings);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::RefinementFailed);
        assert!(outcome.warnings[0].message.contains("rate limited"));
    }

    #[test]
    fn test_unparseable_refinement_keeps_previous_mapping() {
        let provider = ScriptedProvider::new().otherwise("I have updated the mapping as requested.");
        let outcome = Refiner::new(Some(&provider), true)
            .refine_all(&single(brands()), &correction())
            .unwrap();

        assert_eq!(outcome.mappings[&identity("Brand")].mapping(), Some(&brands()));
        assert_eq!(outcome.failed, 1);
    }

    #[test]
    fn test_without_provider_corrections_applied_directly() {
        let mapping = Mapping::new(vec![
            MappingEntry::new("PEPSI MAX", "PEPSI MAX"),
            MappingEntry::new("PEPSI", "PEPSI"),
        ]);
        let feedback = BTreeMap::from([(identity("Brand"), vec![FeedbackEntry::new("PEPSI MAX", "PEPSI")])]);

        let outcome = Refiner::new(None, true).refine_all(&single(mapping), &feedback).unwrap();
        let refined = outcome.mappings[&identity("Brand")].mapping().unwrap();

        assert_eq!(refined.canonical_for("PEPSI MAX"), Some("PEPSI"));
        assert_eq!(outcome.refined, 1);
        assert!(outcome.warnings.is_empty());
    }

    fn correction_outside_value_set() -> BTreeMap<ColumnGroupIdentity, Vec<FeedbackEntry>> {
        BTreeMap::from([(identity("Brand"), vec![FeedbackEntry::new("COKE", "COCA-COLA CO")])])
    }

    #[test]
    fn test_enforced_correction_outside_value_set_is_flagged() {
        let provider = ScriptedProvider::new().otherwise("COKE=COKE\nCOCA COLA=COCA COLA\nPEPSI=PEPSI");

        let outcome = Refiner::new(Some(&provider), true)
            .refine_all(&single(brands()), &correction_outside_value_set())
            .unwrap();
        let mapping = outcome.mappings[&identity("Brand")].mapping().unwrap();

        assert_eq!(mapping.canonical_for("COKE"), Some("COCA-COLA CO"));
        let kinds: Vec<WarningKind> = outcome.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::FeedbackEnforced, WarningKind::InventedCanonical]);
    }

    #[test]
    fn test_direct_correction_outside_value_set_is_flagged() {
        let outcome = Refiner::new(None, true)
            .refine_all(&single(brands()), &correction_outside_value_set())
            .unwrap();
        let mapping = outcome.mappings[&identity("Brand")].mapping().unwrap();

        assert_eq!(mapping.out_of_domain_canonicals(), vec!["COCA-COLA CO".to_string()]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::InventedCanonical);
        assert!(outcome.warnings[0].message.contains("COCA-COLA CO"));
    }

    #[test]
    fn test_feedback_on_failed_slot_is_ignored() {
        let mappings = BTreeMap::from([(identity("Brand"), MappingSlot::failed("timeout"))]);
        let outcome = Refiner::new(None, true).refine_all(&mappings, &correction()).unwrap();

        assert!(outcome.mappings[&identity("Brand")].is_failed());
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::FeedbackIgnored);
    }

    #[test]
    fn test_cancelled_round() {
        let provider = ScriptedProvider::new().otherwise("COKE=COCA COLA");
        let token = CancellationToken::new();
        token.cancel();

        let result = Refiner::new(Some(&provider), true)
            .with_cancellation(&token)
            .refine_all(&single(brands()), &correction());

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(provider.calls(), 0);
    }
}
