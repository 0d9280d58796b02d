//! Replacement planning and application.
//!
//! All rules match against one snapshot of the document taken before any edit,
//! and every resulting edit is submitted as a single batch. Offsets computed
//! for a later rule are therefore never shifted by an earlier rule.
//!
//! When two rules produce overlapping edits, the edit from the rule earlier in
//! the list is kept and the later one is dropped with a warning. A rule whose
//! pattern fails to compile is skipped with a warning; the others still apply.

use crate::document::{Document, TextEdit};
use crate::error::Result;
use crate::rule::Rule;
use tracing::{debug, warn};

/// A rule that was not applied because its pattern is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    pub label: String,
    pub error: String,
}

/// The edits computed for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPlan {
    /// Accepted edits, sorted by start offset and non-overlapping.
    pub edits: Vec<TextEdit>,
    /// Rules skipped because their pattern did not compile.
    pub skipped: Vec<SkippedRule>,
    /// Edits dropped because an earlier rule already claimed the span.
    pub dropped_overlaps: usize,
}

impl EditPlan {
    /// Returns true if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Inserts an edit unless it conflicts with an accepted one.
    fn accept(&mut self, edit: TextEdit) -> bool {
        let idx = self.edits.partition_point(|e| e.start < edit.start);
        let before = idx.checked_sub(1).and_then(|i| self.edits.get(i));
        let after = self.edits.get(idx);

        if before.is_some_and(|e| e.conflicts_with(&edit))
            || after.is_some_and(|e| e.conflicts_with(&edit))
        {
            return false;
        }

        self.edits.insert(idx, edit);
        true
    }
}

/// What an apply pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Rules that were considered.
    pub rules_considered: usize,
    /// Edits submitted to the document.
    pub edits_applied: usize,
    pub skipped: Vec<SkippedRule>,
    pub dropped_overlaps: usize,
}

impl ApplyOutcome {
    /// Returns true if the document was edited.
    pub fn changed(&self) -> bool {
        self.edits_applied > 0
    }
}

/// Computes the edits every rule makes against `snapshot`, in rule order.
pub fn plan(snapshot: &str, rules: &[&Rule]) -> EditPlan {
    let mut plan = EditPlan::default();

    for rule in rules {
        let pattern = match rule.compile() {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(rule = rule.label(), error = %e, "skipping rule with invalid pattern");
                plan.skipped.push(SkippedRule {
                    label: rule.label().to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let mut matched = 0;
        for caps in pattern.captures_iter(snapshot) {
            let Some(whole) = caps.get(0) else {
                continue;
            };

            let mut replacement = String::new();
            caps.expand(&rule.replace, &mut replacement);
            matched += 1;

            let edit = TextEdit::new(whole.start(), whole.end(), replacement);
            if !plan.accept(edit) {
                warn!(
                    rule = rule.label(),
                    start = whole.start(),
                    end = whole.end(),
                    "dropping edit that overlaps an earlier rule's edit"
                );
                plan.dropped_overlaps += 1;
            }
        }

        debug!(rule = rule.label(), matches = matched, "planned rule");
    }

    plan
}

/// Applies `rules` to `document` as one grouped edit.
///
/// With no rules, or no matches, the document is left untouched and no edit is
/// submitted.
pub fn apply(document: &mut dyn Document, rules: &[&Rule]) -> Result<ApplyOutcome> {
    if rules.is_empty() {
        return Ok(ApplyOutcome::default());
    }

    let plan = plan(document.text(), rules);
    let outcome = ApplyOutcome {
        rules_considered: rules.len(),
        edits_applied: plan.edits.len(),
        skipped: plan.skipped,
        dropped_overlaps: plan.dropped_overlaps,
    };

    if !plan.edits.is_empty() {
        document.apply_edits(&plan.edits)?;
    }

    Ok(outcome)
}
