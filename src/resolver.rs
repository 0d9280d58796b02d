//! Rule resolution: which rules apply to a document for a given invocation.
//!
//! Language scoping is honored for broadcast invocations and for every
//! code-action (save-time) invocation. A rule requested by id through a direct
//! invocation skips the language check, so a user can force a rule onto a
//! document of another language.

use crate::rule::Rule;
use lsp_types::CodeActionKind;
use std::collections::HashSet;

/// Code action kind of the "apply all applicable rules" action.
pub const BROADCAST_KIND: &str = "source.replaceRules";

/// How a rule application was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    /// Run by the save-time code action pipeline.
    CodeAction,
    /// Run explicitly by the user.
    #[default]
    Direct,
}

/// A single request to apply rules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    /// Requested rule id; `None` is a broadcast.
    pub rule_id: Option<String>,
    pub trigger: Trigger,
}

impl Invocation {
    /// Applies every applicable rule.
    pub fn broadcast(trigger: Trigger) -> Self {
        Self {
            rule_id: None,
            trigger,
        }
    }

    /// Applies the rule with the given id.
    pub fn specific(id: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            rule_id: Some(id.into()),
            trigger,
        }
    }

    /// Returns true if language scoping is enforced for this invocation.
    pub fn filters_language(&self) -> bool {
        self.rule_id.is_none() || self.trigger == Trigger::CodeAction
    }
}

/// Selects the rules to apply, preserving list order.
///
/// An unknown id yields an empty selection. When several rules share an id the
/// first one wins.
pub fn resolve<'r>(rules: &'r [Rule], invocation: &Invocation, language_id: &str) -> Vec<&'r Rule> {
    let selected: Vec<&Rule> = match &invocation.rule_id {
        Some(id) => rules
            .iter()
            .find(|r| r.id.as_deref() == Some(id.as_str()))
            .into_iter()
            .collect(),
        None => rules.iter().collect(),
    };

    if !invocation.filters_language() {
        return selected;
    }

    selected
        .into_iter()
        .filter(|r| r.applies_to_language(language_id))
        .collect()
}

/// Distinct rule ids in list order.
pub fn rule_ids(rules: &[Rule]) -> Vec<&str> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .filter_map(|r| r.id.as_deref())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// An addressable action: the broadcast action or one id-bearing rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleAction {
    pub title: String,
    pub kind: CodeActionKind,
    /// Target rule id; `None` for the broadcast action.
    pub rule_id: Option<String>,
}

impl RuleAction {
    /// The broadcast action.
    pub fn broadcast() -> Self {
        Self {
            title: "Apply all replace rules".to_string(),
            kind: CodeActionKind::from(BROADCAST_KIND),
            rule_id: None,
        }
    }

    /// The action for the rule with `id`.
    pub fn for_rule(id: &str) -> Self {
        Self {
            title: format!("Apply replace rule '{id}'"),
            kind: CodeActionKind::from(format!("{BROADCAST_KIND}.{id}")),
            rule_id: Some(id.to_string()),
        }
    }

    /// Returns true if this is the broadcast action.
    pub fn is_broadcast(&self) -> bool {
        self.rule_id.is_none()
    }

    /// The invocation this action performs when triggered by `trigger`.
    pub fn invocation(&self, trigger: Trigger) -> Invocation {
        Invocation {
            rule_id: self.rule_id.clone(),
            trigger,
        }
    }
}

/// All actions: the broadcast action followed by one per distinct rule id.
pub fn actions(rules: &[Rule]) -> Vec<RuleAction> {
    std::iter::once(RuleAction::broadcast())
        .chain(rule_ids(rules).into_iter().map(RuleAction::for_rule))
        .collect()
}

/// Actions selected by a code-action kind filter. `None` selects everything.
pub fn code_actions(rules: &[Rule], only: Option<&[CodeActionKind]>) -> Vec<RuleAction> {
    actions(rules)
        .into_iter()
        .filter(|action| match only {
            None => true,
            Some(kinds) => kinds.iter().any(|k| kind_contains(k, &action.kind)),
        })
        .collect()
}

/// Returns true if `kind` equals `parent` or is a dot-separated child of it.
pub fn kind_contains(parent: &CodeActionKind, kind: &CodeActionKind) -> bool {
    let parent = parent.as_str();
    let kind = kind.as_str();
    parent.is_empty()
        || kind == parent
        || (kind.starts_with(parent) && kind.as_bytes().get(parent.len()) == Some(&b'.'))
}
