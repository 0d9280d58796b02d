//! Rule definitions and shape validation.

use crate::error::{ReplaceError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One configured search-and-replace rule.
///
/// # Example JSON
///
/// ```json
/// {
///   "id": "py-logger",
///   "search": "print\\(",
///   "replace": "logger.info(",
///   "languages": ["python"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Optional identifier; id-bearing rules can be invoked individually.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Regular expression to search for.
    pub search: String,

    /// Replacement template, may reference capture groups (`$1`, `${name}`).
    pub replace: String,

    /// Language identifiers this rule is restricted to. `None` means any language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
}

impl Rule {
    /// Creates an unrestricted rule without an id.
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            id: None,
            search: search.into(),
            replace: replace.into(),
            languages: None,
        }
    }

    /// Sets the rule id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Restricts the rule to the given language identifiers.
    pub fn with_languages(mut self, languages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.languages = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    /// Returns true if the rule may run on a document with this language id.
    pub fn applies_to_language(&self, language_id: &str) -> bool {
        match &self.languages {
            None => true,
            Some(languages) => languages.iter().any(|l| l == language_id),
        }
    }

    /// Compiles the search pattern in multi-line mode.
    pub fn compile(&self) -> Result<Regex> {
        Ok(RegexBuilder::new(&self.search).multi_line(true).build()?)
    }

    /// Short human-readable name: the id when present, the pattern otherwise.
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.search)
    }

    /// Validates a raw JSON value and converts it into a rule.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(invalid("expected an object"));
        };

        for field in ["search", "replace"] {
            match object.get(field) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(invalid(format!("'{field}' must be a string"))),
                None => return Err(invalid(format!("missing required field '{field}'"))),
            }
        }

        Rule::deserialize(value).map_err(|e| invalid(e.to_string()))
    }
}

fn invalid(message: impl Into<String>) -> ReplaceError {
    ReplaceError::InvalidRule {
        message: message.into(),
    }
}

/// Validates each element independently, dropping bad ones with a warning.
///
/// Returns the valid rules and the number of dropped elements.
pub fn parse_rules(values: &[Value], origin: &str) -> (Vec<Rule>, usize) {
    let mut rules = Vec::with_capacity(values.len());
    let mut dropped = 0;

    for (index, value) in values.iter().enumerate() {
        match Rule::from_value(value) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                warn!(origin, index, error = %e, "dropping invalid rule");
                dropped += 1;
            }
        }
    }

    (rules, dropped)
}
