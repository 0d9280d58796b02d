//! Typed settings: inline rules and declared rule files.

use crate::error::{ReplaceError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Settings file names looked up in the workspace root, in order.
pub const SETTINGS_FILE_NAMES: [&str; 3] =
    [".replace-rules.json", ".replace-rules.yaml", ".replace-rules.yml"];

/// Replace-rule settings as provided by the configuration store.
///
/// Inline rules are kept as raw values; the loader validates them element by
/// element so that one malformed entry never discards the others.
///
/// # Example JSON
///
/// ```json
/// {
///   "rules": [{ "search": "foo", "replace": "bar" }],
///   "ruleFiles": ["~/rules/common.json", "${env:TEAM_RULES}/team.json"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Inline rule definitions.
    #[serde(default)]
    pub rules: Vec<Value>,

    /// External rule files, in declaration order.
    #[serde(default)]
    pub rule_files: Vec<String>,
}

impl Settings {
    /// Creates empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an inline rule value.
    pub fn with_rule(mut self, rule: Value) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds a declared rule file.
    pub fn with_rule_file(mut self, path: impl Into<String>) -> Self {
        self.rule_files.push(path.into());
        self
    }

    /// Returns true if the declared rule file list differs from `other`'s.
    pub fn rule_files_changed(&self, other: &Settings) -> bool {
        self.rule_files != other.rule_files
    }

    /// Load settings from a JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_settings(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            ReplaceError::InvalidConfig(format!("Failed to parse JSON settings: {}", e))
        })
    }

    /// Load settings from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_settings(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(|e| {
            ReplaceError::InvalidConfig(format!("Failed to parse YAML settings: {}", e))
        })
    }

    /// Load settings, choosing the format by file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            _ => Self::from_json(path),
        }
    }

    /// Loads the first settings file found in `root`, or defaults when none exists.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        for name in SETTINGS_FILE_NAMES {
            let candidate = root.join(name);
            if candidate.is_file() {
                return Self::from_file(candidate);
            }
        }
        Ok(Self::default())
    }
}

fn read_settings(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ReplaceError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|e| {
        ReplaceError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read settings file: {}", e),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_fields_absent() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(settings.rules.is_empty());
        assert!(settings.rule_files.is_empty());
    }

    #[test]
    fn test_camel_case_keys() {
        let settings: Settings = serde_json::from_value(json!({
            "rules": [{"search": "a", "replace": "b"}],
            "ruleFiles": ["one.json", "two.json"]
        }))
        .unwrap();

        assert_eq!(settings.rules.len(), 1);
        assert_eq!(settings.rule_files, vec!["one.json", "two.json"]);
    }

    #[test]
    fn test_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(
            &path,
            "rules:\n  - search: foo\n    replace: bar\nruleFiles:\n  - rules.json\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.rules[0]["search"], "foo");
        assert_eq!(settings.rule_files, vec!["rules.json"]);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Settings::from_file(&path),
            Err(ReplaceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_discover_prefers_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".replace-rules.json"), r#"{"ruleFiles": ["a.json"]}"#).unwrap();
        fs::write(dir.path().join(".replace-rules.yaml"), "ruleFiles: [b.json]\n").unwrap();

        let settings = Settings::discover(dir.path()).unwrap();
        assert_eq!(settings.rule_files, vec!["a.json"]);
    }

    #[test]
    fn test_discover_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Settings::discover(dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn test_rule_files_changed() {
        let a = Settings::new().with_rule_file("a.json");
        let b = a.clone().with_rule(json!({"search": "x", "replace": "y"}));
        let c = Settings::new().with_rule_file("c.json");

        assert!(!a.rule_files_changed(&b));
        assert!(a.rule_files_changed(&c));
    }
}
