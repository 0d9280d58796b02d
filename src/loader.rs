//! Rule loading: inline settings plus external JSON rule files.
//!
//! Every failure degrades to "contributes no rules" at the smallest scope: a
//! missing or unparsable file contributes nothing, a malformed element is
//! dropped on its own. [`RuleLoader::load_all`] never fails.

use crate::config::Settings;
use crate::error::{ReplaceError, Result};
use crate::expand::{SystemVars, VarSource, expand};
use crate::rule::{Rule, parse_rules};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of loading one declared rule file.
#[derive(Debug, Clone)]
pub struct FileLoad {
    /// Path as declared in settings.
    pub declared: String,
    /// Path after expansion and workspace resolution.
    pub path: PathBuf,
    /// What happened.
    pub status: FileStatus,
}

/// Status of a single rule file load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// The file was read; `dropped` elements failed validation.
    Loaded { rules: usize, dropped: usize },
    /// The file does not exist.
    Missing,
    /// The file could not be read or is not a JSON array.
    Failed { error: String },
}

/// Merged rules together with per-file diagnostics.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Inline rules followed by each file's rules, in declaration order.
    pub rules: Vec<Rule>,
    /// Inline elements that failed validation.
    pub inline_dropped: usize,
    /// One entry per declared rule file.
    pub files: Vec<FileLoad>,
}

/// Loads and merges rules from settings and rule files.
#[derive(Clone)]
pub struct RuleLoader {
    workspace_root: Option<PathBuf>,
    vars: Arc<dyn VarSource>,
}

impl RuleLoader {
    /// Creates a loader using the process environment and no workspace root.
    pub fn new() -> Self {
        Self {
            workspace_root: None,
            vars: Arc::new(SystemVars),
        }
    }

    /// Resolves relative rule file paths against `root`.
    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Uses a custom variable source for path expansion.
    pub fn vars(mut self, vars: impl VarSource + 'static) -> Self {
        self.vars = Arc::new(vars);
        self
    }

    /// Expands variables in a declared path and resolves it against the workspace root.
    pub fn resolve_path(&self, declared: &str) -> PathBuf {
        let expanded = PathBuf::from(expand(declared, self.vars.as_ref()));
        match &self.workspace_root {
            Some(root) if expanded.is_relative() => root.join(expanded),
            _ => expanded,
        }
    }

    /// Resolved paths of every declared rule file, in declaration order.
    pub fn rule_file_paths(&self, settings: &Settings) -> Vec<PathBuf> {
        settings
            .rule_files
            .iter()
            .map(|declared| self.resolve_path(declared))
            .collect()
    }

    /// Reads one rule file.
    ///
    /// Returns the valid rules and the number of dropped elements. Fails if the
    /// file is missing, unreadable, not JSON, or not a JSON array.
    pub fn load_file(&self, path: &Path) -> Result<(Vec<Rule>, usize)> {
        if !path.exists() {
            return Err(ReplaceError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        let Value::Array(elements) = value else {
            return Err(ReplaceError::InvalidConfig(format!(
                "{} does not contain a JSON array",
                path.display()
            )));
        };

        Ok(parse_rules(&elements, &path.to_string_lossy()))
    }

    /// Loads inline rules followed by the rules of each file, in declaration order.
    pub fn load_all(&self, settings: &Settings) -> Vec<Rule> {
        self.load_all_with_report(settings).rules
    }

    /// Like [`load_all`](Self::load_all), also reporting what happened per file.
    pub fn load_all_with_report(&self, settings: &Settings) -> LoadReport {
        let (mut rules, inline_dropped) = parse_rules(&settings.rules, "settings");
        let mut files = Vec::with_capacity(settings.rule_files.len());

        for declared in &settings.rule_files {
            let path = self.resolve_path(declared);
            let status = match self.load_file(&path) {
                Ok((file_rules, dropped)) => {
                    debug!(path = %path.display(), rules = file_rules.len(), dropped, "loaded rule file");
                    let count = file_rules.len();
                    rules.extend(file_rules);
                    FileStatus::Loaded {
                        rules: count,
                        dropped,
                    }
                }
                Err(ReplaceError::FileNotFound(_)) => {
                    warn!(path = %path.display(), declared = %declared, "rule file not found");
                    FileStatus::Missing
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule file");
                    FileStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            files.push(FileLoad {
                declared: declared.clone(),
                path,
                status,
            });
        }

        LoadReport {
            rules,
            inline_dropped,
            files,
        }
    }
}

impl Default for RuleLoader {
    fn default() -> Self {
        Self::new()
    }
}
