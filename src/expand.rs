//! Variable expansion for rule file paths.
//!
//! Supports three tokens:
//! - a leading `~/`, replaced with the home directory
//! - `${userHome}` anywhere in the path, replaced with the home directory
//! - `${env:NAME}`, replaced with the value of the environment variable `NAME`
//!
//! A leading tilde takes precedence: when it is present `${userHome}` is left
//! alone. Environment tokens are always substituted. Unknown variables stay in
//! the path verbatim and produce a warning.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;

const USER_HOME_TOKEN: &str = "${userHome}";

static ENV_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{env:([^}]+)\}").expect("env token pattern is valid"));

/// Source of the values substituted into paths.
pub trait VarSource: Send + Sync {
    /// Returns the user's home directory, if known.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Returns the value of an environment variable, if defined.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the home directory and environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemVars;

impl VarSource for SystemVars {
    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed set of variables, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MapVars {
    home: Option<PathBuf>,
    vars: HashMap<String, String>,
}

impl MapVars {
    /// Creates an empty variable source with no home directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the home directory.
    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Defines an environment variable.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl VarSource for MapVars {
    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Expands home and environment tokens in `path` and normalizes the result.
pub fn expand(path: &str, vars: &dyn VarSource) -> String {
    let expanded = if let Some(rest) = path.strip_prefix("~/") {
        match vars.home_dir() {
            Some(home) => format!("{}/{}", home.display(), rest),
            None => {
                warn!(path, "home directory is unknown, leaving '~' unexpanded");
                path.to_string()
            }
        }
    } else if path.contains(USER_HOME_TOKEN) {
        match vars.home_dir() {
            Some(home) => path.replace(USER_HOME_TOKEN, &home.to_string_lossy()),
            None => {
                warn!(path, "home directory is unknown, leaving ${{userHome}} unexpanded");
                path.to_string()
            }
        }
    } else {
        path.to_string()
    };

    let expanded = ENV_TOKEN.replace_all(&expanded, |caps: &Captures| {
        let name = &caps[1];
        match vars.var(name) {
            Some(value) => value,
            None => {
                warn!(variable = name, "environment variable is not defined, keeping token");
                caps[0].to_string()
            }
        }
    });

    normalize(&expanded)
}

/// Collapses repeated separators and `.`/`..` segments without touching the file system.
fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    if out.as_os_str().is_empty() {
        return ".".to_string();
    }
    out.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> MapVars {
        MapVars::new().home("/home/u").env("CONFIG_DIR", "/etc/rules")
    }

    #[test]
    fn test_tilde_prefix() {
        assert_eq!(expand("~/cfg.json", &vars()), "/home/u/cfg.json");
    }

    #[test]
    fn test_tilde_only_at_start() {
        assert_eq!(expand("a/~/cfg.json", &vars()), "a/~/cfg.json");
    }

    #[test]
    fn test_user_home_token() {
        assert_eq!(
            expand("${userHome}/rules/${userHome}.json", &vars()),
            "/home/u/rules/home/u.json"
        );
    }

    #[test]
    fn test_tilde_short_circuits_user_home() {
        assert_eq!(
            expand("~/x/${userHome}/r.json", &vars()),
            "/home/u/x/${userHome}/r.json"
        );
    }

    #[test]
    fn test_env_token() {
        assert_eq!(expand("${env:CONFIG_DIR}/r.json", &vars()), "/etc/rules/r.json");
    }

    #[test]
    fn test_env_runs_after_tilde() {
        let vars = vars().env("NAME", "team");
        assert_eq!(expand("~/${env:NAME}.json", &vars), "/home/u/team.json");
    }

    #[test]
    fn test_missing_env_left_unchanged() {
        assert_eq!(expand("${env:MISSING}/x.json", &vars()), "${env:MISSING}/x.json");
    }

    #[test]
    fn test_unclosed_token_is_literal() {
        assert_eq!(expand("${env:OPEN/x.json", &vars()), "${env:OPEN/x.json");
    }

    #[test]
    fn test_collapses_separators() {
        let vars = MapVars::new().home("/home/u/");
        assert_eq!(expand("~//nested//r.json", &vars), "/home/u/nested/r.json");
        assert_eq!(expand("a/./b/../c.json", &vars), "a/c.json");
    }

    #[test]
    fn test_no_home_leaves_tilde() {
        assert_eq!(expand("~/cfg.json", &MapVars::new()), "~/cfg.json");
    }

    #[test]
    fn test_relative_path_untouched() {
        assert_eq!(expand("rules/team.json", &vars()), "rules/team.json");
    }
}
