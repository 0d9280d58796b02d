//! # Replace Rules
//!
//! Configured regex search-and-replace rules for editor documents, run
//! explicitly or as save-time code actions.
//!
//! This crate provides:
//! - Loading rules from inline settings and external JSON rule files, with
//!   `~`, `${userHome}` and `${env:NAME}` expansion in file paths
//! - Resolving which rules apply to a document, honoring language scoping
//! - Applying all matching replacements as one atomic edit computed against
//!   the original text
//! - Watching rule files and reloading the merged rule set on change
//!
//! ## Quick Start
//!
//! ```rust
//! use replace_rules::prelude::*;
//! use serde_json::json;
//!
//! let settings = Settings::new()
//!     .with_rule(json!({ "search": "foo", "replace": "bar" }));
//! let rules = ReplaceRules::new(RuleLoader::new(), settings);
//!
//! let mut doc = MemoryDocument::new("This is a foo test", "plaintext");
//! rules.apply_all(&mut doc)?;
//!
//! assert_eq!(doc.text(), "This is a bar test");
//! # Ok::<(), replace_rules::error::ReplaceError>(())
//! ```
//!
//! ## Language Scoping
//!
//! A rule with `languages` only runs on matching documents during broadcast
//! and save-time invocations. Invoking it directly by id overrides the scope.
//!
//! ```rust
//! use replace_rules::prelude::*;
//! use serde_json::json;
//!
//! let settings = Settings::new().with_rule(json!({
//!     "id": "p",
//!     "search": "print\\(",
//!     "replace": "logger.info(",
//!     "languages": ["python"]
//! }));
//! let rules = ReplaceRules::new(RuleLoader::new(), settings);
//!
//! let mut doc = MemoryDocument::new("print(\"x\")", "javascript");
//! rules.apply(&mut doc, &Invocation::specific("p", Trigger::CodeAction))?;
//! assert_eq!(doc.text(), "print(\"x\")");
//!
//! rules.apply(&mut doc, &Invocation::specific("p", Trigger::Direct))?;
//! assert_eq!(doc.text(), "logger.info(\"x\")");
//! # Ok::<(), replace_rules::error::ReplaceError>(())
//! ```

pub mod applier;
pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod expand;
pub mod extension;
pub mod files;
pub mod language;
pub mod loader;
pub mod notifier;
pub mod resolver;
pub mod rule;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::applier::{ApplyOutcome, EditPlan, SkippedRule};
    pub use crate::config::Settings;
    pub use crate::document::{Document, FileDocument, MemoryDocument, TextEdit};
    pub use crate::error::{ReplaceError, Result};
    pub use crate::expand::{MapVars, SystemVars, VarSource, expand};
    pub use crate::extension::{Prompt, ReplaceRules, SilentPrompt};
    pub use crate::files::FileCollector;
    pub use crate::language::language_id_for_path;
    pub use crate::loader::{FileLoad, FileStatus, LoadReport, RuleLoader};
    pub use crate::notifier::{RuleFileEvent, RuleWatcher};
    pub use crate::resolver::{BROADCAST_KIND, Invocation, RuleAction, Trigger, resolve};
    pub use crate::rule::Rule;
}

pub use prelude::*;
