//! Host-facing entry point.
//!
//! [`ReplaceRules`] owns the merged rule set and is the only writer of it. A
//! reload replaces the whole `Arc<[Rule]>`, so a caller holding a previous
//! snapshot keeps a complete, consistent list. File watch events arrive on a
//! channel and are drained on the owner's thread.

use crate::applier::{self, ApplyOutcome};
use crate::config::Settings;
use crate::document::Document;
use crate::error::Result;
use crate::loader::{LoadReport, RuleLoader};
use crate::notifier::{RuleFileEvent, RuleWatcher};
use crate::resolver::{self, Invocation, RuleAction, Trigger, rule_ids};
use crate::rule::Rule;
use lsp_types::CodeActionKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, info};

/// User interaction the host provides.
pub trait Prompt {
    /// Asks the user to pick one of `ids`. `None` means cancelled.
    fn pick_rule(&self, ids: &[&str]) -> Option<String>;

    /// Shows a short informational notice.
    fn show_info(&self, message: &str);
}

/// A prompt that never picks anything and discards notices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPrompt;

impl Prompt for SilentPrompt {
    fn pick_rule(&self, _ids: &[&str]) -> Option<String> {
        None
    }

    fn show_info(&self, _message: &str) {}
}

/// Replace rules bound to one workspace.
pub struct ReplaceRules {
    loader: RuleLoader,
    settings: Settings,
    rules: Arc<[Rule]>,
    watcher: Option<RuleWatcher>,
    events_tx: Sender<RuleFileEvent>,
    events_rx: Receiver<RuleFileEvent>,
}

impl ReplaceRules {
    /// Loads the merged rule set for `settings`.
    pub fn new(loader: RuleLoader, settings: Settings) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let rules = loader.load_all(&settings).into();
        Self {
            loader,
            settings,
            rules,
            watcher: None,
            events_tx,
            events_rx,
        }
    }

    /// Snapshot of the merged rule set.
    pub fn rules(&self) -> Arc<[Rule]> {
        Arc::clone(&self.rules)
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolved rule file paths for the current settings.
    pub fn rule_file_paths(&self) -> Vec<PathBuf> {
        self.loader.rule_file_paths(&self.settings)
    }

    /// Rebuilds the merged rule set from scratch.
    pub fn reload(&mut self) {
        self.rules = self.loader.load_all(&self.settings).into();
        info!(rules = self.rules.len(), "reloaded replace rules");
    }

    /// Rebuilds the merged rule set and returns per-file diagnostics.
    pub fn reload_with_report(&mut self) -> LoadReport {
        let report = self.loader.load_all_with_report(&self.settings);
        self.rules = report.rules.clone().into();
        report
    }

    /// Applies new settings: reloads, and re-establishes the watch set when
    /// the declared rule files changed.
    pub fn update_settings(&mut self, settings: Settings) -> Result<()> {
        let files_changed = self.settings.rule_files_changed(&settings);
        self.settings = settings;
        self.reload();

        // A failed rewatch leaves no watcher rather than one on stale paths.
        if files_changed {
            if let Some(mut watcher) = self.watcher.take() {
                watcher.rewatch(self.rule_file_paths())?;
                self.watcher = Some(watcher);
            }
        }
        Ok(())
    }

    /// Starts watching the declared rule files.
    pub fn watch(&mut self) -> Result<()> {
        let paths = self.rule_file_paths();
        self.watcher = Some(RuleWatcher::new(paths, self.events_tx.clone())?);
        Ok(())
    }

    /// Returns true if a watcher is active.
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Rule file paths the active watcher reports on.
    pub fn watched_paths(&self) -> Option<&[PathBuf]> {
        self.watcher.as_ref().map(RuleWatcher::paths)
    }

    /// Sender for rule file events, for hosts that observe files themselves.
    pub fn file_events(&self) -> Sender<RuleFileEvent> {
        self.events_tx.clone()
    }

    /// Drains pending file events, reloading once if there were any.
    pub fn poll_file_events(&mut self) -> bool {
        let pending = self.events_rx.try_iter().count();
        if pending == 0 {
            return false;
        }
        debug!(events = pending, "rule files changed");
        self.reload();
        true
    }

    /// Blocks until a file event arrives or `timeout` passes, then reloads.
    ///
    /// Events that arrive together are coalesced into one reload.
    pub fn wait_for_file_event(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(_) => {
                let coalesced = self.events_rx.try_iter().count();
                debug!(events = coalesced + 1, "rule files changed");
                self.reload();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Selects the rules an invocation applies to a document of `language_id`.
    pub fn resolve(&self, invocation: &Invocation, language_id: &str) -> Vec<Rule> {
        resolver::resolve(&self.rules, invocation, language_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Runs an invocation against a document.
    pub fn apply(&self, document: &mut dyn Document, invocation: &Invocation) -> Result<ApplyOutcome> {
        let rules = self.rules();
        let selected = resolver::resolve(&rules, invocation, document.language_id());
        applier::apply(document, &selected)
    }

    /// "Apply all applicable rules".
    pub fn apply_all(&self, document: &mut dyn Document) -> Result<ApplyOutcome> {
        self.apply(document, &Invocation::broadcast(Trigger::Direct))
    }

    /// "Apply specific rule by id".
    ///
    /// Without an id the user is asked to pick among id-bearing rules. The user
    /// is told when no such rules exist, or when the requested id is unknown.
    pub fn apply_rule(
        &self,
        document: &mut dyn Document,
        id: Option<&str>,
        trigger: Trigger,
        prompt: &dyn Prompt,
    ) -> Result<ApplyOutcome> {
        let rules = self.rules();
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                let ids = rule_ids(&rules);
                if ids.is_empty() {
                    prompt.show_info("No replace rules with an id are configured.");
                    return Ok(ApplyOutcome::default());
                }
                match prompt.pick_rule(&ids) {
                    Some(id) => id,
                    None => return Ok(ApplyOutcome::default()),
                }
            }
        };

        if !rules.iter().any(|r| r.id.as_deref() == Some(id.as_str())) {
            prompt.show_info(&format!("Replace rule '{id}' was not found."));
            return Ok(ApplyOutcome::default());
        }

        self.apply(document, &Invocation::specific(id, trigger))
    }

    /// Code actions offered for the requested kinds.
    pub fn code_actions(&self, only: Option<&[CodeActionKind]>) -> Vec<RuleAction> {
        resolver::code_actions(&self.rules, only)
    }

    /// Runs one action. Unknown ids are a silent no-op.
    pub fn run_action(
        &self,
        action: &RuleAction,
        document: &mut dyn Document,
        trigger: Trigger,
    ) -> Result<ApplyOutcome> {
        self.apply(document, &action.invocation(trigger))
    }

    /// Runs the save-time code actions selected by `kinds`.
    ///
    /// When the broadcast action is selected it covers every per-rule action,
    /// so those are not run again.
    pub fn on_save(
        &self,
        document: &mut dyn Document,
        kinds: &[CodeActionKind],
    ) -> Result<Vec<ApplyOutcome>> {
        let actions = self.code_actions(Some(kinds));
        let selected: Vec<&RuleAction> = match actions.iter().find(|a| a.is_broadcast()) {
            Some(broadcast) => vec![broadcast],
            None => actions.iter().collect(),
        };

        selected
            .into_iter()
            .map(|action| self.run_action(action, document, Trigger::CodeAction))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::expand::MapVars;
    use serde_json::json;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingPrompt {
        pick: Option<String>,
        offered: RefCell<Vec<String>>,
        notices: RefCell<Vec<String>>,
    }

    impl Prompt for RecordingPrompt {
        fn pick_rule(&self, ids: &[&str]) -> Option<String> {
            self.offered
                .borrow_mut()
                .extend(ids.iter().map(|s| s.to_string()));
            self.pick.clone()
        }

        fn show_info(&self, message: &str) {
            self.notices.borrow_mut().push(message.to_string());
        }
    }

    fn engine(settings: Settings) -> ReplaceRules {
        ReplaceRules::new(RuleLoader::new().vars(MapVars::new()), settings)
    }

    fn two_rules() -> Settings {
        Settings::new()
            .with_rule(json!({"id": "a", "search": "foo", "replace": "bar"}))
            .with_rule(json!({"id": "b", "search": "hello", "replace": "world"}))
    }

    #[test]
    fn test_apply_rule_by_id() {
        let engine = engine(two_rules());
        let mut doc = MemoryDocument::new("foo hello", "plaintext");
        engine
            .apply_rule(&mut doc, Some("a"), Trigger::Direct, &SilentPrompt)
            .unwrap();
        assert_eq!(doc.text(), "bar hello");
    }

    #[test]
    fn test_apply_rule_prompts_for_id() {
        let engine = engine(two_rules());
        let prompt = RecordingPrompt {
            pick: Some("b".to_string()),
            ..Default::default()
        };
        let mut doc = MemoryDocument::new("foo hello", "plaintext");
        engine
            .apply_rule(&mut doc, None, Trigger::Direct, &prompt)
            .unwrap();

        assert_eq!(doc.text(), "foo world");
        assert_eq!(*prompt.offered.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_apply_rule_notices() {
        let engine = engine(Settings::new().with_rule(json!({"search": "x", "replace": "y"})));
        let prompt = RecordingPrompt::default();
        let mut doc = MemoryDocument::new("x", "plaintext");

        engine
            .apply_rule(&mut doc, None, Trigger::Direct, &prompt)
            .unwrap();
        engine
            .apply_rule(&mut doc, Some("missing"), Trigger::Direct, &prompt)
            .unwrap();

        assert_eq!(prompt.notices.borrow().len(), 2);
        assert_eq!(doc.text(), "x");
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_on_save_respects_language() {
        let engine = engine(Settings::new().with_rule(json!({
            "id": "p",
            "search": "print\\(",
            "replace": "logger.info(",
            "languages": ["python"]
        })));

        let mut js = MemoryDocument::new("print(\"x\")", "javascript");
        let kinds = [CodeActionKind::from("source.replaceRules.p")];
        engine.on_save(&mut js, &kinds).unwrap();
        assert_eq!(js.text(), "print(\"x\")");

        let mut py = MemoryDocument::new("print(\"x\")", "python");
        engine.on_save(&mut py, &kinds).unwrap();
        assert_eq!(py.text(), "logger.info(\"x\")");
    }

    #[test]
    fn test_on_save_broadcast_runs_once() {
        let engine = engine(two_rules());
        let mut doc = MemoryDocument::new("foo hello", "plaintext");

        let outcomes = engine
            .on_save(&mut doc, &[CodeActionKind::SOURCE])
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(doc.text(), "bar world");
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn test_update_settings_replaces_rules() {
        let mut engine = engine(two_rules());
        let before = engine.rules();

        engine
            .update_settings(Settings::new().with_rule(json!({"search": "z", "replace": "Z"})))
            .unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(engine.rules().len(), 1);
    }

    #[test]
    fn test_file_events_trigger_reload() {
        let dir = TempDir::new().unwrap();
        let rules_path = dir.path().join("rules.json");
        fs::write(&rules_path, r#"[{"search": "a", "replace": "b"}]"#).unwrap();

        let loader = RuleLoader::new()
            .workspace_root(dir.path())
            .vars(MapVars::new());
        let mut engine = ReplaceRules::new(loader, Settings::new().with_rule_file("rules.json"));
        assert_eq!(engine.rules().len(), 1);
        assert!(!engine.poll_file_events());

        fs::write(
            &rules_path,
            r#"[{"search": "a", "replace": "b"}, {"search": "c", "replace": "d"}]"#,
        )
        .unwrap();
        engine
            .file_events()
            .send(RuleFileEvent::Changed(rules_path.clone()))
            .unwrap();

        assert!(engine.poll_file_events());
        assert_eq!(engine.rules().len(), 2);

        fs::remove_file(&rules_path).unwrap();
        engine
            .file_events()
            .send(RuleFileEvent::Changed(rules_path))
            .unwrap();
        assert!(engine.wait_for_file_event(Duration::from_millis(10)));
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn test_watch_and_rewatch() {
        let dir = TempDir::new().unwrap();
        let loader = RuleLoader::new()
            .workspace_root(dir.path())
            .vars(MapVars::new());
        let mut engine = ReplaceRules::new(loader, Settings::new().with_rule_file("a.json"));

        engine.watch().unwrap();
        assert!(engine.is_watching());

        engine
            .update_settings(Settings::new().with_rule_file("b.json"))
            .unwrap();
        assert_eq!(engine.rule_file_paths(), vec![dir.path().join("b.json")]);
        assert_eq!(
            engine.watched_paths(),
            Some(engine.rule_file_paths().as_slice())
        );
    }

    #[test]
    fn test_update_settings_without_watch_stays_unwatched() {
        let mut engine = engine(Settings::new().with_rule_file("a.json"));
        engine
            .update_settings(Settings::new().with_rule_file("b.json"))
            .unwrap();
        assert!(!engine.is_watching());
        assert!(engine.watched_paths().is_none());
    }

    /// Waits for watcher-driven reloads until the rule count reaches `expected`.
    ///
    /// A single write can surface as several events, and an early one may
    /// reload a half-written file, so this keeps waiting until the count settles.
    fn reload_until(engine: &mut ReplaceRules, expected: usize) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            engine.wait_for_file_event(Duration::from_millis(100));
            if engine.rules().len() == expected {
                return true;
            }
        }
        false
    }

    fn watched_engine(dir: &TempDir, file: &str) -> ReplaceRules {
        let loader = RuleLoader::new()
            .workspace_root(dir.path())
            .vars(MapVars::new());
        let mut engine = ReplaceRules::new(loader, Settings::new().with_rule_file(file));
        engine.watch().unwrap();
        engine
    }

    #[test]
    fn test_watch_reloads_on_modify() {
        let dir = TempDir::new().unwrap();
        let rules_path = dir.path().join("rules.json");
        fs::write(&rules_path, r#"[{"search": "a", "replace": "b"}]"#).unwrap();

        let mut engine = watched_engine(&dir, "rules.json");
        assert_eq!(engine.rules().len(), 1);

        fs::write(
            &rules_path,
            r#"[{"search": "a", "replace": "b"}, {"search": "c", "replace": "d"}]"#,
        )
        .unwrap();
        assert!(reload_until(&mut engine, 2));
    }

    #[test]
    fn test_watch_picks_up_created_file() {
        let dir = TempDir::new().unwrap();
        let mut engine = watched_engine(&dir, "later.json");
        assert!(engine.rules().is_empty());

        fs::write(
            dir.path().join("later.json"),
            r#"[{"search": "x", "replace": "y"}]"#,
        )
        .unwrap();
        assert!(reload_until(&mut engine, 1));
    }

    #[test]
    fn test_watch_follows_updated_settings() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"search": "a", "replace": "b"}]"#).unwrap();
        let mut engine = watched_engine(&dir, "a.json");

        engine
            .update_settings(Settings::new().with_rule_file("b.json"))
            .unwrap();
        assert!(engine.rules().is_empty());

        fs::write(
            dir.path().join("b.json"),
            r#"[{"search": "1", "replace": "2"}, {"search": "3", "replace": "4"}]"#,
        )
        .unwrap();
        assert!(reload_until(&mut engine, 2));
    }
}
