//! Change notifications for external rule files via a `notify` watcher.
//!
//! The parent directory of every rule file is watched non-recursively so that
//! a rule file created after startup is picked up too. Matching events are
//! forwarded over a channel; the receiving side decides when to reload.
//!
//! Some platforms do not deliver events for paths outside the workspace or on
//! network file systems. Callers should keep an explicit reload path.

use crate::error::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// A change to a watched rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleFileEvent {
    /// The file was created, modified or removed.
    Changed(PathBuf),
}

/// The set of rule files a watcher reports on.
#[derive(Debug, Clone, Default)]
pub struct WatchTargets {
    files: Vec<(PathBuf, OsString)>,
}

impl WatchTargets {
    /// Builds targets for the given rule file paths.
    pub fn new(paths: &[PathBuf]) -> Self {
        let files = paths
            .iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_os_string();
                let dir = path.parent().map(canonical_dir).unwrap_or_default();
                Some((dir, name))
            })
            .collect();
        Self { files }
    }

    /// Distinct directories to watch.
    pub fn directories(&self) -> BTreeSet<PathBuf> {
        self.files.iter().map(|(dir, _)| dir.clone()).collect()
    }

    /// Returns true if `path` refers to one of the rule files.
    pub fn contains(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let dir = path.parent().map(canonical_dir).unwrap_or_default();
        self.files
            .iter()
            .any(|(target_dir, target_name)| target_name == name && *target_dir == dir)
    }

    /// Returns true if there is nothing to watch.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn canonical_dir(dir: &Path) -> PathBuf {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

/// Forwards a filesystem event if it concerns a rule file.
///
/// Returns the number of events sent.
pub fn handle_fs_event(event: &Event, targets: &WatchTargets, tx: &Sender<RuleFileEvent>) -> usize {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
        _ => return 0,
    }

    let mut sent = 0;
    for path in &event.paths {
        if !targets.contains(path) {
            continue;
        }
        debug!(path = %path.display(), kind = ?event.kind, "rule file changed");
        if tx.send(RuleFileEvent::Changed(path.clone())).is_ok() {
            sent += 1;
        }
    }
    sent
}

/// Watches rule files and reports changes on a channel.
pub struct RuleWatcher {
    paths: Vec<PathBuf>,
    tx: Sender<RuleFileEvent>,
    _watcher: RecommendedWatcher,
}

impl RuleWatcher {
    /// Starts watching `paths`, sending change events to `tx`.
    pub fn new(paths: Vec<PathBuf>, tx: Sender<RuleFileEvent>) -> Result<Self> {
        let targets = WatchTargets::new(&paths);
        let directories = targets.directories();
        let events = tx.clone();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    handle_fs_event(&event, &targets, &events);
                }
                Err(e) => warn!(error = %e, "rule file watcher error"),
            },
        )?;

        for dir in &directories {
            if !dir.is_dir() {
                warn!(path = %dir.display(), "rule file directory does not exist, not watching");
                continue;
            }
            match watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => info!(path = %dir.display(), "watching rule file directory"),
                Err(e) => warn!(path = %dir.display(), error = %e, "failed to watch rule file directory"),
            }
        }

        Ok(Self {
            paths,
            tx,
            _watcher: watcher,
        })
    }

    /// The rule file paths being watched.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Replaces the watch set. The previous watcher is dropped.
    pub fn rewatch(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        *self = Self::new(paths, self.tx.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn targets(dir: &TempDir) -> WatchTargets {
        WatchTargets::new(&[dir.path().join("rules.json")])
    }

    #[test]
    fn test_targets_contains() {
        let dir = TempDir::new().unwrap();
        let targets = targets(&dir);

        assert!(targets.contains(&dir.path().join("rules.json")));
        assert!(!targets.contains(&dir.path().join("other.json")));
        assert_eq!(targets.directories().len(), 1);
    }

    #[test]
    fn test_modify_event_forwarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        let (tx, rx) = mpsc::channel();

        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(path.clone());

        assert_eq!(handle_fs_event(&event, &targets(&dir), &tx), 1);
        assert_eq!(rx.try_recv().unwrap(), RuleFileEvent::Changed(path));
    }

    #[test]
    fn test_create_and_remove_forwarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        let (tx, _rx) = mpsc::channel();
        let targets = targets(&dir);

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(path);

        assert_eq!(handle_fs_event(&created, &targets, &tx), 1);
        assert_eq!(handle_fs_event(&removed, &targets, &tx), 1);
    }

    #[test]
    fn test_unrelated_events_ignored() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let targets = targets(&dir);

        let other = Event::new(EventKind::Create(CreateKind::File))
            .add_path(dir.path().join("notes.txt"));
        let access = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(dir.path().join("rules.json"));

        assert_eq!(handle_fs_event(&other, &targets, &tx), 0);
        assert_eq!(handle_fs_event(&access, &targets, &tx), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_watcher_tolerates_missing_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("rules.json"), "[]").unwrap();
        let (tx, _rx) = mpsc::channel();

        let paths = vec![
            dir.path().join("rules.json"),
            dir.path().join("missing").join("rules.json"),
        ];
        let mut watcher = RuleWatcher::new(paths.clone(), tx).unwrap();
        assert_eq!(watcher.paths(), paths.as_slice());

        watcher.rewatch(vec![dir.path().join("rules.json")]).unwrap();
        assert_eq!(watcher.paths().len(), 1);
    }
}
