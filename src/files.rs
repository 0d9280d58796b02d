//! Collects the files a batch apply should touch.

use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Expands files and directories into the list of files to process.
#[derive(Debug, Default, Clone)]
pub struct FileCollector {
    extensions: Vec<String>,
    exclude_globs: Vec<String>,
}

impl FileCollector {
    /// Creates a collector with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only collects files with the given extension (without dot) from directories.
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extensions.push(ext.into());
        self
    }

    /// Excludes files matching the glob pattern, relative to the walked directory.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_globs.push(pattern.into());
        self
    }

    /// Collects files from `paths`.
    ///
    /// Paths naming a file are taken as-is; directories are walked recursively
    /// and filtered.
    pub fn collect(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let exclude_set = self.build_glob_set()?;
        let mut files = Vec::new();

        for path in paths {
            if path.is_dir() {
                self.walk(path, &exclude_set, &mut files);
            } else {
                files.push(path.clone());
            }
        }

        Ok(files)
    }

    fn walk(&self, root: &Path, exclude_set: &GlobSet, files: &mut Vec<PathBuf>) {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.depth() > 0
                    && e.file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
            });

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            if !self.extensions.is_empty() {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                    continue;
                }
            }

            let rel_path = path.strip_prefix(root).unwrap_or(path);
            if exclude_set.is_match(rel_path) {
                continue;
            }

            files.push(path.to_path_buf());
        }
    }

    fn build_glob_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_globs {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }
}
