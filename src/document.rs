//! Documents the rules are applied to.

use crate::diff::{colorized_diff, unified_diff, DiffSummary};
use crate::error::{ReplaceError, Result};
use crate::language::language_id_for_path;
use std::fs;
use std::path::{Path, PathBuf};

/// A replacement of the byte range `start..end` of the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
}

impl TextEdit {
    /// Create a new text edit.
    pub fn new(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            new_text: new_text.into(),
        }
    }

    /// Returns true if the two edits cannot be applied together unambiguously.
    pub fn conflicts_with(&self, other: &TextEdit) -> bool {
        self.start == other.start || (self.start < other.end && other.start < self.end)
    }
}

/// Applies sorted, non-overlapping edits to `text` in one pass.
///
/// Offsets refer to `text`, so no edit shifts another.
pub fn apply_text_edits(text: &str, edits: &[TextEdit]) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for edit in edits {
        if edit.start < cursor || edit.end < edit.start || edit.end > text.len() {
            return Err(ReplaceError::EditFailed {
                message: format!(
                    "edit {}..{} is out of order or out of bounds",
                    edit.start, edit.end
                ),
            });
        }
        let (Some(before), Some(_)) = (text.get(cursor..edit.start), text.get(edit.start..edit.end))
        else {
            return Err(ReplaceError::EditFailed {
                message: format!("edit {}..{} splits a character", edit.start, edit.end),
            });
        };
        out.push_str(before);
        out.push_str(&edit.new_text);
        cursor = edit.end;
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}

/// A text document supplied by the host.
pub trait Document {
    /// Current text.
    fn text(&self) -> &str;

    /// Language identifier, e.g. `python`.
    fn language_id(&self) -> &str;

    /// Applies all edits as one atomic change. Offsets refer to the current text.
    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<()>;
}

/// An in-memory document.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    text: String,
    language_id: String,
    version: u64,
}

impl MemoryDocument {
    /// Creates a document with the given text and language id.
    pub fn new(text: impl Into<String>, language_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language_id: language_id.into(),
            version: 0,
        }
    }

    /// Number of edit batches applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Consumes the document, returning its text.
    pub fn into_text(self) -> String {
        self.text
    }
}

impl Document for MemoryDocument {
    fn text(&self) -> &str {
        &self.text
    }

    fn language_id(&self) -> &str {
        &self.language_id
    }

    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<()> {
        self.text = apply_text_edits(&self.text, edits)?;
        self.version += 1;
        Ok(())
    }
}

/// A document backed by a file on disk.
///
/// Edits change the in-memory text only; [`save`](Self::save) writes it back.
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
    original: String,
    text: String,
    language_id: String,
}

impl FileDocument {
    /// Reads a file, detecting its language from the extension.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(ReplaceError::FileNotFound(path));
        }
        let original = fs::read_to_string(&path)?;
        let language_id = language_id_for_path(&path).to_string();
        Ok(Self {
            text: original.clone(),
            original,
            path,
            language_id,
        })
    }

    /// Overrides the detected language id.
    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = language_id.into();
        self
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Text as read from disk.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Returns true if the content was modified.
    pub fn is_modified(&self) -> bool {
        self.original != self.text
    }

    /// Unified diff between the original and current text.
    pub fn diff(&self) -> String {
        unified_diff(&self.original, &self.text, &self.path)
    }

    /// Colorized diff for terminal display.
    pub fn colorized_diff(&self) -> String {
        colorized_diff(&self.original, &self.text, &self.path)
    }

    /// Line counts of the change.
    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diff(&self.original, &self.text)
    }

    /// Writes the current text to disk if it was modified.
    pub fn save(&mut self) -> Result<bool> {
        if !self.is_modified() {
            return Ok(false);
        }
        fs::write(&self.path, &self.text)?;
        self.original = self.text.clone();
        Ok(true)
    }
}

impl Document for FileDocument {
    fn text(&self) -> &str {
        &self.text
    }

    fn language_id(&self) -> &str {
        &self.language_id
    }

    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<()> {
        self.text = apply_text_edits(&self.text, edits)?;
        Ok(())
    }
}
