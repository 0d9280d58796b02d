//! Editor language identifiers derived from file paths.

use std::path::Path;

/// Language id used when the extension is unknown.
pub const PLAIN_TEXT: &str = "plaintext";

const LANGUAGES: &[(&str, &[&str])] = &[
    ("rust", &["rs"]),
    ("python", &["py", "pyi"]),
    ("javascript", &["js", "mjs", "cjs"]),
    ("javascriptreact", &["jsx"]),
    ("typescript", &["ts", "mts", "cts"]),
    ("typescriptreact", &["tsx"]),
    ("go", &["go"]),
    ("java", &["java"]),
    ("csharp", &["cs"]),
    ("ruby", &["rb"]),
    ("c", &["c", "h"]),
    ("cpp", &["cpp", "cc", "cxx", "hpp", "hh"]),
    ("json", &["json"]),
    ("markdown", &["md", "markdown"]),
    ("yaml", &["yaml", "yml"]),
    ("toml", &["toml"]),
    ("html", &["html", "htm"]),
    ("css", &["css"]),
    ("shellscript", &["sh", "bash", "zsh"]),
];

/// Returns the language id for a file path, `plaintext` when unknown.
pub fn language_id_for_path(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return PLAIN_TEXT;
    };

    LANGUAGES
        .iter()
        .find(|(_, exts)| exts.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .map(|(id, _)| *id)
        .unwrap_or(PLAIN_TEXT)
}
