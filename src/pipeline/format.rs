//! Format-name normalisation shared by the invokers and the orchestrator.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static UNSAFE_STEM_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"));

/// Map a user-facing format tag to the name pandoc expects for `--from`/`--to`.
pub fn pandoc_format(format: &str) -> String {
    let f = format.trim().to_ascii_lowercase();
    match f.as_str() {
        "markdown" | "md" => "markdown".to_string(),
        "text" | "txt" | "plain" => "plain".to_string(),
        "htm" => "html".to_string(),
        _ => f,
    }
}

/// File extension (without dot) for an output in `target_format`.
pub fn output_extension(target_format: &str) -> String {
    let f = target_format.trim().to_ascii_lowercase();
    match f.as_str() {
        "markdown" | "md" => "md".to_string(),
        "text" | "txt" | "plain" => "txt".to_string(),
        _ => f,
    }
}

/// `<stem>-<task_id>.<ext>` for the converted artifact.
pub fn output_filename(source_filename: &str, task_id: &str, target_format: &str) -> String {
    format!(
        "{}-{}.{}",
        safe_stem(source_filename),
        task_id,
        output_extension(target_format)
    )
}

/// Name of the markdown file extracted from a PDF before pandoc runs.
pub fn intermediate_filename(source_filename: &str, task_id: &str) -> String {
    format!("{}-{}.source.md", safe_stem(source_filename), task_id)
}

/// Extension hint for the shortcut converter: the declared format if any,
/// else the path's extension, lower-cased and without a leading dot.
pub fn extension_hint(declared: Option<&str>, path: &Path) -> Option<String> {
    let raw = declared
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(str::to_string)
        })?;
    let hint = raw.trim_start_matches('.').to_ascii_lowercase();
    if hint.is_empty() {
        None
    } else {
        Some(hint)
    }
}

/// Lower-cased extension of `filename`, used to infer an undeclared format.
pub fn infer_format(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// Filename stem reduced to characters that are safe in any filesystem.
pub fn safe_stem(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let cleaned = UNSAFE_STEM_CHARS.replace_all(stem, "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}
