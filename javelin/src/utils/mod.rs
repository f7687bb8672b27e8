//! Small helpers shared across modules: glob expansion and size formatting.

use std::path::{Path, PathBuf};

use crate::error::{JavelinError, Result};

/// Expand glob patterns into paths, in pattern order.
///
/// A pattern without glob metacharacters is passed through as-is, so a
/// missing literal path surfaces later as a proper file-not-found error
/// rather than silently expanding to nothing.
///
/// # Errors
///
/// Returns [`JavelinError::InvalidConfig`] for a malformed pattern or an
/// unreadable directory during expansion.
pub fn collect_paths_for_patterns<T>(patterns: T) -> Result<Vec<PathBuf>>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    let mut resolved = Vec::new();
    for pattern in patterns {
        resolved.extend(collect_paths_for_pattern(pattern.as_ref())?);
    }
    Ok(resolved)
}

fn collect_paths_for_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    if !is_glob(pattern) {
        return Ok(vec![PathBuf::from(pattern)]);
    }

    let entries = glob::glob(pattern).map_err(|e| {
        JavelinError::invalid_config(format!("Invalid pattern '{pattern}': {e}"))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| JavelinError::invalid_config(e.to_string()))?);
    }
    Ok(paths)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Format a byte count, e.g. `"1.50 KB"`.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}

/// File stem of `path`, or `fallback` when it has none.
pub fn file_stem_or<'a>(path: &'a Path, fallback: &'a str) -> &'a str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

/// Lowercased extension of `path`, if any.
pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
