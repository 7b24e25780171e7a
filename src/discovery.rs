//! Source and generated-test file discovery.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively find every file under `root` whose extension is in `extensions`.
///
/// A missing root yields an empty list. Unreadable entries are skipped.
pub fn find_sources(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    if !root.is_dir() {
        tracing::warn!("source directory {} not found", root.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::debug!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_extension(e.path(), extensions))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
}

/// Final path component for log lines and prompts; the full path when there is none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Name of the test file generated for `source`: `test_<stem>.<ext>`.
pub fn test_file_name(source: &Path, test_extension: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("test_{stem}.{test_extension}")
}

/// Generated test files (`test_*.<ext>`) directly inside `tests_dir`.
pub fn find_generated_tests(tests_dir: &Path, test_extension: &str) -> Result<Vec<PathBuf>> {
    let pattern = tests_dir.join(format!("test_*.{test_extension}"));
    let pattern = pattern.to_string_lossy();
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::debug!("skipping unreadable test file: {e}"),
        }
    }
    files.sort();
    Ok(files)
}
