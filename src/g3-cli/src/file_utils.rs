//! File system utilities for common traversal patterns

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Collect files under `path` whose extension matches one of `extensions`
///
/// Extensions are compared case-insensitively and without the dot.
/// Unreadable directory entries are skipped.
pub fn collect_files_with_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        anyhow::bail!("{} is not a directory", path.display());
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want.as_ref())))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();

    files.sort();
    Ok(files)
}
