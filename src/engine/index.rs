//! Template tree indexing.
//!
//! Walks a template root once per generation run and produces the flat list
//! of file entries the materializer works from. Directories are traversed
//! but never indexed; traversal order is not guaranteed stable across runs.

use crate::error::ScaffoldError;
use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};
use walkdir::WalkDir;

/// Metadata for a single file beneath the template root.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateFileMeta {
    /// Path relative to the template root, posix-style separators.
    pub rel: String,
    /// Absolute path of the source file.
    pub abs: PathBuf,
    pub size: u64,
    /// POSIX permission bits (0o644 placeholder on non-unix platforms).
    pub mode: u32,
    pub modified: Option<SystemTime>,
}

/// Posix-style relative path of `path` under `root`.
pub(crate) fn rel_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

/// Recursively index every file beneath `root`.
///
/// A missing or unreadable root is a configuration error and aborts the
/// whole generation run; there is no per-file recovery here.
pub fn load_template_index(root: &Path) -> Result<Vec<TemplateFileMeta>, ScaffoldError> {
    if !root.is_dir() {
        return Err(ScaffoldError::Config(format!(
            "templates root not found: {}",
            root.display()
        )));
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| ScaffoldError::Walk(root.to_path_buf(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| ScaffoldError::Walk(entry.path().to_path_buf(), e))?;
        out.push(TemplateFileMeta {
            rel: rel_key(root, entry.path()),
            abs: entry.path().to_path_buf(),
            size: meta.len(),
            mode: mode_bits(&meta),
            modified: meta.modified().ok(),
        });
    }
    Ok(out)
}

#[cfg(unix)]
fn mode_bits(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

#[cfg(not(unix))]
fn mode_bits(_meta: &std::fs::Metadata) -> u32 {
    0o644
}
