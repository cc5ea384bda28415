//! Utility functions for flushvc
//!
//! File writes that must never be observed half-done, empty directory
//! pruning, and conversion between file system paths and the
//! `/`-separated relative keys used in the ledger and in trees.

use crate::error::{FlushError, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::trace;

/// Write a file atomically
///
/// Content goes to a temporary file in the same directory which is then
/// renamed over `path`, so readers see either the old file or the new one.
/// Parent directories are created as needed.
///
/// # Errors
///
/// - [`FlushError::Io`] if the temporary file cannot be created, written or
///   persisted
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| FlushError::Io(e.error))?;

    trace!("Atomically wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

/// Remove directory if empty
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
        trace!("Removed empty directory: {:?}", path);
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Remove empty directories from `start` upward, stopping at `stop`
///
/// `stop` itself is never removed. The first failure ends the walk.
pub fn prune_empty_parents(start: &Path, stop: &Path) -> usize {
    let mut removed = 0;
    let mut current = start.to_path_buf();

    while current != stop && current.starts_with(stop) {
        match remove_dir_if_empty(&current) {
            Ok(true) => removed += 1,
            _ => break,
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    removed
}

/// Check that a relative key is usable as a ledger path and tree path
///
/// Keys are `/`-separated, non-empty, with no empty, `.` or `..`
/// components and no line breaks.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(FlushError::invalid_path(key, "path is empty"));
    }
    if key.contains('\n') || key.contains('\r') {
        return Err(FlushError::invalid_path(key, "path contains a line break"));
    }
    if key.contains('\\') {
        return Err(FlushError::invalid_path(key, "path contains a backslash"));
    }
    for component in key.split('/') {
        match component {
            "" => return Err(FlushError::invalid_path(key, "empty path component")),
            "." | ".." => {
                return Err(FlushError::invalid_path(
                    key,
                    format!("'{}' component is not allowed", component),
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Convert a relative file system path into a `/`-separated key
pub fn path_to_key(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    FlushError::invalid_path(relative.to_string_lossy(), "path is not valid UTF-8")
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(FlushError::invalid_path(
                    relative.to_string_lossy(),
                    "path must be relative to the working directory",
                ))
            }
        }
    }

    let key = parts.join("/");
    validate_key(&key)?;
    Ok(key)
}

/// Resolve a key against a root directory
pub fn key_to_path(root: &Path, key: &str) -> PathBuf {
    key.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Make a user-supplied path relative to the working directory
///
/// Relative inputs are taken as already relative to `base`. Absolute inputs
/// must lie under `base`; the check is lexical first and falls back to
/// canonicalized paths.
pub fn make_relative(path: &Path, base: &Path) -> Result<PathBuf> {
    if path.is_relative() {
        return Ok(path.to_path_buf());
    }
    if let Ok(relative) = path.strip_prefix(base) {
        return Ok(relative.to_path_buf());
    }

    let canonical_path = path.canonicalize()?;
    let canonical_base = base.canonicalize()?;
    canonical_path
        .strip_prefix(&canonical_base)
        .map(Path::to_path_buf)
        .map_err(|_| {
            FlushError::invalid_path(
                path.to_string_lossy(),
                format!("not inside the working directory {:?}", base),
            )
        })
}
