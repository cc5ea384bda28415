//! Working directory access
//!
//! The only place the repository touches user files. Files are addressed by
//! `/`-separated keys relative to the working directory root. The control
//! directory and anything matching an ignore pattern is invisible here.
//!
//! Ignore patterns are globs. A pattern without `/` matches a name at any
//! depth (`*.log`, `target`); a pattern with `/` matches from the root
//! (`build/*.o`); a trailing `/` restricts a pattern to directories. An
//! ignored directory hides everything under it.

use crate::error::{FlushError, Result};
use crate::utils;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Compiled ignore patterns
#[derive(Debug, Clone)]
struct IgnoreRules {
    any: GlobSet,
    dirs_only: GlobSet,
}

impl IgnoreRules {
    fn new(patterns: &[String]) -> Result<Self> {
        let mut any = GlobSetBuilder::new();
        let mut dirs_only = GlobSetBuilder::new();

        for raw in patterns {
            let raw = raw.trim();
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }
            let (pattern, dir_only) = match raw.strip_suffix('/') {
                Some(stripped) => (stripped, true),
                None => (raw, false),
            };
            let pattern = match pattern.strip_prefix('/') {
                Some(anchored) => anchored.to_string(),
                None if pattern.contains('/') => pattern.to_string(),
                None => format!("**/{}", pattern),
            };
            let glob = GlobBuilder::new(&pattern).literal_separator(true).build()?;
            if dir_only {
                dirs_only.add(glob);
            } else {
                any.add(glob);
            }
        }

        Ok(Self {
            any: any.build()?,
            dirs_only: dirs_only.build()?,
        })
    }

    fn is_ignored(&self, key: &str, is_dir: bool) -> bool {
        self.any.is_match(key) || (is_dir && self.dirs_only.is_match(key))
    }
}

/// Handle on the working directory
#[derive(Debug, Clone)]
pub struct WorkTree {
    root: PathBuf,
    control_dir: PathBuf,
    ignore: IgnoreRules,
}

impl WorkTree {
    /// Wrap a working directory whose control directory is `control_dir`
    pub fn new(root: PathBuf, control_dir: PathBuf, ignore_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            root,
            control_dir,
            ignore: IgnoreRules::new(ignore_patterns)?,
        })
    }

    /// Working directory root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file under the root, as sorted keys
    ///
    /// Skips the control directory, ignored paths, symbolic links and
    /// anything whose name is not valid UTF-8.
    pub fn list_files(&self) -> Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if entry.path() == self.control_dir {
                    return false;
                }
                match self.key_of(entry.path()) {
                    Some(key) => !self.ignore.is_ignored(&key, entry.file_type().is_dir()),
                    None => false,
                }
            });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = self.key_of(entry.path()) {
                files.insert(key);
            }
        }

        debug!("Listed {} working files under {:?}", files.len(), self.root);
        Ok(files)
    }

    /// Read a working file
    pub fn read(&self, key: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_of(key))?)
    }

    /// Write a working file, creating parent directories
    pub fn write(&self, key: &str, content: &[u8]) -> Result<()> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        trace!("Wrote {} ({} bytes)", key, content.len());
        Ok(())
    }

    /// Create a directory and any missing parents
    pub fn create_dir(&self, key: &str) -> Result<()> {
        fs::create_dir_all(self.path_of(key))?;
        trace!("Created directory {}", key);
        Ok(())
    }

    /// Delete a working file and prune directories it leaves empty
    ///
    /// Returns false if the file was already gone.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_of(key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = path.parent() {
            utils::prune_empty_parents(parent, &self.root);
        }
        trace!("Removed {}", key);
        Ok(true)
    }

    /// Whether a key names an existing directory
    pub fn is_dir(&self, key: &str) -> bool {
        self.path_of(key).is_dir()
    }

    /// Turn a user-supplied path into a key
    ///
    /// # Errors
    ///
    /// - [`FlushError::InvalidPath`] if the path is outside the working
    ///   directory or inside the control directory
    pub fn key_for(&self, path: &Path) -> Result<String> {
        let relative = utils::make_relative(path, &self.root)?;
        let key = utils::path_to_key(&relative)?;
        if self.path_of(&key).starts_with(&self.control_dir) {
            return Err(FlushError::invalid_path(key, "path is inside the control directory"));
        }
        Ok(key)
    }

    /// Absolute path for a key
    pub fn path_of(&self, key: &str) -> PathBuf {
        utils::key_to_path(&self.root, key)
    }

    fn key_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        utils::path_to_key(relative).ok()
    }
}
