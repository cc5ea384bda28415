//! HEAD and named refs
//!
//! A ref is a plain-text file under `<control>/refs/` holding one commit
//! hash. HEAD holds a ref *name*, so moving the ref moves HEAD with it:
//!
//! ```text
//! <control>/HEAD          main
//! <control>/refs/main     5d41402abc4b2a76b9719d911017c592ae1a2f0b
//! ```
//!
//! A ref file that does not exist yet means "no commit": that is the state
//! of every fresh repository and is not an error.

use crate::codec::ObjectHash;
use crate::error::{FlushError, Result};
use crate::utils;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Characters that are forbidden anywhere in a ref name
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Validate a ref name
///
/// Names may be nested with `/` but must not be empty, contain whitespace or
/// any of `~ ^ : ? * [ \`, contain `..` or `@{`, start or end with `.` or
/// `/`, end with `.lock`, or have an empty or dot-leading component.
///
/// ```
/// use flushvc::refs::validate_ref_name;
///
/// assert!(validate_ref_name("main").is_ok());
/// assert!(validate_ref_name("team/feature").is_ok());
/// assert!(validate_ref_name("../HEAD").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> Result<()> {
    let reject = |reason: String| {
        Err(FlushError::InvalidRefName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("ref name must not be empty".into());
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return reject(format!("contains forbidden character: {ch:?}"));
    }
    if name.contains("..") {
        return reject("must not contain '..'".into());
    }
    if name.contains("@{") {
        return reject("must not contain '@{'".into());
    }
    if name.starts_with(['.', '/']) || name.ends_with(['.', '/']) {
        return reject("must not start or end with '.' or '/'".into());
    }
    if name.ends_with(".lock") {
        return reject("must not end with '.lock'".into());
    }
    for component in name.split('/') {
        if component.is_empty() {
            return reject("path components must not be empty".into());
        }
        if component.starts_with('.') {
            return reject(format!("component must not start with '.': {component:?}"));
        }
    }
    Ok(())
}

/// HEAD plus the refs directory of one repository
#[derive(Debug, Clone)]
pub struct RefStore {
    root: PathBuf,
}

impl RefStore {
    /// Create the refs directory and point HEAD at `default_ref`
    pub fn init(root: PathBuf, default_ref: &str) -> Result<Self> {
        validate_ref_name(default_ref)?;
        fs::create_dir_all(root.join("refs"))?;
        let store = Self { root };
        store.set_head(default_ref)?;
        debug!("Initialized refs, HEAD -> {}", default_ref);
        Ok(store)
    }

    /// Open an existing control directory
    ///
    /// # Errors
    ///
    /// - [`FlushError::RepositoryNotInitialized`] if HEAD is missing
    pub fn open(root: PathBuf) -> Result<Self> {
        if !root.join("HEAD").is_file() {
            return Err(FlushError::RepositoryNotInitialized(root));
        }
        Ok(Self { root })
    }

    /// Name of the ref HEAD points at
    pub fn head_ref(&self) -> Result<String> {
        let name = fs::read_to_string(self.head_path())?.trim().to_string();
        validate_ref_name(&name)?;
        Ok(name)
    }

    /// Point HEAD at a ref name
    pub fn set_head(&self, name: &str) -> Result<()> {
        validate_ref_name(name)?;
        utils::atomic_write(&self.head_path(), name.as_bytes())?;
        trace!("HEAD -> {}", name);
        Ok(())
    }

    /// Commit a ref points at, `None` if the ref has no commit yet
    pub fn read_ref(&self, name: &str) -> Result<Option<ObjectHash>> {
        validate_ref_name(name)?;
        let content = match fs::read_to_string(self.ref_path(name)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        ObjectHash::from_hex(content).map(Some)
    }

    /// Move a ref to a commit
    pub fn update_ref(&self, name: &str, commit: &ObjectHash) -> Result<()> {
        validate_ref_name(name)?;
        utils::atomic_write(&self.ref_path(name), commit.to_hex().as_bytes())?;
        debug!("Ref {} -> {}", name, commit.short());
        Ok(())
    }

    /// HEAD's ref name and the commit it resolves to
    pub fn resolve_head(&self) -> Result<(String, Option<ObjectHash>)> {
        let name = self.head_ref()?;
        let commit = self.read_ref(&name)?;
        Ok((name, commit))
    }

    /// Every ref that points at a commit, sorted by name
    pub fn list_refs(&self) -> Result<Vec<(String, ObjectHash)>> {
        let refs_dir = self.root.join("refs");
        if !refs_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut refs = Vec::new();
        for entry in WalkDir::new(&refs_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&refs_dir) else {
                continue;
            };
            let Ok(name) = utils::path_to_key(relative) else {
                continue;
            };
            // Temporary files left by an interrupted write are not refs
            if validate_ref_name(&name).is_err() {
                continue;
            }
            if let Some(hash) = self.read_ref(&name)? {
                refs.push((name, hash));
            }
        }
        refs.sort();
        Ok(refs)
    }

    /// Control directory holding HEAD
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        utils::key_to_path(&self.root.join("refs"), name)
    }
}
