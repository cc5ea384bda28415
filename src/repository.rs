//! Repository handle
//!
//! [`Repository`] ties the object store, the bowl, refs and the working
//! directory together and exposes the operations a front end needs. Every
//! operation takes the handle explicitly; there is no process-wide state, so
//! several repositories can be open at once.
//!
//! ## Layout
//!
//! ```text
//! <workdir>/
//! ├── .flush/
//! │   ├── objects/<hex>   # compressed framed objects
//! │   ├── bowl            # staging ledger
//! │   ├── HEAD            # active ref name
//! │   ├── refs/<name>     # commit hash, absent until the first flush
//! │   └── config.json     # repository configuration
//! └── ... tracked files
//! ```
//!
//! ## Example
//!
//! ```rust
//! use flushvc::Repository;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let repo = Repository::init(dir.path().to_path_buf())?;
//!
//! std::fs::write(dir.path().join("test.txt"), "A test file\nWith two lines\n")?;
//! repo.stage_paths(&[PathBuf::from("test.txt")], false)?;
//! let flushed = repo.commit_staged("First flush")?;
//!
//! let log = repo.show_log()?;
//! assert_eq!(log.len(), 1);
//! assert_eq!(log[0].hash, flushed.commit);
//! # Ok(())
//! # }
//! ```

use crate::bowl::Bowl;
use crate::checkout;
use crate::codec::{ObjectHash, ObjectKind};
use crate::compression::{CompressionEngine, CompressionStrategy};
use crate::error::{FlushError, Result};
use crate::history::{self, Log};
use crate::object::Object;
use crate::refs::{self, RefStore};
use crate::storage::ObjectStore;
use crate::tree;
use crate::types::{
    CheckoutResult, CommitResult, LogEntry, RepositoryConfig, StageReport, StagingSummary,
};
use crate::utils;
use crate::worktree::WorkTree;
use chrono::Utc;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Name of the control directory inside the working directory
pub const CONTROL_DIR: &str = ".flush";

const BOWL_FILE: &str = "bowl";
const CONFIG_FILE: &str = "config.json";

/// Handle on one repository
#[derive(Debug)]
pub struct Repository {
    workdir: PathBuf,
    control: PathBuf,
    store: ObjectStore,
    refs: RefStore,
    worktree: WorkTree,
    config: RepositoryConfig,
}

impl Repository {
    /// Initialize a repository in `workdir` with default configuration
    ///
    /// # Errors
    ///
    /// - [`FlushError::RepositoryAlreadyInitialized`] if `workdir` already has
    ///   a control directory
    /// - [`FlushError::Io`] if `workdir` does not exist or is not writable
    pub fn init(workdir: PathBuf) -> Result<Self> {
        RepositoryBuilder::new().init(workdir)
    }

    /// Open the repository in `workdir`
    ///
    /// A missing `config.json` falls back to the default configuration.
    ///
    /// # Errors
    ///
    /// - [`FlushError::RepositoryNotInitialized`] if there is no control
    ///   directory
    #[instrument]
    pub fn open(workdir: PathBuf) -> Result<Self> {
        let control = workdir.join(CONTROL_DIR);
        if !control.is_dir() {
            return Err(FlushError::RepositoryNotInitialized(workdir));
        }

        let config = match fs::read_to_string(control.join(CONFIG_FILE)) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == ErrorKind::NotFound => RepositoryConfig::default(),
            Err(e) => return Err(e.into()),
        };

        let store = ObjectStore::open(control.join("objects"), CompressionEngine::new(config.compression))
            .map_err(|_| FlushError::RepositoryNotInitialized(workdir.clone()))?;
        let refs = RefStore::open(control.clone())
            .map_err(|_| FlushError::RepositoryNotInitialized(workdir.clone()))?;
        let worktree = WorkTree::new(workdir.clone(), control.clone(), &config.ignore_patterns)?;

        debug!("Opened repository at {:?}", workdir);
        Ok(Self {
            workdir,
            control,
            store,
            refs,
            worktree,
            config,
        })
    }

    fn create(workdir: PathBuf, config: RepositoryConfig) -> Result<Self> {
        info!("Initializing repository in {:?}", workdir);
        if !fs::metadata(&workdir)?.is_dir() {
            return Err(FlushError::invalid_path(
                workdir.to_string_lossy(),
                "working directory is not a directory",
            ));
        }

        let control = workdir.join(CONTROL_DIR);
        if control.exists() {
            return Err(FlushError::RepositoryAlreadyInitialized(workdir));
        }

        // Validate before creating anything
        refs::validate_ref_name(&config.default_ref)?;
        let worktree = WorkTree::new(workdir.clone(), control.clone(), &config.ignore_patterns)?;

        fs::create_dir_all(&control)?;
        let store = ObjectStore::init(control.join("objects"), CompressionEngine::new(config.compression))?;
        let refs = RefStore::init(control.clone(), &config.default_ref)?;
        utils::atomic_write(&control.join(BOWL_FILE), b"")?;
        utils::atomic_write(&control.join(CONFIG_FILE), serde_json::to_string_pretty(&config)?.as_bytes())?;

        info!("Initialized repository, HEAD -> {}", config.default_ref);
        Ok(Self {
            workdir,
            control,
            store,
            refs,
            worktree,
            config,
        })
    }

    /// Stage paths into the bowl
    ///
    /// Each path is a file or directory, relative to the working directory or
    /// absolute inside it. Files are re-hashed and stored; staged paths that
    /// left the working directory are unstaged. With `all`, every working file
    /// and every staged path is reconciled, as is any path naming the working
    /// directory root.
    ///
    /// # Errors
    ///
    /// - [`FlushError::UnknownPath`] if an explicit path is neither in the
    ///   working directory nor staged; the bowl is left unchanged
    #[instrument(skip(self))]
    pub fn stage_paths(&self, paths: &[PathBuf], all: bool) -> Result<StageReport> {
        let mut bowl = self.load_bowl()?;
        let working = self.worktree.list_files()?;

        let mut stage_all = all;
        let mut requested = BTreeSet::new();
        for path in paths {
            let relative = utils::make_relative(path, &self.workdir)?;
            if relative.components().all(|c| matches!(c, std::path::Component::CurDir)) {
                stage_all = true;
                continue;
            }
            requested.insert(self.worktree.key_for(path)?);
        }
        if stage_all {
            requested.extend(working.iter().cloned());
            requested.extend(bowl.live_entries().map(|e| e.path.clone()));
        }
        let requested: Vec<String> = requested.into_iter().collect();

        let report = bowl.reconcile(&requested, &working, |key| {
            let content = self.worktree.read(key)?;
            self.store.put(ObjectKind::Blob, &content)
        })?;

        if !report.is_noop() {
            self.save_bowl(&bowl)?;
        }
        info!(
            "Staged {} added, {} edited, {} removed",
            report.added.len(),
            report.edited.len(),
            report.removed.len()
        );
        Ok(report)
    }

    /// Store the staged snapshot as a tree without committing
    pub fn write_tree(&self) -> Result<ObjectHash> {
        let bowl = self.load_bowl()?;
        let snapshot = bowl.snapshot();
        tree::build_tree(&self.store, snapshot.iter().map(|(p, h)| (p.as_str(), *h)))
    }

    /// Commit the staged snapshot and move the current ref to it
    ///
    /// # Errors
    ///
    /// - [`FlushError::EmptyStage`] if nothing is staged
    #[instrument(skip(self))]
    pub fn commit_staged(&self, message: &str) -> Result<CommitResult> {
        let mut bowl = self.load_bowl()?;
        if !bowl.has_live_entries() {
            return Err(FlushError::EmptyStage);
        }

        let snapshot = bowl.snapshot();
        let tree = tree::build_tree(&self.store, snapshot.iter().map(|(p, h)| (p.as_str(), *h)))?;
        let (ref_name, parent) = self.refs.resolve_head()?;
        let commit = history::create_commit(&self.store, tree, parent, message, Utc::now())?;
        self.refs.update_ref(&ref_name, &commit)?;

        // Plain ledgers carry no markers, so only tracked ones need rewriting
        if bowl.tracks_changes() {
            bowl.clear_markers();
            self.save_bowl(&bowl)?;
        }

        info!("Flushed {} files as {} on {}", snapshot.len(), commit.short(), ref_name);
        Ok(CommitResult {
            commit,
            tree,
            parent,
            ref_name,
            files: snapshot.len(),
        })
    }

    /// Replace the tracked working files with a commit's snapshot
    ///
    /// `target` is a ref name, a full hash or a unique hash prefix. HEAD and
    /// refs are not moved.
    #[instrument(skip(self))]
    pub fn checkout_commit(&self, target: &str) -> Result<CheckoutResult> {
        let commit = self.resolve_commit(target)?;
        let mut bowl = self.load_bowl()?;
        let result = checkout::checkout(&self.store, &self.worktree, &mut bowl, &commit)?;
        self.save_bowl(&bowl)?;
        Ok(result)
    }

    /// History from HEAD, newest first
    pub fn show_log(&self) -> Result<Vec<LogEntry>> {
        self.log()?.collect()
    }

    /// Lazy history walk from HEAD
    pub fn log(&self) -> Result<Log<'_>> {
        let (_, head) = self.refs.resolve_head()?;
        Ok(history::log(&self.store, head))
    }

    /// Framed bytes of an object, exactly as hashed
    pub fn show_object_bytes(&self, hash: &str) -> Result<Vec<u8>> {
        let hash = self.store.resolve_prefix(hash)?;
        Ok(self.store.get(&hash)?.bytes)
    }

    /// Re-hash a stored object and check it against its name
    pub fn verify_object(&self, hash: &str) -> Result<Object> {
        let hash = self.store.resolve_prefix(hash)?;
        self.store.verify(&hash)
    }

    /// Compare the stage against the HEAD commit
    #[instrument(skip(self))]
    pub fn show_staging_summary(&self) -> Result<StagingSummary> {
        let bowl = self.load_bowl()?;
        let (ref_name, head) = self.refs.resolve_head()?;
        let committed = match head {
            Some(commit) => tree::flatten_tree(&self.store, &history::commit_tree(&self.store, &commit)?)?,
            None => Default::default(),
        };
        let staged = bowl.snapshot();

        let mut summary = StagingSummary {
            ref_name,
            head,
            markers: bowl.markers(),
            ..Default::default()
        };
        for (path, hash) in &staged {
            match committed.get(path) {
                None => summary.added.push(path.clone()),
                Some(old) if old != hash => summary.edited.push(path.clone()),
                Some(_) => summary.unchanged += 1,
            }
        }
        summary.deleted = committed
            .keys()
            .filter(|path| !staged.contains_key(*path))
            .cloned()
            .collect();
        summary.untracked = self
            .worktree
            .list_files()?
            .into_iter()
            .filter(|path| bowl.get(path).is_none())
            .collect();

        Ok(summary)
    }

    /// Resolve a ref name, full hash or unique prefix to a commit
    ///
    /// # Errors
    ///
    /// - [`FlushError::UnexpectedKind`] if the hash names a tree or blob
    pub fn resolve_commit(&self, target: &str) -> Result<ObjectHash> {
        let hash = match self.refs.read_ref(target) {
            Ok(Some(hash)) => hash,
            _ => self.store.resolve_prefix(target)?,
        };
        history::read_commit(&self.store, &hash)?;
        Ok(hash)
    }

    /// Commit HEAD resolves to, if any
    pub fn head(&self) -> Result<Option<ObjectHash>> {
        Ok(self.refs.resolve_head()?.1)
    }

    /// Current staging ledger
    pub fn load_bowl(&self) -> Result<Bowl> {
        Bowl::load(&self.control.join(BOWL_FILE), self.config.track_changes)
    }

    fn save_bowl(&self, bowl: &Bowl) -> Result<()> {
        bowl.save(&self.control.join(BOWL_FILE))
    }

    /// Working directory root
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Control directory
    pub fn control_dir(&self) -> &Path {
        &self.control
    }

    /// Configuration in effect
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Object store
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// HEAD and refs
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Working directory access
    pub fn worktree(&self) -> &WorkTree {
        &self.worktree
    }
}

/// Builder for repository configuration
///
/// ```rust
/// use flushvc::{CompressionStrategy, RepositoryBuilder};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let repo = RepositoryBuilder::new()
///     .compression_strategy(CompressionStrategy::Best)
///     .ignore_patterns(vec!["*.log".to_string(), "target/".to_string()])
///     .track_changes(true)
///     .init(dir.path().to_path_buf())?;
/// assert!(repo.config().track_changes);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RepositoryBuilder {
    config: RepositoryConfig,
}

impl RepositoryBuilder {
    /// Builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Ref HEAD starts out pointing at
    pub fn default_ref(mut self, name: impl Into<String>) -> Self {
        self.config.default_ref = name.into();
        self
    }

    /// Compression level for new objects
    pub fn compression_strategy(mut self, strategy: CompressionStrategy) -> Self {
        self.config.compression = strategy;
        self
    }

    /// Glob patterns hidden from the working directory listing
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.ignore_patterns = patterns;
        self
    }

    /// Persist change markers and deletion tombstones in the ledger
    pub fn track_changes(mut self, track: bool) -> Self {
        self.config.track_changes = track;
        self
    }

    /// Initialize a new repository with this configuration
    #[instrument(skip(self))]
    pub fn init(self, workdir: PathBuf) -> Result<Repository> {
        Repository::create(workdir, self.config)
    }

    /// Open `workdir` if it is a repository, otherwise initialize it
    pub fn build(self, workdir: PathBuf) -> Result<Repository> {
        if workdir.join(CONTROL_DIR).is_dir() {
            Repository::open(workdir)
        } else {
            self.init(workdir)
        }
    }
}
