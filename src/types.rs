//! Shared types for flushvc
//!
//! - **Configuration**: [`RepositoryConfig`], persisted in the control directory
//! - **Operations**: [`StageReport`], [`CommitResult`], [`CheckoutResult`],
//!   [`StagingSummary`] and [`LogEntry`], returned by the repository handle
//!
//! ## Examples
//!
//! ```rust
//! use flushvc::types::RepositoryConfig;
//! use flushvc::compression::CompressionStrategy;
//!
//! let config = RepositoryConfig {
//!     compression: CompressionStrategy::Best,
//!     ignore_patterns: vec!["*.log".to_string()],
//!     ..Default::default()
//! };
//! assert_eq!(config.default_ref, "main");
//! ```

use crate::bowl::Change;
use crate::codec::ObjectHash;
use crate::compression::CompressionStrategy;
use crate::object::Commit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ref HEAD points at in a fresh repository
pub const DEFAULT_REF: &str = "main";

/// Repository configuration
///
/// Stored as JSON at `<control>/config.json`. Every field has a default so
/// older or hand-written config files still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Ref name HEAD is initialized to
    pub default_ref: String,
    /// Compression level for new objects
    pub compression: CompressionStrategy,
    /// Glob patterns excluded from the working directory listing
    pub ignore_patterns: Vec<String>,
    /// Persist change markers and deletion tombstones in the ledger
    pub track_changes: bool,
    /// flushvc version that wrote this config
    pub version: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_ref: DEFAULT_REF.to_string(),
            compression: CompressionStrategy::default(),
            ignore_patterns: Vec::new(),
            track_changes: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// What a staging call did to the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// Paths staged for the first time
    pub added: Vec<String>,
    /// Staged paths whose content changed
    pub edited: Vec<String>,
    /// Paths re-hashed with identical content
    pub unchanged: Vec<String>,
    /// Paths removed from the stage because they left the working directory
    pub removed: Vec<String>,
}

impl StageReport {
    /// True when the ledger did not change
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.edited.is_empty() && self.removed.is_empty()
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    /// Hash of the new commit
    pub commit: ObjectHash,
    /// Root tree it snapshots
    pub tree: ObjectHash,
    /// Previous commit, if any
    pub parent: Option<ObjectHash>,
    /// Ref that was moved
    pub ref_name: String,
    /// Number of files in the snapshot
    pub files: usize,
}

/// Result of a checkout operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutResult {
    /// Commit that was checked out
    pub commit: Option<ObjectHash>,
    /// Number of tracked files removed before materializing
    pub files_deleted: usize,
    /// Number of files written from the target tree
    pub files_written: usize,
    /// Total bytes written
    pub bytes_written: u64,
    /// Time taken in milliseconds
    pub duration_ms: u64,
    /// Non-fatal problems encountered while removing old files
    pub warnings: Vec<String>,
}

/// Staged state compared against the HEAD commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSummary {
    /// Ref HEAD points at
    pub ref_name: String,
    /// Commit HEAD resolves to, absent before the first commit
    pub head: Option<ObjectHash>,
    /// Staged paths not in the HEAD tree
    pub added: Vec<String>,
    /// Staged paths whose blob differs from the HEAD tree
    pub edited: Vec<String>,
    /// HEAD tree paths no longer staged
    pub deleted: Vec<String>,
    /// Number of staged paths identical to the HEAD tree
    pub unchanged: usize,
    /// Working files not in the stage at all
    pub untracked: Vec<String>,
    /// Change markers persisted in the ledger
    pub markers: BTreeMap<String, Change>,
}

impl StagingSummary {
    /// True when the stage matches HEAD exactly
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.edited.is_empty() && self.deleted.is_empty()
    }
}

/// One step of a history walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Commit hash
    pub hash: ObjectHash,
    /// Parsed commit
    pub commit: Commit,
}
