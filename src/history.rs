//! Commit chain
//!
//! Commits form a single-parent chain. [`Log`] walks it lazily from any
//! commit back to the root, one object read per step.

use crate::codec::{ObjectHash, ObjectKind};
use crate::error::Result;
use crate::object::Commit;
use crate::storage::ObjectStore;
use crate::tree;
use crate::types::LogEntry;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Store a commit object linking `tree` to `parent`
///
/// The parent, when given, must already be a stored commit.
pub fn create_commit(
    store: &ObjectStore,
    tree: ObjectHash,
    parent: Option<ObjectHash>,
    message: &str,
    time: DateTime<Utc>,
) -> Result<ObjectHash> {
    if let Some(parent) = &parent {
        read_commit(store, parent)?;
    }

    let commit = Commit {
        tree,
        parent,
        time,
        message: message.to_string(),
    };
    let hash = store.put(ObjectKind::Commit, &commit.to_payload())?;
    debug!(
        "Created commit {} (tree {}, parent {})",
        hash.short(),
        tree.short(),
        parent.map(|p| p.short()).unwrap_or_else(|| "none".to_string())
    );
    Ok(hash)
}

/// Load and parse a commit
pub fn read_commit(store: &ObjectStore, hash: &ObjectHash) -> Result<Commit> {
    store.get(hash)?.as_commit()
}

/// Walk history from `start` back to the root commit
pub fn log(store: &ObjectStore, start: Option<ObjectHash>) -> Log<'_> {
    Log { store, next: start }
}

/// Lazy iterator over a commit chain, newest first
///
/// Yields an error and stops if a commit cannot be read.
#[derive(Debug)]
pub struct Log<'a> {
    store: &'a ObjectStore,
    next: Option<ObjectHash>,
}

impl Iterator for Log<'_> {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match read_commit(self.store, &hash) {
            Ok(commit) => {
                self.next = commit.parent;
                Some(Ok(LogEntry { hash, commit }))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Blob stored at `path` in a commit's snapshot
pub fn find_path_in_commit(store: &ObjectStore, commit: &Commit, path: &str) -> Result<Option<ObjectHash>> {
    tree::find_path(store, &commit.tree, path)
}

/// Root tree of the commit `hash`
pub fn commit_tree(store: &ObjectStore, hash: &ObjectHash) -> Result<ObjectHash> {
    Ok(read_commit(store, hash)?.tree)
}
