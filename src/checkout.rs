//! Checkout ("plunge")
//!
//! Replaces the tracked files in the working directory with the snapshot of
//! a commit, then resets the stage to that snapshot.
//!
//! The target commit and its full tree are read before any file is touched,
//! so a missing or malformed tree, or one that would write into the control
//! directory, fails cleanly. Blob reads and file writes
//! happen afterwards; a failure there leaves the working directory partly
//! rewritten and is reported as-is, without rollback.

use crate::bowl::Bowl;
use crate::codec::{ObjectHash, ObjectKind};
use crate::error::{FlushError, Result};
use crate::history;
use crate::object::EntryKind;
use crate::storage::ObjectStore;
use crate::tree;
use crate::types::CheckoutResult;
use crate::worktree::WorkTree;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Check out `target` into `worktree`, resetting `bowl` to match
///
/// Untracked files are left alone. The caller persists the bowl.
pub fn checkout(
    store: &ObjectStore,
    worktree: &WorkTree,
    bowl: &mut Bowl,
    target: &ObjectHash,
) -> Result<CheckoutResult> {
    let start = Instant::now();
    let root_tree = history::commit_tree(store, target)?;
    let snapshot = tree::flatten_tree(store, &root_tree)?;
    for key in snapshot.keys() {
        worktree.key_for(Path::new(key))?;
    }

    let mut result = CheckoutResult {
        commit: Some(*target),
        ..Default::default()
    };

    for entry in bowl.entries() {
        match worktree.remove(&entry.path) {
            Ok(true) => result.files_deleted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to remove {}: {}", entry.path, e);
                result.warnings.push(format!("failed to remove {}: {}", entry.path, e));
            }
        }
    }
    debug!("Removed {} tracked files", result.files_deleted);

    materialize(store, worktree, &root_tree, "", &mut result)?;
    bowl.reset_to(&snapshot);

    result.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Checked out {}: {} files deleted, {} written",
        target.short(),
        result.files_deleted,
        result.files_written
    );
    Ok(result)
}

fn materialize(
    store: &ObjectStore,
    worktree: &WorkTree,
    tree_hash: &ObjectHash,
    prefix: &str,
    result: &mut CheckoutResult,
) -> Result<()> {
    for entry in tree::read_tree(store, tree_hash)?.entries {
        let key = if prefix.is_empty() {
            entry.name
        } else {
            format!("{}/{}", prefix, entry.name)
        };

        match entry.kind {
            EntryKind::File => {
                let object = store.get(&entry.hash)?;
                if object.kind != ObjectKind::Blob {
                    return Err(FlushError::UnexpectedKind {
                        hash: entry.hash.to_hex(),
                        expected: ObjectKind::Blob.tag(),
                        actual: object.kind.tag(),
                    });
                }
                worktree.write(&key, object.payload())?;
                result.files_written += 1;
                result.bytes_written += object.payload().len() as u64;
            }
            EntryKind::Tree => {
                worktree.create_dir(&key)?;
                materialize(store, worktree, &entry.hash, &key, result)?;
            }
        }
    }
    Ok(())
}
