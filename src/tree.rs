//! Building and walking directory trees
//!
//! [`build_tree`] turns a flat `path -> blob` listing into one tree object
//! per directory, children written before their parent. [`flatten_tree`] is
//! its inverse and [`find_path`] descends a stored tree one component at a
//! time.
//!
//! Directory entries are named without a trailing separator, exactly like
//! file entries, and both share one sorted namespace per tree.

use crate::codec::{ObjectHash, ObjectKind};
use crate::error::{FlushError, Result};
use crate::object::{EntryKind, Tree, TreeEntry};
use crate::storage::ObjectStore;
use crate::utils;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// In-memory directory used while building
#[derive(Debug, Default)]
struct DirNode {
    children: BTreeMap<String, Node>,
}

#[derive(Debug)]
enum Node {
    File(ObjectHash),
    Dir(DirNode),
}

impl DirNode {
    fn insert(&mut self, key: &str, blob: ObjectHash) -> Result<()> {
        let mut current = self;
        let mut components = key.split('/').peekable();
        let mut consumed = 0usize;

        while let Some(name) = components.next() {
            consumed += name.len() + 1;
            if components.peek().is_none() {
                if let Some(Node::Dir(_)) = current.children.get(name) {
                    return Err(FlushError::PathCollision(key.to_string()));
                }
                current.children.insert(name.to_string(), Node::File(blob));
                return Ok(());
            }

            let child = current
                .children
                .entry(name.to_string())
                .or_insert_with(|| Node::Dir(DirNode::default()));
            current = match child {
                Node::Dir(dir) => dir,
                Node::File(_) => {
                    let prefix = &key[..consumed - 1];
                    return Err(FlushError::PathCollision(prefix.to_string()));
                }
            };
        }
        Ok(())
    }

    /// Write this directory and everything under it, returning its hash
    fn write(&self, store: &ObjectStore) -> Result<ObjectHash> {
        let mut entries = Vec::with_capacity(self.children.len());
        for (name, child) in &self.children {
            let entry = match child {
                Node::File(hash) => TreeEntry::file(name.clone(), *hash),
                Node::Dir(dir) => TreeEntry::tree(name.clone(), dir.write(store)?),
            };
            entries.push(entry);
        }

        let tree = Tree::new(entries);
        let hash = store.put(ObjectKind::Tree, &tree.to_payload())?;
        trace!("Wrote tree {} with {} entries", hash.short(), tree.entries.len());
        Ok(hash)
    }
}

/// Store a flat `path -> blob` listing as nested tree objects
///
/// Returns the root tree hash. Identical listings always produce the same
/// hash regardless of input order. An empty listing produces the empty tree.
///
/// # Errors
///
/// - [`FlushError::InvalidPath`] for empty, `.` or `..` path components
/// - [`FlushError::PathCollision`] if a path is used both as a file and as a
///   directory
pub fn build_tree<'a, I>(store: &ObjectStore, entries: I) -> Result<ObjectHash>
where
    I: IntoIterator<Item = (&'a str, ObjectHash)>,
{
    let mut root = DirNode::default();
    let mut count = 0usize;
    for (path, blob) in entries {
        utils::validate_key(path)?;
        root.insert(path, blob)?;
        count += 1;
    }

    let hash = root.write(store)?;
    debug!("Built tree {} from {} entries", hash.short(), count);
    Ok(hash)
}

/// Load a stored tree
pub fn read_tree(store: &ObjectStore, hash: &ObjectHash) -> Result<Tree> {
    store.get(hash)?.as_tree()
}

/// Expand a stored tree back into its `path -> blob` listing
pub fn flatten_tree(store: &ObjectStore, hash: &ObjectHash) -> Result<BTreeMap<String, ObjectHash>> {
    let mut out = BTreeMap::new();
    flatten_into(store, hash, "", &mut out)?;
    Ok(out)
}

fn flatten_into(
    store: &ObjectStore,
    hash: &ObjectHash,
    prefix: &str,
    out: &mut BTreeMap<String, ObjectHash>,
) -> Result<()> {
    for entry in read_tree(store, hash)?.entries {
        let path = if prefix.is_empty() {
            entry.name
        } else {
            format!("{}/{}", prefix, entry.name)
        };
        match entry.kind {
            EntryKind::File => {
                out.insert(path, entry.hash);
            }
            EntryKind::Tree => flatten_into(store, &entry.hash, &path, out)?,
        }
    }
    Ok(())
}

/// Find the blob stored at `path` under a tree
///
/// Returns `None` if a component is missing, if a file appears where a
/// directory is expected, or if the path names a directory.
pub fn find_path(store: &ObjectStore, tree: &ObjectHash, path: &str) -> Result<Option<ObjectHash>> {
    let mut current = *tree;
    let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();

    while let Some(name) = components.next() {
        let tree = read_tree(store, &current)?;
        let Some(entry) = tree.get(name) else {
            return Ok(None);
        };
        let last = components.peek().is_none();
        match (entry.kind, last) {
            (EntryKind::File, true) => return Ok(Some(entry.hash)),
            (EntryKind::Tree, false) => current = entry.hash,
            _ => return Ok(None),
        }
    }

    Ok(None)
}
