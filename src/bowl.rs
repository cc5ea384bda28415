//! Staging area ("the bowl")
//!
//! The bowl maps working-directory paths to the blob that will go into the
//! next flush. It is held in memory as a path-ordered map and persisted as a
//! text ledger, one line per entry, sorted by path, with no trailing newline:
//!
//! ```text
//! 197fa33f64bfce7ac12607ad567ea8573a38a823 test.txt
//! ```
//!
//! Repositories that track changes prefix each line with its pending marker:
//!
//! ```text
//! add 197fa33f64bfce7ac12607ad567ea8573a38a823 test.txt
//! delete c4a5964fd224738514ccd7354a45d37a5ef1a8b3 old.txt
//! ```
//!
//! The loader accepts both forms in any mix. Paths may contain spaces; the
//! hash is always the token right before the path.
//!
//! A flush does not empty the bowl. It clears the pending markers and drops
//! deletion tombstones, and the remaining entries are the tracked snapshot
//! that the next flush starts from and that a plunge tears down.

use crate::codec::{ObjectHash, HEX_LEN};
use crate::error::{FlushError, Result};
use crate::types::StageReport;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, trace};

/// Pending change recorded against a staged path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    /// Path is new since the last flush
    Add,
    /// Path's content changed since the last flush
    Edit,
    /// Path was removed since the last flush
    Delete,
}

impl Change {
    /// Marker written in the ledger
    pub fn tag(&self) -> &'static str {
        match self {
            Change::Add => "add",
            Change::Edit => "edit",
            Change::Delete => "delete",
        }
    }

    /// Parse a ledger marker
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "add" => Some(Change::Add),
            "edit" => Some(Change::Edit),
            "delete" => Some(Change::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One staged path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BowlEntry {
    /// `/`-separated path relative to the working directory
    pub path: String,
    /// Blob holding the staged content
    pub blob_hash: ObjectHash,
    /// Pending change since the last flush, if any
    pub change: Option<Change>,
}

impl BowlEntry {
    /// True for deletion tombstones
    pub fn is_tombstone(&self) -> bool {
        self.change == Some(Change::Delete)
    }

    fn to_line(&self, with_marker: bool) -> String {
        match self.change {
            Some(change) if with_marker => {
                format!("{} {} {}", change.tag(), self.blob_hash, self.path)
            }
            _ => format!("{} {}", self.blob_hash, self.path),
        }
    }

    fn parse_line(line: &str) -> Result<Self> {
        let (first, rest) = line
            .split_once(' ')
            .ok_or_else(|| FlushError::MalformedLedger(format!("line has no path: {:?}", line)))?;

        let (change, hash, path) = if first.len() == HEX_LEN {
            (None, first, rest)
        } else {
            let change = Change::from_tag(first).ok_or_else(|| {
                FlushError::MalformedLedger(format!("unknown marker {:?} in line {:?}", first, line))
            })?;
            let (hash, path) = rest
                .split_once(' ')
                .ok_or_else(|| FlushError::MalformedLedger(format!("line has no path: {:?}", line)))?;
            (Some(change), hash, path)
        };

        let blob_hash = ObjectHash::from_hex(hash)
            .map_err(|_| FlushError::MalformedLedger(format!("bad hash {:?} in line {:?}", hash, line)))?;
        utils::validate_key(path)
            .map_err(|e| FlushError::MalformedLedger(format!("bad path in line {:?}: {}", line, e)))?;

        Ok(Self {
            path: path.to_string(),
            blob_hash,
            change,
        })
    }
}

/// The staging area
#[derive(Debug, Clone, Default)]
pub struct Bowl {
    entries: BTreeMap<String, BowlEntry>,
    track_changes: bool,
}

impl Bowl {
    /// Empty bowl
    pub fn new(track_changes: bool) -> Self {
        Self {
            entries: BTreeMap::new(),
            track_changes,
        }
    }

    /// Read the ledger at `path`
    ///
    /// A missing or empty ledger yields an empty bowl. Blank lines are
    /// ignored. A path that appears twice keeps its last line.
    pub fn load(path: &Path, track_changes: bool) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut bowl = Self::parse(&text)?;
        bowl.track_changes = track_changes;
        trace!("Loaded {} ledger entries from {:?}", bowl.len(), path);
        Ok(bowl)
    }

    /// Parse ledger text
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let entry = BowlEntry::parse_line(line)?;
            entries.insert(entry.path.clone(), entry);
        }
        Ok(Self {
            entries,
            track_changes: false,
        })
    }

    /// Persist the ledger atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        utils::atomic_write(path, self.to_ledger().as_bytes())?;
        trace!("Saved {} ledger entries to {:?}", self.len(), path);
        Ok(())
    }

    /// Ledger text, sorted by path, no trailing newline
    ///
    /// Markers are only written when the bowl tracks changes.
    pub fn to_ledger(&self) -> String {
        self.entries
            .values()
            .map(|e| e.to_line(self.track_changes))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether markers are persisted
    pub fn tracks_changes(&self) -> bool {
        self.track_changes
    }

    /// Stage a blob for a path, replacing any previous entry for it
    ///
    /// Returns the marker the path now carries, or `None` when the same blob
    /// was already staged. A tombstone restored with its committed content
    /// loses its marker and reports `Edit`.
    pub fn upsert(&mut self, path: impl Into<String>, blob_hash: ObjectHash) -> Result<Option<Change>> {
        let path = path.into();
        utils::validate_key(&path)?;

        let previous = self.entries.get(&path).map(|e| (e.blob_hash, e.change));
        let (change, reported) = match previous {
            None => (Some(Change::Add), Some(Change::Add)),
            // Restored with the committed content
            Some((hash, Some(Change::Delete))) if hash == blob_hash => (None, Some(Change::Edit)),
            Some((hash, _)) if hash == blob_hash => return Ok(None),
            Some((_, Some(Change::Add))) => (Some(Change::Add), Some(Change::Add)),
            Some(_) => (Some(Change::Edit), Some(Change::Edit)),
        };

        trace!("Staged {} as {:?}", path, change);
        self.entries.insert(
            path.clone(),
            BowlEntry {
                path,
                blob_hash,
                change,
            },
        );
        Ok(reported)
    }

    /// Drop a path from the stage
    ///
    /// When tracking changes, a path known to the last flush is kept as a
    /// deletion tombstone until the next flush. Unknown paths are a no-op.
    /// Returns true if the bowl changed.
    pub fn remove(&mut self, path: &str) -> bool {
        let Some(entry) = self.entries.get_mut(path) else {
            return false;
        };

        if self.track_changes && entry.change != Some(Change::Add) {
            if entry.is_tombstone() {
                return false;
            }
            entry.change = Some(Change::Delete);
        } else {
            self.entries.remove(path);
        }
        trace!("Unstaged {}", path);
        true
    }

    /// Bring the stage in line with the working directory for `requested`
    ///
    /// Each requested path names a file or a directory. Every working file
    /// it covers is re-hashed with `hash_file` and upserted, since content
    /// may have changed under an unchanged path. Every staged path it covers
    /// that is no longer in the working directory is removed.
    ///
    /// # Errors
    ///
    /// - [`FlushError::UnknownPath`] if a requested path covers nothing in
    ///   the working directory and nothing in the stage
    pub fn reconcile<F>(
        &mut self,
        requested: &[String],
        working: &BTreeSet<String>,
        mut hash_file: F,
    ) -> Result<StageReport>
    where
        F: FnMut(&str) -> Result<ObjectHash>,
    {
        // Resolve everything before touching the bowl so an unknown path
        // leaves it unchanged.
        let mut to_stage = BTreeSet::new();
        let mut to_remove = BTreeSet::new();
        for target in requested {
            let found_working: Vec<&String> = working.iter().filter(|p| covers(target, p)).collect();
            let found_staged: Vec<&String> = self
                .entries
                .values()
                .filter(|e| !e.is_tombstone() && covers(target, &e.path))
                .map(|e| &e.path)
                .collect();

            if found_working.is_empty() && found_staged.is_empty() {
                return Err(FlushError::UnknownPath(target.clone()));
            }
            to_stage.extend(found_working.into_iter().cloned());
            to_remove.extend(found_staged.into_iter().filter(|p| !working.contains(*p)).cloned());
        }

        let mut report = StageReport::default();
        let mut hashed = Vec::with_capacity(to_stage.len());
        for path in &to_stage {
            hashed.push((path.clone(), hash_file(path)?));
        }
        for (path, hash) in hashed {
            let existed = self.entries.contains_key(&path);
            match self.upsert(path.clone(), hash)? {
                None => report.unchanged.push(path),
                Some(_) if existed => report.edited.push(path),
                Some(_) => report.added.push(path),
            }
        }
        for path in to_remove {
            if self.remove(&path) {
                report.removed.push(path);
            }
        }

        debug!(
            "Reconciled {} paths: {} added, {} edited, {} removed",
            requested.len(),
            report.added.len(),
            report.edited.len(),
            report.removed.len()
        );
        Ok(report)
    }

    /// Clear pending markers and drop tombstones after a flush
    pub fn clear_markers(&mut self) {
        self.entries.retain(|_, e| !e.is_tombstone());
        for entry in self.entries.values_mut() {
            entry.change = None;
        }
    }

    /// Replace the whole stage with a snapshot, no markers
    pub fn reset_to(&mut self, snapshot: &BTreeMap<String, ObjectHash>) {
        self.entries = snapshot
            .iter()
            .map(|(path, hash)| {
                (
                    path.clone(),
                    BowlEntry {
                        path: path.clone(),
                        blob_hash: *hash,
                        change: None,
                    },
                )
            })
            .collect();
    }

    /// Look up a path, tombstones included
    pub fn get(&self, path: &str) -> Option<&BowlEntry> {
        self.entries.get(path)
    }

    /// All entries in path order, tombstones included
    pub fn entries(&self) -> impl Iterator<Item = &BowlEntry> {
        self.entries.values()
    }

    /// Entries that will go into the next flush
    pub fn live_entries(&self) -> impl Iterator<Item = &BowlEntry> {
        self.entries.values().filter(|e| !e.is_tombstone())
    }

    /// Path to blob map of the live entries
    pub fn snapshot(&self) -> BTreeMap<String, ObjectHash> {
        self.live_entries()
            .map(|e| (e.path.clone(), e.blob_hash))
            .collect()
    }

    /// Paths with a pending marker
    pub fn markers(&self) -> BTreeMap<String, Change> {
        self.entries
            .values()
            .filter_map(|e| e.change.map(|c| (e.path.clone(), c)))
            .collect()
    }

    /// Number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when nothing would go into a flush
    pub fn has_live_entries(&self) -> bool {
        self.live_entries().next().is_some()
    }
}

/// Whether `target` names `path` itself or a directory containing it
fn covers(target: &str, path: &str) -> bool {
    path == target
        || (path.len() > target.len()
            && path.starts_with(target)
            && path.as_bytes()[target.len()] == b'/')
}
