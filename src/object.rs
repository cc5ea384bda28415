//! Typed views over stored objects
//!
//! The store hands back a generic [`Object`]. Trees and commits are parsed
//! out of its payload on demand with [`Object::as_tree`] and
//! [`Object::as_commit`], and serialized back with [`Tree::to_payload`] and
//! [`Commit::to_payload`].
//!
//! Tree payload, one entry per line, sorted by name:
//!
//! ```text
//! tree 0123...cdef src
//! file 89ab...4567 README.md
//! ```
//!
//! Commit payload:
//!
//! ```text
//! tree <hex>
//! parent <hex or nothing>
//! time <rfc3339>
//!
//! <message, possibly multi-line>
//! ```

use crate::codec::{ObjectHash, ObjectKind};
use crate::error::{FlushError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// An immutable stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// Hash the object is stored under
    pub hash: ObjectHash,
    /// Kind from the frame header
    pub kind: ObjectKind,
    /// Framed bytes as stored (before compression)
    pub bytes: Vec<u8>,
    /// Offset of the payload within `bytes`
    pub header_len: usize,
}

impl Object {
    /// Payload without the frame header
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.header_len..]
    }

    /// Interpret this object as a tree
    pub fn as_tree(&self) -> Result<Tree> {
        self.expect_kind(ObjectKind::Tree)?;
        Tree::parse(self.payload())
    }

    /// Interpret this object as a commit
    pub fn as_commit(&self) -> Result<Commit> {
        self.expect_kind(ObjectKind::Commit)?;
        Commit::parse(self.payload())
    }

    fn expect_kind(&self, expected: ObjectKind) -> Result<()> {
        if self.kind != expected {
            return Err(FlushError::UnexpectedKind {
                hash: self.hash.to_hex(),
                expected: expected.tag(),
                actual: self.kind.tag(),
            });
        }
        Ok(())
    }
}

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Points at a blob
    File,
    /// Points at a subtree
    Tree,
}

impl EntryKind {
    /// Tag written in tree payload lines
    pub fn tag(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Tree => "tree",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "file" => Some(EntryKind::File),
            "tree" => Some(EntryKind::Tree),
            _ => None,
        }
    }
}

/// One line of a tree object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File or subtree
    pub kind: EntryKind,
    /// Hash of the blob or subtree
    pub hash: ObjectHash,
    /// Name within the parent directory, never containing a separator
    pub name: String,
}

impl TreeEntry {
    /// Entry pointing at a blob
    pub fn file(name: impl Into<String>, hash: ObjectHash) -> Self {
        Self {
            kind: EntryKind::File,
            hash,
            name: name.into(),
        }
    }

    /// Entry pointing at a subtree
    pub fn tree(name: impl Into<String>, hash: ObjectHash) -> Self {
        Self {
            kind: EntryKind::Tree,
            hash,
            name: name.into(),
        }
    }
}

/// Parsed directory listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    /// Entries sorted by name
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree, sorting entries by name
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Serialize to the tree payload format
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(entry.kind.tag());
            out.push(' ');
            out.push_str(&entry.hash.to_hex());
            out.push(' ');
            out.push_str(&entry.name);
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Parse a tree payload
    ///
    /// Lines split into at most three fields, so names may contain spaces.
    /// Blank lines are ignored. Names must be single path components, unique
    /// and already in sorted order.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| FlushError::MalformedTree(format!("payload is not UTF-8: {}", e)))?;

        let mut entries = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.splitn(3, ' ').collect();
            if fields.len() != 3 || fields[2].is_empty() {
                return Err(FlushError::MalformedTree(format!(
                    "line {} has {} fields, expected 3: {:?}",
                    line_no + 1,
                    fields.len(),
                    line
                )));
            }
            let kind = EntryKind::from_tag(fields[0]).ok_or_else(|| {
                FlushError::MalformedTree(format!("line {}: unknown entry kind {:?}", line_no + 1, fields[0]))
            })?;
            let hash = ObjectHash::from_hex(fields[1]).map_err(|_| {
                FlushError::MalformedTree(format!("line {}: bad hash {:?}", line_no + 1, fields[1]))
            })?;
            let name = fields[2];
            if let Some(reason) = invalid_entry_name(name) {
                return Err(FlushError::MalformedTree(format!(
                    "line {}: entry name {:?} {}",
                    line_no + 1,
                    name,
                    reason
                )));
            }
            if let Some(prev) = entries.last().map(|e: &TreeEntry| e.name.as_str()) {
                if name == prev {
                    return Err(FlushError::MalformedTree(format!(
                        "line {}: duplicate entry {:?}",
                        line_no + 1,
                        name
                    )));
                }
                if name < prev {
                    return Err(FlushError::MalformedTree(format!(
                        "line {}: entry {:?} is out of order after {:?}",
                        line_no + 1,
                        name,
                        prev
                    )));
                }
            }
            entries.push(TreeEntry {
                kind,
                hash,
                name: name.to_string(),
            });
        }

        Ok(Self { entries })
    }
}

fn invalid_entry_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("is empty")
    } else if name == "." || name == ".." {
        Some("is a relative component")
    } else if name.contains(['/', '\\', '\n', '\r']) {
        Some("contains a separator or line break")
    } else {
        None
    }
}

/// Parsed commit ("flush")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Root tree of the snapshot
    pub tree: ObjectHash,
    /// Previous commit, absent only for the first commit in a history
    pub parent: Option<ObjectHash>,
    /// When the commit was made
    pub time: DateTime<Utc>,
    /// Free-form message, possibly multi-line
    pub message: String,
}

impl Commit {
    /// Serialize to the commit payload format
    pub fn to_payload(&self) -> Vec<u8> {
        let parent = self.parent.map(|p| p.to_hex()).unwrap_or_default();
        format!(
            "tree {}\nparent {}\ntime {}\n\n{}",
            self.tree.to_hex(),
            parent,
            self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.message
        )
        .into_bytes()
    }

    /// Parse a commit payload
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| FlushError::MalformedCommit(format!("payload is not UTF-8: {}", e)))?;

        let lines: Vec<&str> = text.splitn(5, '\n').collect();
        if lines.len() < 4 {
            return Err(FlushError::MalformedCommit(format!(
                "expected at least 4 lines, found {}",
                lines.len()
            )));
        }

        let tree = header_value(lines[0], "tree")?;
        let tree = ObjectHash::from_hex(tree)
            .map_err(|_| FlushError::MalformedCommit(format!("bad tree hash {:?}", tree)))?;

        let parent = header_value(lines[1], "parent")?;
        let parent = if parent.is_empty() {
            None
        } else {
            Some(
                ObjectHash::from_hex(parent)
                    .map_err(|_| FlushError::MalformedCommit(format!("bad parent hash {:?}", parent)))?,
            )
        };

        let time = header_value(lines[2], "time")?;
        let time = DateTime::parse_from_rfc3339(time)
            .map_err(|e| FlushError::MalformedCommit(format!("bad time {:?}: {}", time, e)))?
            .with_timezone(&Utc);

        if !lines[3].is_empty() {
            return Err(FlushError::MalformedCommit(
                "header is not followed by a blank line".to_string(),
            ));
        }

        Ok(Self {
            tree,
            parent,
            time,
            message: lines.get(4).copied().unwrap_or_default().to_string(),
        })
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_payload()))
    }
}

fn header_value<'a>(line: &'a str, key: &str) -> Result<&'a str> {
    line.strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| FlushError::MalformedCommit(format!("expected '{} ' line, found {:?}", key, line)))
}
