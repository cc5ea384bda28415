//! Error types for flushvc
//!
//! Every fallible operation in the crate returns [`Result<T>`]. Errors are
//! terminal for the operation that raised them: nothing is retried, and the
//! core never prints. The CLI decides what the user sees.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in flushvc
pub type Result<T> = std::result::Result<T, FlushError>;

/// Main error type for all repository operations
#[derive(Debug, Error)]
pub enum FlushError {
    /// No control directory at the expected location
    #[error("Repository not initialized at path: {0:?}")]
    RepositoryNotInitialized(PathBuf),

    /// `init` against a directory that already has a control directory
    #[error("Repository already initialized at path: {0:?}")]
    RepositoryAlreadyInitialized(PathBuf),

    /// Object not found in the object store
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Stored object failed decompression, framing, or re-hashing
    #[error("Corrupt object {hash}: {reason}")]
    CorruptObject {
        /// Hash the object was stored under
        hash: String,
        /// What went wrong
        reason: String,
    },

    /// Tree payload could not be parsed
    #[error("Malformed tree: {0}")]
    MalformedTree(String),

    /// Commit payload could not be parsed
    #[error("Malformed commit: {0}")]
    MalformedCommit(String),

    /// Framed bytes are missing the header terminator
    #[error("Malformed object: {0}")]
    MalformedObject(String),

    /// Staging ledger line could not be parsed
    #[error("Malformed staging ledger: {0}")]
    MalformedLedger(String),

    /// Explicit add target is neither in the working directory nor staged
    #[error("Unknown path: {0}")]
    UnknownPath(String),

    /// Commit attempted with nothing staged
    #[error("Nothing staged to flush")]
    EmptyStage,

    /// Path is not a usable relative path
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath {
        /// Offending path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// A file and a directory share a name at the same tree level
    #[error("Path collision: {0:?} is both a file and a directory")]
    PathCollision(String),

    /// Ref name failed validation
    #[error("Invalid ref name {name:?}: {reason}")]
    InvalidRefName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Not a 40 character hex digest
    #[error("Invalid object hash: {0:?}")]
    InvalidObjectHash(String),

    /// Short hash matches more than one object
    #[error("Ambiguous object prefix {prefix}: {count} candidates")]
    AmbiguousObject {
        /// The prefix as given
        prefix: String,
        /// How many objects matched
        count: usize,
    },

    /// Object exists but has the wrong kind for the operation
    #[error("Object {hash} is a {actual}, expected a {expected}")]
    UnexpectedKind {
        /// Object hash
        hash: String,
        /// Kind the caller needed
        expected: &'static str,
        /// Kind found on disk
        actual: &'static str,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Ignore pattern failed to compile
    #[error("Invalid ignore pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization of the config
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl FlushError {
    /// Create a corrupt object error
    pub fn corrupt(hash: impl Into<String>, reason: impl Into<String>) -> Self {
        FlushError::CorruptObject {
            hash: hash.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        FlushError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error indicates damaged repository contents
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            FlushError::CorruptObject { .. }
                | FlushError::MalformedTree(_)
                | FlushError::MalformedCommit(_)
                | FlushError::MalformedObject(_)
                | FlushError::MalformedLedger(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            FlushError::RepositoryNotInitialized(path) => {
                format!("No repository at {:?}. Run 'flushvc init' first.", path)
            }
            FlushError::EmptyStage => {
                "Nothing to flush. Stage files with 'flushvc add <path>' or 'flushvc add -A'.".to_string()
            }
            FlushError::UnknownPath(path) => {
                format!("Path '{}' is neither in the working directory nor staged.", path)
            }
            FlushError::AmbiguousObject { prefix, count } => {
                format!("Prefix '{}' matches {} objects. Use more characters.", prefix, count)
            }
            _ => self.to_string(),
        }
    }
}
