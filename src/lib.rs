//! # flushvc - a minimal content-addressed version control engine
//!
//! flushvc snapshots a working directory into immutable, hash-identified
//! objects, links the snapshots into a linear history, and restores the
//! working directory from any of them.
//!
//! ## Overview
//!
//! - Files are staged into the **bowl**, a sorted `path -> blob` ledger
//! - A **flush** turns the bowl into nested tree objects plus a commit that
//!   points at its parent, and moves the current ref
//! - A **plunge** rewrites the tracked working files from any commit and
//!   resets the bowl to match
//!
//! ## Architecture
//!
//! Writes flow one way: working files → [`codec`] framing and SHA-1 →
//! [`storage`] (zlib, write once) → [`bowl`] → [`tree`] builder →
//! [`history`] → [`refs`]. Reads go the other way, from HEAD down to blobs.
//!
//! ## Quick Start
//!
//! ```rust
//! use flushvc::Repository;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let repo = Repository::init(dir.path().to_path_buf())?;
//!
//! std::fs::write(dir.path().join("file1.txt"), "File 1")?;
//! repo.stage_paths(&[PathBuf::from("file1.txt")], false)?;
//! let first = repo.commit_staged("A flush")?;
//!
//! std::fs::write(dir.path().join("file2.txt"), "File 2")?;
//! repo.stage_paths(&[], true)?;
//! repo.commit_staged("Another flush")?;
//!
//! // Back to the first snapshot
//! repo.checkout_commit(&first.commit.to_hex())?;
//! assert!(!dir.path().join("file2.txt").exists());
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! One invocation owns the repository while it runs. There is no lock:
//! concurrent writers to the same repository race on the bowl and on refs,
//! and the last writer wins. Object writes are safe to race since equal
//! content produces equal files.
//!
//! ## Module Organization
//!
//! - [`codec`]: object framing and content hashing
//! - [`storage`]: write-once compressed object store
//! - [`object`]: tree and commit payloads
//! - [`bowl`]: the staging ledger
//! - [`tree`]: building and walking trees
//! - [`history`]: commits and history walks
//! - [`refs`]: HEAD and refs
//! - [`checkout`]: restoring a snapshot
//! - [`repository`]: the handle tying it together
//! - [`types`], [`error`]: shared types and errors

pub mod bowl;
pub mod checkout;
pub mod codec;
pub mod compression;
pub mod error;
pub mod history;
pub mod object;
pub mod refs;
pub mod repository;
pub mod storage;
pub mod tree;
pub mod types;
pub mod worktree;

mod utils;

pub use bowl::{Bowl, BowlEntry, Change};
pub use codec::{ObjectHash, ObjectKind};
pub use compression::{CompressionEngine, CompressionStrategy};
pub use error::{FlushError, Result};
pub use object::{Commit, EntryKind, Object, Tree, TreeEntry};
pub use repository::{Repository, RepositoryBuilder, CONTROL_DIR};
pub use storage::ObjectStore;
pub use types::*;
