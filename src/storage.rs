//! Content-addressable object store
//!
//! Objects are framed by [`codec`](crate::codec), named by the SHA-1 of the
//! framed bytes, compressed with zlib and written once:
//!
//! ```text
//! <control>/
//! └── objects/
//!     ├── 197fa33f64bfce7ac12607ad567ea8573a38a823
//!     └── ...
//! ```
//!
//! Writes are idempotent. Putting content that is already stored returns
//! the existing hash without touching the file, and the file itself is
//! written through a temporary file and rename, so two processes storing the
//! same object at once cannot leave a torn file behind.
//!
//! ## Example Usage
//!
//! ```rust
//! use flushvc::codec::ObjectKind;
//! use flushvc::compression::CompressionEngine;
//! use flushvc::storage::ObjectStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let store = ObjectStore::init(dir.path().join("objects"), CompressionEngine::default())?;
//!
//! let hash = store.put(ObjectKind::Blob, b"A test file\nWith two lines\n")?;
//! assert_eq!(hash.to_hex(), "197fa33f64bfce7ac12607ad567ea8573a38a823");
//!
//! let object = store.get(&hash)?;
//! assert_eq!(object.kind, ObjectKind::Blob);
//! assert_eq!(object.payload(), b"A test file\nWith two lines\n");
//! # Ok(())
//! # }
//! ```

use crate::codec::{self, ObjectHash, ObjectKind, HEX_LEN};
use crate::compression::{CompressionEngine, CompressionStats};
use crate::error::{FlushError, Result};
use crate::object::Object;
use crate::utils;
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Minimum length accepted by [`ObjectStore::resolve_prefix`]
pub const MIN_PREFIX_LEN: usize = 4;

/// Write-once object storage under a single directory
#[derive(Debug)]
pub struct ObjectStore {
    /// Directory holding one file per object
    root: PathBuf,
    /// Shared compressor
    compression: Mutex<CompressionEngine>,
}

impl ObjectStore {
    /// Create the objects directory and return a store over it
    pub fn init(root: PathBuf, compression: CompressionEngine) -> Result<Self> {
        fs::create_dir_all(&root)?;
        debug!("Initialized object store at {:?}", root);
        Ok(Self {
            root,
            compression: Mutex::new(compression),
        })
    }

    /// Open an existing objects directory
    ///
    /// # Errors
    ///
    /// - [`FlushError::RepositoryNotInitialized`] if the directory is missing
    pub fn open(root: PathBuf, compression: CompressionEngine) -> Result<Self> {
        if !root.is_dir() {
            return Err(FlushError::RepositoryNotInitialized(root));
        }
        Ok(Self {
            root,
            compression: Mutex::new(compression),
        })
    }

    /// Directory objects are stored in
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a payload, returning its hash
    ///
    /// The payload is framed with its kind, hashed, and compressed. If an
    /// object with the same hash is already stored the write is skipped.
    pub fn put(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectHash> {
        let framed = codec::encode(kind, payload);
        let hash = codec::content_hash(&framed);
        let object_path = self.object_path(&hash);

        if object_path.exists() {
            trace!("Object {} already stored", hash.short());
            return Ok(hash);
        }

        let compressed = self.compression.lock().compress(&framed)?;
        utils::atomic_write(&object_path, &compressed)?;

        trace!(
            "Stored {} {} ({} -> {} bytes)",
            kind,
            hash.short(),
            framed.len(),
            compressed.len()
        );
        Ok(hash)
    }

    /// Load an object by hash
    ///
    /// # Errors
    ///
    /// - [`FlushError::ObjectNotFound`] if nothing is stored under `hash`
    /// - [`FlushError::CorruptObject`] if the stored bytes do not inflate or
    ///   do not carry a valid frame header
    pub fn get(&self, hash: &ObjectHash) -> Result<Object> {
        let object_path = self.object_path(hash);
        let compressed = match fs::read(&object_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FlushError::ObjectNotFound(hash.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = self
            .compression
            .lock()
            .decompress(&compressed)
            .map_err(|e| FlushError::corrupt(hash.to_hex(), format!("decompression failed: {}", e)))?;

        let (kind, header_len, _) =
            codec::decode(&bytes).map_err(|e| FlushError::corrupt(hash.to_hex(), e.to_string()))?;

        trace!("Loaded {} {} ({} bytes)", kind, hash.short(), bytes.len());
        Ok(Object {
            hash: *hash,
            kind,
            bytes,
            header_len,
        })
    }

    /// Check whether an object is stored
    pub fn exists(&self, hash: &ObjectHash) -> bool {
        self.object_path(hash).is_file()
    }

    /// Re-hash a stored object and compare against its name
    ///
    /// # Errors
    ///
    /// - [`FlushError::CorruptObject`] if the content hashes to something else
    pub fn verify(&self, hash: &ObjectHash) -> Result<Object> {
        let object = self.get(hash)?;
        let actual = codec::content_hash(&object.bytes);
        if actual != *hash {
            return Err(FlushError::corrupt(
                hash.to_hex(),
                format!("content hashes to {}", actual),
            ));
        }
        Ok(object)
    }

    /// List every stored object hash, sorted
    ///
    /// File names that are not 40 hex characters (for example a leftover
    /// temporary file) are skipped.
    pub fn list_objects(&self) -> Result<Vec<ObjectHash>> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.len() != HEX_LEN {
                continue;
            }
            if let Ok(hash) = ObjectHash::from_hex(name) {
                hashes.push(hash);
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// Resolve a full hash or unique hex prefix to a stored object
    ///
    /// # Errors
    ///
    /// - [`FlushError::InvalidObjectHash`] if the prefix is too short or not hex
    /// - [`FlushError::ObjectNotFound`] if nothing matches
    /// - [`FlushError::AmbiguousObject`] if more than one object matches
    pub fn resolve_prefix(&self, prefix: &str) -> Result<ObjectHash> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.len() == HEX_LEN {
            let hash = ObjectHash::from_hex(&prefix)?;
            if !self.exists(&hash) {
                return Err(FlushError::ObjectNotFound(prefix));
            }
            return Ok(hash);
        }

        if prefix.len() < MIN_PREFIX_LEN
            || prefix.len() > HEX_LEN
            || !prefix.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(FlushError::InvalidObjectHash(prefix));
        }

        let matches: Vec<ObjectHash> = self
            .list_objects()?
            .into_iter()
            .filter(|h| h.to_hex().starts_with(&prefix))
            .collect();

        match matches.as_slice() {
            [] => Err(FlushError::ObjectNotFound(prefix)),
            [single] => Ok(*single),
            _ => Err(FlushError::AmbiguousObject {
                prefix,
                count: matches.len(),
            }),
        }
    }

    /// Compression statistics for this handle
    pub fn compression_stats(&self) -> CompressionStats {
        self.compression.lock().stats().clone()
    }

    fn object_path(&self, hash: &ObjectHash) -> PathBuf {
        self.root.join(hash.to_hex())
    }
}
