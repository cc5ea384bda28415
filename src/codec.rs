//! Object framing and content hashing
//!
//! Every stored object is framed as a kind tag line, an empty line, then the
//! payload verbatim:
//!
//! ```text
//! <kind>\n\n<payload>
//! ```
//!
//! The empty line is the end-of-header marker. Decoding finds it by position
//! only, so payload bytes are never inspected for header-like lines.
//!
//! An object's identity is the SHA-1 digest of its full framed bytes,
//! hex-encoded for file names and display.
//!
//! ## Examples
//!
//! ```rust
//! use flushvc::codec::{self, ObjectKind};
//!
//! let framed = codec::encode(ObjectKind::Blob, b"A test file\nWith two lines\n");
//! let hash = codec::content_hash(&framed);
//! assert_eq!(hash.to_hex(), "197fa33f64bfce7ac12607ad567ea8573a38a823");
//!
//! let (kind, header_len, payload) = codec::decode(&framed).unwrap();
//! assert_eq!(kind, ObjectKind::Blob);
//! assert_eq!(header_len, 6);
//! assert_eq!(payload, b"A test file\nWith two lines\n");
//! ```

use crate::error::{FlushError, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Length of a digest in bytes
pub const HASH_LEN: usize = 20;

/// Length of a hex-encoded digest
pub const HEX_LEN: usize = HASH_LEN * 2;

/// Kind of a stored object
///
/// The tag strings are part of the on-disk byte format and therefore part of
/// every object's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw file content, tagged `file`
    Blob,
    /// Directory listing, tagged `tree`
    Tree,
    /// Snapshot metadata, tagged `flush`
    Commit,
}

impl ObjectKind {
    /// Tag string written into the frame header
    pub fn tag(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "file",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "flush",
        }
    }

    /// Parse a tag string
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"file" => Some(ObjectKind::Blob),
            b"tree" => Some(ObjectKind::Tree),
            b"flush" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 160-bit content digest identifying an object
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHash([u8; HASH_LEN]);

impl ObjectHash {
    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex form, used as file name and map key
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters, for logs and CLI output
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }

    /// Parse a full 40 character hex digest
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != HEX_LEN {
            return Err(FlushError::InvalidObjectHash(s.to_string()));
        }
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| FlushError::InvalidObjectHash(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.to_hex())
    }
}

impl FromStr for ObjectHash {
    type Err = FlushError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for ObjectHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ObjectHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Frame a payload as `<kind>\n\n<payload>`
pub fn encode(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let tag = kind.tag().as_bytes();
    let mut framed = Vec::with_capacity(tag.len() + 2 + payload.len());
    framed.extend_from_slice(tag);
    framed.push(b'\n');
    framed.push(b'\n');
    framed.extend_from_slice(payload);
    framed
}

/// Split framed bytes into kind, header length and payload
///
/// The header ends immediately after the second line break. Fails with
/// [`FlushError::MalformedObject`] if there are fewer than two line breaks,
/// the tag is unknown, or the second line is not empty.
pub fn decode(framed: &[u8]) -> Result<(ObjectKind, usize, &[u8])> {
    let first = framed
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| FlushError::MalformedObject("missing header line break".to_string()))?;
    let second = framed[first + 1..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|offset| first + 1 + offset)
        .ok_or_else(|| FlushError::MalformedObject("missing header terminator".to_string()))?;

    if second != first + 1 {
        return Err(FlushError::MalformedObject(
            "header terminator line is not empty".to_string(),
        ));
    }

    let tag = &framed[..first];
    let kind = ObjectKind::from_tag(tag).ok_or_else(|| {
        FlushError::MalformedObject(format!(
            "unknown object kind {:?}",
            String::from_utf8_lossy(tag)
        ))
    })?;

    let header_len = second + 1;
    Ok((kind, header_len, &framed[header_len..]))
}

/// SHA-1 of the full framed bytes
pub fn content_hash(framed: &[u8]) -> ObjectHash {
    let mut hasher = Sha1::new();
    hasher.update(framed);
    ObjectHash(hasher.finalize().into())
}
