//! Deflate compression engine for the object store
//!
//! Objects are compressed as zlib streams before they are written and
//! inflated on read. The strategy only picks the compression level; every
//! stored object is a zlib stream regardless of level, so repositories
//! written at one level read back at any other.
//!
//! ## Examples
//!
//! ```rust
//! use flushvc::compression::{CompressionEngine, CompressionStrategy};
//!
//! let mut engine = CompressionEngine::new(CompressionStrategy::Fast);
//! let data = b"file\n\nHello, world! This is some text to compress.";
//! let compressed = engine.compress(data).unwrap();
//! let decompressed = engine.decompress(&compressed).unwrap();
//! assert_eq!(decompressed, data);
//! ```

use crate::error::{FlushError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::time::Instant;
use tracing::trace;

/// Compression level used when writing objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionStrategy {
    /// Level 1, for repositories with many large, frequently changing files
    Fast,
    /// zlib's default level 6
    #[default]
    Default,
    /// Level 9, smallest objects
    Best,
}

impl CompressionStrategy {
    /// Parse a strategy name as stored in the repository config
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "fast" => Ok(Self::Fast),
            "default" => Ok(Self::Default),
            "best" => Ok(Self::Best),
            other => Err(FlushError::InvalidConfiguration(format!(
                "unknown compression strategy '{}'",
                other
            ))),
        }
    }

    /// Name as stored in the repository config
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Default => "default",
            Self::Best => "best",
        }
    }

    fn level(&self) -> Compression {
        match self {
            Self::Fast => Compression::fast(),
            Self::Default => Compression::default(),
            Self::Best => Compression::best(),
        }
    }
}

/// Running totals for one engine
#[derive(Debug, Default, Clone)]
pub struct CompressionStats {
    /// Number of objects compressed
    pub objects_compressed: usize,
    /// Number of objects decompressed
    pub objects_decompressed: usize,
    /// Uncompressed bytes fed to the compressor
    pub bytes_in: u64,
    /// Compressed bytes produced
    pub bytes_out: u64,
    /// Total compression time in microseconds
    pub compression_time_us: u64,
}

impl CompressionStats {
    /// Compressed size as a fraction of input size
    ///
    /// Returns 1.0 when nothing has been compressed yet.
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            1.0
        } else {
            self.bytes_out as f64 / self.bytes_in as f64
        }
    }
}

/// zlib compressor with per-engine statistics
#[derive(Debug)]
pub struct CompressionEngine {
    strategy: CompressionStrategy,
    stats: CompressionStats,
}

impl CompressionEngine {
    /// Create an engine with the given strategy
    pub fn new(strategy: CompressionStrategy) -> Self {
        Self {
            strategy,
            stats: CompressionStats::default(),
        }
    }

    /// Strategy in use
    pub fn strategy(&self) -> CompressionStrategy {
        self.strategy
    }

    /// Statistics accumulated so far
    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    /// Compress bytes into a zlib stream
    pub fn compress(&mut self, content: &[u8]) -> Result<Vec<u8>> {
        let start = Instant::now();
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(content.len() / 2 + 16), self.strategy.level());
        encoder.write_all(content)?;
        let compressed = encoder.finish()?;

        self.stats.objects_compressed += 1;
        self.stats.bytes_in += content.len() as u64;
        self.stats.bytes_out += compressed.len() as u64;
        self.stats.compression_time_us += start.elapsed().as_micros() as u64;

        trace!(
            "Compressed {} -> {} bytes ({})",
            content.len(),
            compressed.len(),
            self.strategy.name()
        );
        Ok(compressed)
    }

    /// Inflate a zlib stream
    ///
    /// Returns the raw inflate error; the store wraps it into a
    /// corrupt-object error carrying the hash.
    pub fn decompress(&mut self, content: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(content);
        let mut out = Vec::with_capacity(content.len() * 2);
        decoder.read_to_end(&mut out)?;
        self.stats.objects_decompressed += 1;
        Ok(out)
    }
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::new(CompressionStrategy::default())
    }
}
