//! Compression Policy
//!
//! Decides, per write, whether a serialized payload is stored compressed.
//! Reads never re-decide: they decompress when the stored flag says so.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::debug;

use crate::store::StoredValue;

/// Payloads shorter than this are never compressed
pub const COMPRESSION_MIN_LENGTH: usize = 1024;

// == Policy ==
/// Whether compression should be attempted for a payload of `len` bytes.
pub fn should_compress(requested: bool, len: usize) -> bool {
    requested && len >= COMPRESSION_MIN_LENGTH
}

/// Whether an attempted compression is kept. Equal size counts as a rejection.
pub fn accept_compressed(original_len: usize, compressed_len: usize) -> bool {
    compressed_len < original_len
}

/// Applies the policy to a serialized payload.
pub fn encode(requested: bool, serialized: Vec<u8>) -> std::io::Result<StoredValue> {
    if !should_compress(requested, serialized.len()) {
        return Ok(StoredValue::plain(serialized));
    }

    let compressed = compress(&serialized)?;
    if !accept_compressed(serialized.len(), compressed.len()) {
        debug!(
            "Discarding compression: {} → {} bytes",
            serialized.len(),
            compressed.len()
        );
        return Ok(StoredValue::plain(serialized));
    }

    debug!(
        "Compressed payload: {} → {} bytes",
        serialized.len(),
        compressed.len()
    );
    Ok(StoredValue {
        bytes: compressed,
        compressed: true,
    })
}

/// Returns the serialized bytes of a stored payload.
pub fn decode(stored: StoredValue) -> std::io::Result<Vec<u8>> {
    if stored.compressed {
        decompress(&stored.bytes)
    } else {
        Ok(stored.bytes)
    }
}

// == Zlib ==
fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
