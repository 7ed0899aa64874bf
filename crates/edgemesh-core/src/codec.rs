//! Compressed text blobs.
//!
//! Code and large configuration values travel inside command payloads as
//! zlib-compressed, base64-encoded strings.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::crypto::{decode_base64, encode_base64};
use crate::error::{CoreError, Result};

/// Compress text and encode it as standard base64.
pub fn compress_text(text: &str) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(text.as_bytes())
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(encode_base64(&compressed))
}

/// Decode and decompress a blob produced by [`compress_text`].
pub fn decompress_text(blob: &str) -> Result<String> {
    let compressed = decode_base64(blob.trim())?;
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| CoreError::DecodingError(e.to_string()))?;
    Ok(text)
}
