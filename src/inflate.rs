//! Content-Encoding decoding for response bodies.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Codings this crate knows how to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coding {
    Gzip,
    Deflate,
    Brotli,
}

impl Coding {
    /// Pick the coding declared by a `Content-Encoding` value.
    ///
    /// Substring match, so `x-gzip` and stacked values still resolve.
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.to_ascii_lowercase();
        if value.contains("gzip") {
            Some(Self::Gzip)
        } else if value.contains("deflate") {
            Some(Self::Deflate)
        } else if value.split(',').any(|c| c.trim() == "br") {
            Some(Self::Brotli)
        } else {
            None
        }
    }
}

/// Decode a body per its `Content-Encoding`. Unknown codings pass through.
pub fn decode(body: &[u8], content_encoding: &str) -> Result<Bytes> {
    match Coding::from_header(content_encoding) {
        Some(Coding::Gzip) => decode_gzip(body),
        Some(Coding::Deflate) => decode_deflate(body),
        Some(Coding::Brotli) => decode_brotli(body),
        None => Ok(Bytes::copy_from_slice(body)),
    }
}

pub fn decode_gzip(data: &[u8]) -> Result<Bytes> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("gzip: {}", e)))?;
    Ok(Bytes::from(decoded))
}

/// zlib-wrapped first, raw deflate second.
///
/// Servers disagree on what `deflate` means, so both framings are accepted.
pub fn decode_deflate(data: &[u8]) -> Result<Bytes> {
    let mut decoded = Vec::new();
    if flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut decoded)
        .is_ok()
    {
        return Ok(Bytes::from(decoded));
    }
    tracing::debug!("deflate body is not zlib-wrapped, retrying as raw deflate");
    decoded.clear();
    flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("deflate: {}", e)))?;
    Ok(Bytes::from(decoded))
}

pub fn decode_brotli(data: &[u8]) -> Result<Bytes> {
    let mut decoder = brotli::Decompressor::new(data, 4096);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("brotli: {}", e)))?;
    Ok(Bytes::from(decoded))
}

/// Gzip a whole buffer, used by the persistence format.
pub fn encode_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
