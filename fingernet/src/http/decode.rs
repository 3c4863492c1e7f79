//! Content-Encoding decoding.
//!
//! Bodies are decoded in full so the client observes plaintext; the relay
//! strips the header and rewrites `Content-Length`. Unknown encodings pass
//! through untouched.

use std::io::Read;

use bytes::Bytes;

use crate::base::{ProxyError, Result};

/// Decode `data` according to `encoding`.
///
/// Returns `Ok(None)` for encodings the proxy does not understand (the body
/// then passes through unchanged).
pub fn decode_body(encoding: &str, data: &[u8]) -> Result<Option<Bytes>> {
    match encoding.to_ascii_lowercase().as_str() {
        "gzip" | "x-gzip" => decode_gzip(data).map(Some),
        "deflate" => decode_deflate(data).map(Some),
        "br" => decode_brotli(data).map(Some),
        _ => Ok(None),
    }
}

fn decode_gzip(data: &[u8]) -> Result<Bytes> {
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| ProxyError::network("gzip decode failed").with_source(e))?;
    Ok(Bytes::from(decoded))
}

/// Raw DEFLATE first; some origins send zlib-wrapped streams under the same
/// label, so fall back to that.
fn decode_deflate(data: &[u8]) -> Result<Bytes> {
    let mut decoded = Vec::new();
    if flate2::read::DeflateDecoder::new(data).read_to_end(&mut decoded).is_ok() {
        return Ok(Bytes::from(decoded));
    }
    decoded.clear();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| ProxyError::network("deflate decode failed").with_source(e))?;
    Ok(Bytes::from(decoded))
}

fn decode_brotli(data: &[u8]) -> Result<Bytes> {
    let mut decoded = Vec::new();
    brotli::Decompressor::new(data, 4096)
        .read_to_end(&mut decoded)
        .map_err(|e| ProxyError::network("brotli decode failed").with_source(e))?;
    Ok(Bytes::from(decoded))
}
