//! Per-chunk compression (part of C4's byte-level work, invoked by the
//! worker pool's `Compress`/`Decompress` jobs).
//!
//! The chunker itself — deciding *whether* a chunk should be compressed —
//! lives in `haven-client::chunk`, since that decision depends on
//! content-type policy the client layer owns. This module only implements
//! the mechanical compress/decompress step for each supported algorithm, so
//! that C9's worker pool (which lives in this crate) can run it without a
//! dependency from `haven-crypto` back onto `haven-client`.

use std::io::{Read, Write};

use crate::error::{CryptoError, Result};
use crate::manifest::CompressionAlgorithm;

/// Compresses `plaintext` with `algorithm`. `None` returns the input
/// unchanged (a real copy, so callers can treat the return value uniformly).
pub fn compress(algorithm: CompressionAlgorithm, plaintext: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(plaintext.to_vec()),
        CompressionAlgorithm::Zstd => zstd::stream::encode_all(plaintext, 0)
            .map_err(|e| CryptoError::Internal(format!("zstd compression failed: {e}"))),
        CompressionAlgorithm::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(plaintext)
                .map_err(|e| CryptoError::Internal(format!("gzip compression failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| CryptoError::Internal(format!("gzip compression failed: {e}")))
        }
        CompressionAlgorithm::Deflate => {
            let mut encoder =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(plaintext)
                .map_err(|e| CryptoError::Internal(format!("deflate compression failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| CryptoError::Internal(format!("deflate compression failed: {e}")))
        }
    }
}

/// Decompresses `compressed`, produced by [`compress`] with the same
/// `algorithm`. `expected_size` pre-sizes the output buffer; it is a hint,
/// not a limit enforced here (the download engine verifies the resulting
/// plaintext against its recorded hash separately).
pub fn decompress(
    algorithm: CompressionAlgorithm,
    compressed: &[u8],
    expected_size: usize,
) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(compressed.to_vec()),
        CompressionAlgorithm::Zstd => zstd::stream::decode_all(compressed)
            .map_err(|e| CryptoError::Internal(format!("zstd decompression failed: {e}"))),
        CompressionAlgorithm::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(compressed);
            let mut out = Vec::with_capacity(expected_size);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CryptoError::Internal(format!("gzip decompression failed: {e}")))?;
            Ok(out)
        }
        CompressionAlgorithm::Deflate => {
            let mut decoder = flate2::read::DeflateDecoder::new(compressed);
            let mut out = Vec::with_capacity(expected_size);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CryptoError::Internal(format!("deflate decompression failed: {e}")))?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(algorithm: CompressionAlgorithm) {
        let data = b"the quick brown fox jumps over the lazy dog, repeated. ".repeat(50);
        let compressed = compress(algorithm, &data).unwrap();
        let decompressed = decompress(algorithm, &compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn none_is_identity() {
        roundtrip(CompressionAlgorithm::None);
    }

    #[test]
    fn zstd_roundtrips() {
        roundtrip(CompressionAlgorithm::Zstd);
    }

    #[test]
    fn gzip_roundtrips() {
        roundtrip(CompressionAlgorithm::Gzip);
    }

    #[test]
    fn deflate_roundtrips() {
        roundtrip(CompressionAlgorithm::Deflate);
    }

    #[test]
    fn compressible_data_actually_shrinks() {
        let data = vec![0x41u8; 64 * 1024];
        let compressed = compress(CompressionAlgorithm::Zstd, &data).unwrap();
        assert!(compressed.len() < data.len() / 4);
    }
}
