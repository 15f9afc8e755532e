//! Chunker & compressor (C4).
//!
//! Splits a plaintext byte source into fixed-size chunks and decides, per
//! chunk, whether to compress it before encryption. The chunk-boundary
//! arithmetic is pure and total-size-driven (§8 property 2); the actual
//! byte-level compress/decompress step lives in
//! `haven_crypto::compress` so the worker pool (C9, in `haven-crypto`) can
//! run it without a dependency back onto this crate.

use haven_crypto::manifest::CompressionAlgorithm;

use crate::config::CompressionPolicy;

/// MIME type prefixes/exact matches that are already compressed, so
/// attempting to compress them again would waste CPU for no size benefit
/// (§4.4 "skip for already-compressed MIME types").
const ALREADY_COMPRESSED_MIME_PREFIXES: &[&str] = &[
    "image/", "video/", "audio/",
];

const ALREADY_COMPRESSED_MIME_EXACT: &[&str] = &[
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "application/x-7z-compressed",
    "application/x-rar-compressed",
    "application/x-zstd",
    "application/pdf",
];

/// Below this many bytes, compression overhead isn't worth it even under
/// `CompressionPolicy::Auto`.
const MIN_COMPRESSIBLE_CHUNK_SIZE: usize = 256;

/// Computes the number of chunks for a file of `total_size` bytes at
/// `chunk_size` bytes per chunk: `max(1, ceil(total_size / chunk_size))`.
/// A zero-byte file still yields exactly one (empty) chunk (§4.6 edge case,
/// §8 property 2).
pub fn chunk_count(total_size: u64, chunk_size: u64) -> u32 {
    if total_size == 0 {
        return 1;
    }
    let count = total_size.div_ceil(chunk_size);
    count as u32
}

/// The half-open byte range `[start, end)` of chunk `index` within a file
/// of `total_size` bytes at `chunk_size` bytes per chunk.
pub fn chunk_range(total_size: u64, chunk_size: u64, index: u32) -> (u64, u64) {
    if total_size == 0 {
        return (0, 0);
    }
    let start = index as u64 * chunk_size;
    let end = (start + chunk_size).min(total_size);
    (start, end)
}

/// All chunk ranges for a file, in index order.
pub fn all_chunk_ranges(total_size: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let count = chunk_count(total_size, chunk_size);
    (0..count)
        .map(|i| chunk_range(total_size, chunk_size, i))
        .collect()
}

impl CompressionPolicy {
    /// Decides whether a chunk of `plaintext_len` bytes with content type
    /// `mimetype` should be compressed under this policy.
    pub fn should_compress(&self, mimetype: &str, plaintext_len: usize) -> bool {
        match self {
            Self::Never => false,
            Self::Always => plaintext_len > 0,
            Self::Auto => {
                plaintext_len >= MIN_COMPRESSIBLE_CHUNK_SIZE && !is_already_compressed(mimetype)
            }
        }
    }
}

fn is_already_compressed(mimetype: &str) -> bool {
    let lower = mimetype.to_ascii_lowercase();
    ALREADY_COMPRESSED_MIME_EXACT.contains(&lower.as_str())
        || ALREADY_COMPRESSED_MIME_PREFIXES
            .iter()
            .any(|prefix| lower.starts_with(prefix))
}

/// Picks the compression algorithm to use for a chunk, or
/// [`CompressionAlgorithm::None`] if the policy says not to compress.
///
/// `zstd` is the default choice when compression is applied; `gzip` and
/// `deflate` remain supported on the decode side for interoperability with
/// data written by other algorithm choices, but this crate does not pick
/// them itself.
pub fn choose_algorithm(
    policy: CompressionPolicy,
    mimetype: &str,
    plaintext_len: usize,
) -> CompressionAlgorithm {
    if policy.should_compress(mimetype, plaintext_len) {
        CompressionAlgorithm::Zstd
    } else {
        CompressionAlgorithm::None
    }
}
