//! Cryptographic hashing (C1).
//!
//! Three algorithms are in play: BLAKE3 for per-chunk content hashes (fast,
//! incremental, no length ambiguity), and SHA-256/SHA-512 for the whole-file
//! hash recorded in the manifest. The whole-file algorithm is never named
//! explicitly on the wire — callers infer it from the hex string's length
//! (64 hex chars ⇒ SHA-256, 128 ⇒ SHA-512), a backward-compatibility quirk
//! this crate preserves but does not repeat: once inferred, the algorithm is
//! recorded in [`HashAlgorithm`] rather than re-inferred downstream.

use sha2::{Digest, Sha256, Sha512};

use crate::error::{CryptoError, Result};

/// The hash algorithm used for a whole-file digest, selected once (by hex
/// length on parse, or explicitly on compute) and carried from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Infers the algorithm from a hex-encoded digest's length, per the
    /// wire format's backward-compatibility convention.
    pub fn from_hex_len(hex_len: usize) -> Result<Self> {
        match hex_len {
            64 => Ok(Self::Sha256),
            128 => Ok(Self::Sha512),
            other => Err(CryptoError::UnsupportedAlgorithm(format!(
                "cannot infer hash algorithm from {other}-char hex digest"
            ))),
        }
    }
}

/// A one-shot whole-file hash, tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    pub algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl FileHash {
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let bytes = match algorithm {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        };
        Self { algorithm, bytes }
    }

    /// Parses a hex digest, inferring the algorithm from its length.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let algorithm = HashAlgorithm::from_hex_len(hex_str.len())?;
        let bytes = hex::decode(hex_str)
            .map_err(|e| CryptoError::MalformedEncoding(e.to_string()))?;
        Ok(Self { algorithm, bytes })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An incremental whole-file or per-chunk hasher.
///
/// Chunk content hashes (§3 "per-chunk content hash") always use BLAKE3;
/// whole-file hashes use whichever [`HashAlgorithm`] the manifest specifies.
pub enum IncrementalHasher {
    Sha256(Sha256),
    Sha512(Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl IncrementalHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub fn new_blake3() -> Self {
        Self::Blake3(Box::new(blake3::Hasher::new()))
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Computes the BLAKE3 content hash of a single chunk's plaintext.
///
/// This is the "early integrity detection" hash carried per-chunk in the
/// manifest (§3), distinct from the whole-file hash.
pub fn blake3_chunk_hash(plaintext: &[u8]) -> String {
    blake3::hash(plaintext).to_hex().to_string()
}

/// Verifies a chunk's plaintext against its recorded BLAKE3 hex hash.
pub fn verify_chunk_hash(plaintext: &[u8], expected_hex: &str) -> Result<()> {
    let actual = blake3_chunk_hash(plaintext);
    if actual == expected_hex {
        Ok(())
    } else {
        Err(CryptoError::IntegrityFailure {
            expected: expected_hex.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_length_inferred() {
        let h = FileHash::compute(HashAlgorithm::Sha256, b"hello");
        assert_eq!(h.to_hex().len(), 64);
        let reparsed = FileHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(reparsed.algorithm, HashAlgorithm::Sha256);
        assert_eq!(reparsed, h);
    }

    #[test]
    fn sha512_length_inferred() {
        let h = FileHash::compute(HashAlgorithm::Sha512, b"hello");
        assert_eq!(h.to_hex().len(), 128);
        let reparsed = FileHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(reparsed.algorithm, HashAlgorithm::Sha512);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let one_shot = FileHash::compute(HashAlgorithm::Sha256, data);
        let mut incr = IncrementalHasher::new(HashAlgorithm::Sha256);
        incr.update(&data[..10]);
        incr.update(&data[10..]);
        assert_eq!(incr.finalize_hex(), one_shot.to_hex());
    }

    #[test]
    fn chunk_hash_detects_tamper() {
        let plaintext = b"chunk contents";
        let hash = blake3_chunk_hash(plaintext);
        assert!(verify_chunk_hash(plaintext, &hash).is_ok());
        assert!(verify_chunk_hash(b"different contents", &hash).is_err());
    }

    #[test]
    fn unrecognized_hex_length_rejected() {
        assert!(HashAlgorithm::from_hex_len(10).is_err());
    }
}
