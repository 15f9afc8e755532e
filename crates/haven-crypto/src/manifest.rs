//! Manifest construction and dual signing (C5).
//!
//! The manifest is built as a canonical, deterministic byte serialization —
//! one `key: value` line per field, chunks sorted by index, everything
//! base64/hex exactly as it will appear on the wire — then signed twice:
//! once classically (Ed25519) and once post-quantum (ML-DSA, FIPS 204). The
//! canonical-serialize-then-detached-sign shape, and the line-based
//! `SignatureMetadata` block, are carried over from
//! `qsfs-core::canonical::CanonicalHeader`.
//!
//! Verification requires *both* signatures to validate. If exactly one
//! validates, the manifest is rejected outright — a partial signature is
//! treated as no signature at all, recorded in the algorithm-version field
//! as the dual-signature requirement.

use ed25519_dalek::{Signer as _, Verifier as _};
use pqcrypto_mldsa::mldsa65;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _};

use crate::codec::{base64_encode, hex_encode};
use crate::error::{CryptoError, Result};

/// The algorithm-version string recorded on every manifest produced by this
/// crate. Carries the dual-signature requirement in its own name so a
/// verifier reading an old manifest from a hypothetical single-signature
/// era can tell the two formats apart.
pub const ALGORITHM_VERSION: &str = "haven-transfer-v1-dual-sig";

/// One chunk's entry in the manifest's chunk vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestChunk {
    pub index: u32,
    pub size: u64,
    /// BLAKE3 hex hash of the chunk's plaintext.
    pub content_hash: String,
    /// Base64-encoded 24-byte AEAD nonce.
    pub nonce: String,
    pub compression: CompressionDescriptor,
}

/// Recorded per-chunk compression metadata (mirrors [`crate::aead`]'s "no
/// silent pass-through on unknown tags" discipline: an unrecognized tag on
/// parse is an error, not a guess).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionDescriptor {
    pub algorithm: CompressionAlgorithm,
    pub original_size: u64,
    pub compressed_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    None,
    Zstd,
    Gzip,
    Deflate,
}

impl CompressionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zstd => "zstd",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "zstd" => Ok(Self::Zstd),
            "gzip" => Ok(Self::Gzip),
            "deflate" => Ok(Self::Deflate),
            other => Err(CryptoError::UnsupportedAlgorithm(format!(
                "unrecognized compression tag: {other}"
            ))),
        }
    }
}

/// The unsigned body of a manifest: everything that goes into the canonical
/// serialization the two signatures cover.
#[derive(Debug, Clone)]
pub struct ManifestBody {
    pub file_id: String,
    /// Ciphertext filename, base64, encrypted under the keyring master key
    /// (never the CEK — see `DESIGN.md` on the two separate encryption
    /// contexts).
    pub ciphertext_filename: String,
    pub filename_salt: String,
    pub mimetype: String,
    pub total_size: u64,
    /// Hex whole-file hash; its length implies the algorithm
    /// (`crate::hash::HashAlgorithm::from_hex_len`).
    pub whole_file_hash: String,
    pub chunks: Vec<ManifestChunk>,
    pub created_at_unix: i64,
    pub algorithm_version: String,
}

impl ManifestBody {
    /// Serializes the body to a deterministic byte string: one line per
    /// field, chunks strictly in index order. Two calls on an
    /// equal-by-value body always produce byte-identical output.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"haven-manifest/v1\n");
        push_line(&mut out, "file_id", &self.file_id);
        push_line(&mut out, "filename", &self.ciphertext_filename);
        push_line(&mut out, "filename_salt", &self.filename_salt);
        push_line(&mut out, "mimetype", &self.mimetype);
        push_line(&mut out, "total_size", &self.total_size.to_string());
        push_line(&mut out, "whole_file_hash", &self.whole_file_hash);
        push_line(&mut out, "algorithm_version", &self.algorithm_version);
        push_line(&mut out, "chunk_count", &self.chunks.len().to_string());
        for chunk in &self.chunks {
            push_line(&mut out, "chunk.index", &chunk.index.to_string());
            push_line(&mut out, "chunk.size", &chunk.size.to_string());
            push_line(&mut out, "chunk.hash", &chunk.content_hash);
            push_line(&mut out, "chunk.nonce", &chunk.nonce);
            push_line(&mut out, "chunk.compression", chunk.compression.algorithm.as_str());
            push_line(
                &mut out,
                "chunk.original_size",
                &chunk.compression.original_size.to_string(),
            );
            push_line(
                &mut out,
                "chunk.compressed_size",
                &chunk.compression.compressed_size.to_string(),
            );
        }
        push_line(&mut out, "created_at", &self.created_at_unix.to_string());
        out.extend_from_slice(b"fin\n");
        out
    }

    /// Validates the chunk-ordering invariant: strictly ascending index,
    /// no gaps, starting at zero.
    pub fn validate_chunk_order(&self) -> Result<()> {
        for (expected, chunk) in self.chunks.iter().enumerate() {
            if chunk.index as usize != expected {
                return Err(CryptoError::Internal(format!(
                    "manifest chunk order violated: expected index {expected}, found {}",
                    chunk.index
                )));
            }
        }
        Ok(())
    }
}

fn push_line(out: &mut Vec<u8>, key: &str, value: &str) {
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.push(b'\n');
}

/// One signature block: algorithm tag, signer public key, signature bytes —
/// all base64, following `qsfs-core::canonical::SignatureMetadata`.
#[derive(Debug, Clone)]
pub struct SignatureBlock {
    pub algorithm: &'static str,
    pub public_key_b64: String,
    pub signature_b64: String,
}

/// A manifest: its unsigned body plus both required signature blocks.
#[derive(Debug, Clone)]
pub struct SignedManifest {
    pub body: ManifestBody,
    pub classical: SignatureBlock,
    pub post_quantum: SignatureBlock,
}

/// Signs `body`'s canonical bytes with both algorithms.
pub fn sign(
    body: ManifestBody,
    ed25519_signing_key: &ed25519_dalek::SigningKey,
    mldsa_public_key: &mldsa65::PublicKey,
    mldsa_secret_key: &mldsa65::SecretKey,
) -> Result<SignedManifest> {
    body.validate_chunk_order()?;
    let canonical = body.canonical_bytes();

    let classical_sig = ed25519_signing_key.sign(&canonical);
    let classical = SignatureBlock {
        algorithm: "ed25519",
        public_key_b64: base64_encode(ed25519_signing_key.verifying_key().as_bytes()),
        signature_b64: base64_encode(&classical_sig.to_bytes()),
    };

    let pq_sig = mldsa65::detached_sign(&canonical, mldsa_secret_key);
    let post_quantum = SignatureBlock {
        algorithm: "ml-dsa-65",
        public_key_b64: base64_encode(mldsa_public_key.as_bytes()),
        signature_b64: base64_encode(pq_sig.as_bytes()),
    };

    Ok(SignedManifest {
        body,
        classical,
        post_quantum,
    })
}

/// Verifies a signed manifest. Requires *both* signatures to validate;
/// exactly one valid signature is rejected, not merely a warning (§4.5
/// tie-break rule).
pub fn verify(manifest: &SignedManifest) -> Result<()> {
    let canonical = manifest.body.canonical_bytes();

    let classical_ok = verify_classical(&canonical, &manifest.classical).is_ok();
    let pq_ok = verify_post_quantum(&canonical, &manifest.post_quantum).is_ok();

    match (classical_ok, pq_ok) {
        (true, true) => Ok(()),
        _ => Err(CryptoError::SignatureFailure(
            "manifest requires both a valid classical and a valid post-quantum signature"
                .to_string(),
        )),
    }
}

fn verify_classical(canonical: &[u8], block: &SignatureBlock) -> Result<()> {
    let pk_bytes = crate::codec::base64_decode(&block.public_key_b64)?;
    let pk_arr: [u8; 32] = pk_bytes
        .try_into()
        .map_err(|_| CryptoError::SignatureFailure("bad ed25519 public key length".into()))?;
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&pk_arr)
        .map_err(|e| CryptoError::SignatureFailure(e.to_string()))?;
    let sig_bytes = crate::codec::base64_decode(&block.signature_b64)?;
    let sig_arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| CryptoError::SignatureFailure("bad ed25519 signature length".into()))?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_arr);
    verifying_key
        .verify(canonical, &signature)
        .map_err(|e| CryptoError::SignatureFailure(e.to_string()))
}

fn verify_post_quantum(canonical: &[u8], block: &SignatureBlock) -> Result<()> {
    let pk_bytes = crate::codec::base64_decode(&block.public_key_b64)?;
    let public_key = mldsa65::PublicKey::from_bytes(&pk_bytes)
        .map_err(|e| CryptoError::SignatureFailure(e.to_string()))?;
    let sig_bytes = crate::codec::base64_decode(&block.signature_b64)?;
    let signature = mldsa65::DetachedSignature::from_bytes(&sig_bytes)
        .map_err(|e| CryptoError::SignatureFailure(e.to_string()))?;
    mldsa65::verify_detached_signature(&signature, canonical, &public_key)
        .map_err(|e| CryptoError::SignatureFailure(e.to_string()))
}

/// Returns a hex-encoded preview of the canonical bytes, useful in error
/// messages and logs without ever printing key material.
pub fn canonical_fingerprint(body: &ManifestBody) -> String {
    let digest = blake3::hash(&body.canonical_bytes());
    hex_encode(&digest.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn sample_body() -> ManifestBody {
        ManifestBody {
            file_id: "file-123".into(),
            ciphertext_filename: "base64-ciphertext-name".into(),
            filename_salt: "base64-salt".into(),
            mimetype: "application/octet-stream".into(),
            total_size: 4194304,
            whole_file_hash: "a".repeat(64),
            chunks: vec![ManifestChunk {
                index: 0,
                size: 4194304,
                content_hash: "b".repeat(64),
                nonce: "base64nonce".into(),
                compression: CompressionDescriptor {
                    algorithm: CompressionAlgorithm::None,
                    original_size: 4194304,
                    compressed_size: 4194304,
                },
            }],
            created_at_unix: 1_700_000_000,
            algorithm_version: ALGORITHM_VERSION.to_string(),
        }
    }

    fn sample_keys() -> (ed25519_dalek::SigningKey, mldsa65::PublicKey, mldsa65::SecretKey) {
        let ed = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let (pk, sk) = mldsa65::keypair();
        (ed, pk, sk)
    }

    #[test]
    fn canonical_bytes_are_deterministic() {
        let body = sample_body();
        assert_eq!(body.canonical_bytes(), body.canonical_bytes());
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let (ed, mldsa_pk, mldsa_sk) = sample_keys();
        let manifest = sign(sample_body(), &ed, &mldsa_pk, &mldsa_sk).unwrap();
        verify(&manifest).unwrap();
    }

    #[test]
    fn single_valid_signature_is_rejected() {
        let (ed, mldsa_pk, mldsa_sk) = sample_keys();
        let mut manifest = sign(sample_body(), &ed, &mldsa_pk, &mldsa_sk).unwrap();
        // Corrupt only the post-quantum signature.
        manifest.post_quantum.signature_b64 = base64_encode(b"not a real signature padding!!!!");
        assert!(verify(&manifest).is_err());
    }

    #[test]
    fn both_invalid_is_rejected() {
        let (ed, mldsa_pk, mldsa_sk) = sample_keys();
        let mut manifest = sign(sample_body(), &ed, &mldsa_pk, &mldsa_sk).unwrap();
        manifest.classical.signature_b64 = base64_encode(&[0u8; 64]);
        manifest.post_quantum.signature_b64 = base64_encode(b"garbage");
        assert!(verify(&manifest).is_err());
    }

    #[test]
    fn tampered_body_invalidates_both_signatures() {
        let (ed, mldsa_pk, mldsa_sk) = sample_keys();
        let mut manifest = sign(sample_body(), &ed, &mldsa_pk, &mldsa_sk).unwrap();
        manifest.body.total_size += 1;
        assert!(verify(&manifest).is_err());
    }

    #[test]
    fn chunk_order_violation_rejected_before_signing() {
        let (ed, mldsa_pk, mldsa_sk) = sample_keys();
        let mut body = sample_body();
        body.chunks.push(ManifestChunk {
            index: 2, // should be 1: gap
            size: 10,
            content_hash: "c".repeat(64),
            nonce: "n".into(),
            compression: CompressionDescriptor {
                algorithm: CompressionAlgorithm::None,
                original_size: 10,
                compressed_size: 10,
            },
        });
        assert!(sign(body, &ed, &mldsa_pk, &mldsa_sk).is_err());
    }
}
