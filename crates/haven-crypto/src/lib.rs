//! # Haven Crypto
//!
//! Cryptographic core of the Haven end-to-end encrypted storage client:
//! the hybrid post-quantum scheme, per-chunk AEAD, manifest signing, the
//! session keyring, and share re-wrapping.
//!
//! ## Quantum-safe key encapsulation
//!
//! Content-encryption keys are never transported directly. Instead, each
//! recipient (owner included) gets a [`share::WrappingRecord`]: an
//! ML-KEM-768 ciphertext plus an AEAD-wrapped CEK, produced by
//! [`share::wrap_for`] and recovered by [`share::unwrap_as`]. ML-KEM-768
//! (NIST FIPS 203) is used on its own, not in an X25519 hybrid — the
//! classical/post-quantum pairing in this crate shows up instead in
//! [`manifest`], where every manifest carries one Ed25519 signature and one
//! ML-DSA signature, both of which must validate.
//!
//! ## Layout
//!
//! - [`aead`] — XChaCha20-Poly1305 encryption with deterministic
//!   `prefix || chunk_index` per-chunk nonces.
//! - [`hash`] — SHA-256/SHA-512 (whole-file, algorithm inferred by hex
//!   length) and BLAKE3 (per-chunk content hash).
//! - [`codec`] — hex and bounded-chunk base64, used on every wire-facing
//!   byte field.
//! - [`kem`] — ML-KEM-768 keygen/encapsulate/decapsulate, including the
//!   ciphertext length reconciliation rules.
//! - [`keyring`] — the session's unlocked long-term keys and derived
//!   master key.
//! - [`manifest`] — canonical manifest serialization and dual signing.
//! - [`share`] — CEK wrapping/unwrapping, and the `CekWrapper` port the
//!   upload engine depends on instead of this module directly.
//! - [`compress`] — the mechanical compress/decompress step backing the
//!   worker pool's `Compress`/`Decompress` jobs.
//! - [`workers`] — the bounded CPU worker pool and its typed job enum.
//!
//! ## Example
//!
//! ```rust,ignore
//! use haven_crypto::kem;
//!
//! let recipient = kem::generate_keypair();
//! let (ciphertext, shared_secret) = kem::encapsulate(&recipient.public);
//! let recovered = kem::decapsulate(&ciphertext, &recipient.secret)?;
//! assert_eq!(shared_secret.as_bytes(), recovered.as_bytes());
//! # Ok::<(), haven_crypto::CryptoError>(())
//! ```

pub mod aead;
pub mod codec;
pub mod compress;
pub mod error;
pub mod hash;
pub mod kem;
pub mod keyring;
pub mod manifest;
pub mod share;
pub mod workers;

pub use error::{CryptoError, Result};

/// The content-encryption key size, in bytes (§3 "CEK").
pub const CEK_SIZE: usize = aead::KEY_SIZE;

/// The default chunk size, in bytes (§3/§6: 4 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;
