//! Error types for the haven-crypto crate.
//!
//! The variants here are the error *kinds* a caller needs to branch on, not
//! a free-form message bag — `NetworkFailure` and `StorageRejected` belong to
//! `haven-client` (they never originate inside this crate), but the rest of
//! the taxonomy is shared so that `haven-client::ClientError` can wrap a
//! `CryptoError` without losing the kind.

use thiserror::Error;

/// Result type alias using [`CryptoError`].
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur in the primitives, KEM, keyring, manifest, share,
/// and worker-pool modules.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The AEAD primitive rejected a ciphertext: wrong key, tampered bytes,
    /// or a tag that doesn't verify.
    #[error("aead failure: {0}")]
    AeadFailure(String),

    /// KEM encapsulation or decapsulation failed, after length
    /// reconciliation has already been applied to the input.
    #[error("kem failure: {0}")]
    KemFailure(String),

    /// A classical or post-quantum signature did not validate.
    #[error("signature failure: {0}")]
    SignatureFailure(String),

    /// A reassembled or verified value did not match its recorded hash.
    #[error("integrity failure: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    /// Hex or base64 input could not be decoded.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// A key (KEM secret key, signature secret key, master key, CEK) is not
    /// available — the keyring is locked or the wrapping record names a
    /// recipient we hold no secret key for.
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    /// Invalid key length or format, caught before the primitive is
    /// invoked (distinct from a primitive-level `KemFailure`/`AeadFailure`).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A byte length invariant (nonce size, chunk size, CEK size) was
    /// violated by the caller.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// An unsupported compression or hash algorithm tag was encountered.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Anything else — must carry enough context (chunk index, stage) for
    /// diagnosis without leaking key material.
    #[error("internal error: {0}")]
    Internal(String),
}
