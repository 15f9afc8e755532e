//! Client error types — realizes the error kinds of §7 as enum variants.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Errors surfaced by the wire layer and the upload/download engines.
///
/// Maps 1:1 onto the spec's named error kinds; `Paused` is deliberately
/// absent here because it is transient and never surfaced to a caller
/// (§7: "Paused (transient, never surfaced)").
#[derive(Error, Debug)]
pub enum TransferError {
    /// A transport-level failure, retried within the retry budget before
    /// surfacing.
    #[error("network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    /// The object store or API returned a non-retryable error (a 4xx other
    /// than 408/429, or a JSON error body).
    #[error("storage rejected request: {status} {message}")]
    StorageRejected { status: u16, message: String },

    /// A fetched/received length did not reconcile against the manifest's
    /// recorded size, even after the truncation sweep (§4.7).
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Hex/base64/JSON decoding of a wire field failed.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// Wraps a cryptographic failure from `haven-crypto`, preserving its
    /// kind (AEAD/KEM/signature/integrity/key-unavailable).
    #[error("crypto error: {0}")]
    Crypto(#[from] haven_crypto::CryptoError),

    /// A per-chunk AEAD or integrity failure during download, attributed to
    /// the chunk that failed so callers can report which part of the file
    /// was unrecoverable (§7, §8 property 7 / E2E-5).
    #[error("chunk {index} failed: {source}")]
    ChunkFailure {
        index: u32,
        source: haven_crypto::CryptoError,
    },

    /// The transfer was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,

    /// An unsupported compression or hash algorithm tag was named on the
    /// wire.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A configuration value was out of range or otherwise invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error reading from the caller's byte source.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else; must carry enough context (chunk index, stage) for
    /// diagnosis without leaking key material.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Whether this error kind is worth retrying within the engine's retry
    /// budget (§4.6 "a 4xx other than 408/429 is fatal").
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkFailure(_) => true,
            Self::StorageRejected { status, .. } => *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Builds a `StorageRejected` from an HTTP response status and body,
    /// classifying retryable statuses the same way [`is_transient`] does.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self::StorageRejected {
            status,
            message: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(TransferError::from_status(408, "timeout").is_transient());
        assert!(TransferError::from_status(429, "rate limited").is_transient());
        assert!(!TransferError::from_status(400, "bad request").is_transient());
        assert!(!TransferError::from_status(403, "forbidden").is_transient());
    }
}
