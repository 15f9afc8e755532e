//! Authenticated encryption (C1).
//!
//! The core's one and only AEAD construction is XChaCha20-Poly1305: a
//! 24-byte nonce and a 16-byte tag, chosen over the narrower 12-byte
//! ChaCha20-Poly1305/AES-256-GCM nonce so that per-chunk nonces can be
//! derived deterministically (`prefix || chunk_index_le`) without ever
//! drawing randomness per chunk.

use chacha20poly1305::aead::{Aead as _, AeadInPlace as _, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

/// Size in bytes of an XChaCha20-Poly1305 key.
pub const KEY_SIZE: usize = 32;
/// Size in bytes of an XChaCha20-Poly1305 nonce.
pub const NONCE_SIZE: usize = 24;
/// Size in bytes of the authentication tag appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// A 24-byte AEAD nonce.
///
/// Per-chunk nonces in this crate are never random: they are
/// `prefix || chunk_index_le`, where `prefix` is the first
/// [`NONCE_SIZE`] `- 4` bytes drawn once per upload and `chunk_index_le` is
/// the chunk's zero-based index as a little-endian `u32`. This guarantees
/// uniqueness across a file without per-chunk randomness and allows
/// stateless, out-of-order decryption.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Builds a nonce from a random prefix and a chunk index.
    ///
    /// `prefix` must be exactly `NONCE_SIZE - 4` bytes; this is enforced by
    /// [`NoncePrefix`], the only supported way to obtain one.
    pub fn for_chunk(prefix: &NoncePrefix, chunk_index: u32) -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        bytes[..NoncePrefix::LEN].copy_from_slice(&prefix.0);
        bytes[NoncePrefix::LEN..].copy_from_slice(&chunk_index.to_le_bytes());
        Self(bytes)
    }

    /// Builds a nonce used for CEK wrapping (C8), which is a one-shot AEAD
    /// call rather than a per-chunk stream, so a fresh random nonce is used
    /// instead of the prefix-plus-index scheme.
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Parses a nonce from an exact-length byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: NONCE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; NONCE_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Returns the little-endian chunk index encoded in the last 4 bytes.
    ///
    /// Only meaningful for nonces produced by [`Nonce::for_chunk`].
    pub fn chunk_index(&self) -> u32 {
        let mut idx = [0u8; 4];
        idx.copy_from_slice(&self.0[NONCE_SIZE - 4..]);
        u32::from_le_bytes(idx)
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", crate::codec::hex_encode(&self.0))
    }
}

/// The random component shared by every nonce within one upload.
///
/// Drawn once per upload/transfer and combined with each chunk's index to
/// produce that chunk's nonce; see [`Nonce::for_chunk`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NoncePrefix([u8; Self::LEN]);

impl NoncePrefix {
    /// `NONCE_SIZE` minus the 4 bytes reserved for the little-endian chunk
    /// index.
    pub const LEN: usize = NONCE_SIZE - 4;

    /// Draws a fresh random prefix.
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; Self::LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

/// A 32-byte symmetric key for XChaCha20-Poly1305.
///
/// Used both as the per-file content-encryption key and as the derived
/// shared-secret key in CEK wrapping (C8). Zeroed on drop in either role.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; KEY_SIZE]);

impl AeadKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; KEY_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AeadKey(<redacted>)")
    }
}

fn cipher(key: &AeadKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}

/// Encrypts `plaintext` under `key`/`nonce` with no associated data.
pub fn encrypt(key: &AeadKey, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
    encrypt_with_aad(key, nonce, plaintext, b"")
}

/// Decrypts `ciphertext` under `key`/`nonce` with no associated data.
pub fn decrypt(key: &AeadKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    decrypt_with_aad(key, nonce, ciphertext, b"")
}

/// Encrypts `plaintext`, binding `aad` into the authentication tag.
pub fn encrypt_with_aad(
    key: &AeadKey,
    nonce: &Nonce,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = cipher(key);
    let xnonce = XNonce::from_slice(nonce.as_bytes());
    let payload = chacha20poly1305::aead::Payload { msg: plaintext, aad };
    cipher
        .encrypt(xnonce, payload)
        .map_err(|_| CryptoError::AeadFailure("encryption failed".into()))
}

/// Decrypts `ciphertext`, verifying `aad` was bound at encryption time.
pub fn decrypt_with_aad(
    key: &AeadKey,
    nonce: &Nonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = cipher(key);
    let xnonce = XNonce::from_slice(nonce.as_bytes());
    let payload = chacha20poly1305::aead::Payload {
        msg: ciphertext,
        aad,
    };
    cipher
        .decrypt(xnonce, payload)
        .map_err(|_| CryptoError::AeadFailure("decryption failed".into()))
}

/// Encrypts `plaintext` in place, appending the tag, avoiding one
/// allocation on the hot per-chunk upload path.
pub fn encrypt_in_place(key: &AeadKey, nonce: &Nonce, buffer: &mut Vec<u8>) -> Result<()> {
    let cipher = cipher(key);
    let xnonce = XNonce::from_slice(nonce.as_bytes());
    cipher
        .encrypt_in_place(xnonce, b"", buffer)
        .map_err(|_| CryptoError::AeadFailure("encryption failed".into()))
}

/// Decrypts `buffer` in place, truncating off the tag.
pub fn decrypt_in_place(key: &AeadKey, nonce: &Nonce, buffer: &mut Vec<u8>) -> Result<()> {
    let cipher = cipher(key);
    let xnonce = XNonce::from_slice(nonce.as_bytes());
    cipher
        .decrypt_in_place(xnonce, b"", buffer)
        .map_err(|_| CryptoError::AeadFailure("decryption failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let nonce = Nonce::for_chunk(&prefix, 0);
        let pt = b"hello, recipient!";
        let ct = encrypt(&key, &nonce, pt).unwrap();
        assert_eq!(ct.len(), pt.len() + TAG_SIZE);
        let back = decrypt(&key, &nonce, &ct).unwrap();
        assert_eq!(back, pt);
    }

    #[test]
    fn wrong_key_fails() {
        let key = AeadKey::generate();
        let other = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let nonce = Nonce::for_chunk(&prefix, 0);
        let ct = encrypt(&key, &nonce, b"data").unwrap();
        assert!(decrypt(&other, &nonce, &ct).is_err());
    }

    #[test]
    fn tamper_detected() {
        let key = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let nonce = Nonce::for_chunk(&prefix, 0);
        let mut ct = encrypt(&key, &nonce, b"tamper me").unwrap();
        ct[0] ^= 0x01;
        assert!(decrypt(&key, &nonce, &ct).is_err());
    }

    #[test]
    fn tamper_tag_detected() {
        let key = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let nonce = Nonce::for_chunk(&prefix, 0);
        let mut ct = encrypt(&key, &nonce, b"tamper the tag").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(decrypt(&key, &nonce, &ct).is_err());
    }

    #[test]
    fn chunk_nonces_differ_only_in_index() {
        let prefix = NoncePrefix::generate();
        let n0 = Nonce::for_chunk(&prefix, 0);
        let n1 = Nonce::for_chunk(&prefix, 1);
        let n2 = Nonce::for_chunk(&prefix, 2);
        assert_ne!(n0.as_bytes(), n1.as_bytes());
        assert_eq!(&n0.as_bytes()[..NoncePrefix::LEN], &n1.as_bytes()[..NoncePrefix::LEN]);
        assert_eq!(n0.chunk_index(), 0);
        assert_eq!(n1.chunk_index(), 1);
        assert_eq!(n2.chunk_index(), 2);
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let key = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let nonce = Nonce::for_chunk(&prefix, 0);
        let ct = encrypt(&key, &nonce, b"").unwrap();
        assert_eq!(ct.len(), TAG_SIZE);
        assert_eq!(decrypt(&key, &nonce, &ct).unwrap(), b"");
    }

    #[test]
    fn aad_binding_required() {
        let key = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let nonce = Nonce::for_chunk(&prefix, 0);
        let ct = encrypt_with_aad(&key, &nonce, b"data", b"context").unwrap();
        assert!(decrypt_with_aad(&key, &nonce, &ct, b"").is_err());
        assert!(decrypt_with_aad(&key, &nonce, &ct, b"wrong").is_err());
        assert!(decrypt_with_aad(&key, &nonce, &ct, b"context").is_ok());
    }
}
