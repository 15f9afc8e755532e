//! Post-quantum key encapsulation (C2): ML-KEM-768 (FIPS 203).
//!
//! Three operations, mirroring the textbook KEM interface: `generate_keypair`,
//! `encapsulate`, `decapsulate`. The one piece of behavior beyond the
//! textbook interface is decapsulation's length reconciliation: historical
//! data on the wire includes a small population of malformed-length
//! ciphertexts (a hex-double-encoding bug among them), and this wrapper
//! repairs the byte string *before* handing it to the underlying primitive,
//! so `pqcrypto_mlkem` itself never sees a malformed length.

use pqcrypto_mlkem::mlkem768;
use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

// `pqcrypto_mlkem::mlkem768::SecretKey` is a foreign type with no exposed
// mutable byte access, so it cannot implement `Zeroize` directly (nor can we
// implement a foreign trait for it here). `SecretKey` below instead holds
// the raw bytes itself and reconstructs the pqcrypto type on each use,
// following the same pattern as tallow-crypto's `kem/mlkem.rs`.

use crate::error::{CryptoError, Result};

/// Byte length of an ML-KEM-768 public key.
pub const PUBLIC_KEY_SIZE: usize = mlkem768::public_key_bytes();
/// Byte length of an ML-KEM-768 secret key.
pub const SECRET_KEY_SIZE: usize = mlkem768::secret_key_bytes();
/// Byte length of an ML-KEM-768 ciphertext (1088 bytes).
pub const CIPHERTEXT_SIZE: usize = mlkem768::ciphertext_bytes();
/// Byte length of the shared secret produced by encapsulation/decapsulation.
pub const SHARED_SECRET_SIZE: usize = mlkem768::shared_secret_bytes();

/// An ML-KEM-768 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(mlkem768::PublicKey);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        mlkem768::PublicKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", crate::codec::hex_encode(self.as_bytes()))
    }
}

/// An ML-KEM-768 secret key. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        // Validate eagerly so a malformed key is rejected at construction
        // rather than on first use.
        mlkem768::SecretKey::from_bytes(bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn as_pqcrypto(&self) -> mlkem768::SecretKey {
        mlkem768::SecretKey::from_bytes(&self.0)
            .expect("validated at construction in SecretKey::from_bytes")
    }
}

/// An ML-KEM-768 keypair.
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

/// Generates a fresh ML-KEM-768 keypair.
pub fn generate_keypair() -> KeyPair {
    let (pk, sk) = mlkem768::keypair();
    let secret = SecretKey(sk.as_bytes().to_vec());
    KeyPair {
        public: PublicKey(pk),
        secret,
    }
}

/// A 32-byte shared secret produced by encapsulation or decapsulation.
/// Zeroed on drop — callers use it immediately to derive or directly use an
/// AEAD key and then let it go out of scope.
#[derive(ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }
}

/// Encapsulates a fresh shared secret to `public_key`, returning the
/// ciphertext to send to the holder of the matching secret key and the
/// shared secret to use locally.
pub fn encapsulate(public_key: &PublicKey) -> (Vec<u8>, SharedSecret) {
    let (shared_secret, ciphertext) = mlkem768::encapsulate(&public_key.0);
    let mut secret_bytes = [0u8; SHARED_SECRET_SIZE];
    secret_bytes.copy_from_slice(shared_secret.as_bytes());
    (ciphertext.as_bytes().to_vec(), SharedSecret(secret_bytes))
}

/// Decapsulates `ciphertext` with `secret_key`, first reconciling the
/// ciphertext's length against [`CIPHERTEXT_SIZE`] per the rules in §4.2:
///
/// - exactly double the expected length ⇒ take the first half (a known
///   hex-double-encoding bug on the wire);
/// - longer, but not exactly double ⇒ truncate to the expected length;
/// - shorter ⇒ right-pad with zeros.
///
/// Reconciliation always proceeds to the underlying primitive; only a
/// genuine decapsulation failure surfaces, and it surfaces as
/// [`CryptoError::KemFailure`], never as a corruption/encoding error.
pub fn decapsulate(ciphertext: &[u8], secret_key: &SecretKey) -> Result<SharedSecret> {
    let reconciled = reconcile_ciphertext_length(ciphertext);
    let ct = mlkem768::Ciphertext::from_bytes(&reconciled)
        .map_err(|e| CryptoError::KemFailure(e.to_string()))?;
    let shared_secret = mlkem768::decapsulate(&ct, &secret_key.as_pqcrypto());
    let mut secret_bytes = [0u8; SHARED_SECRET_SIZE];
    secret_bytes.copy_from_slice(shared_secret.as_bytes());
    Ok(SharedSecret(secret_bytes))
}

/// Repairs a possibly-malformed ciphertext length before it reaches the
/// underlying primitive. See [`decapsulate`] for the exact rules.
fn reconcile_ciphertext_length(ciphertext: &[u8]) -> Vec<u8> {
    let len = ciphertext.len();
    if len == CIPHERTEXT_SIZE * 2 {
        ciphertext[..CIPHERTEXT_SIZE].to_vec()
    } else if len > CIPHERTEXT_SIZE {
        ciphertext[..CIPHERTEXT_SIZE].to_vec()
    } else if len < CIPHERTEXT_SIZE {
        let mut padded = ciphertext.to_vec();
        padded.resize(CIPHERTEXT_SIZE, 0);
        padded
    } else {
        ciphertext.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let kp = generate_keypair();
        let (ct, ss1) = encapsulate(&kp.public);
        let ss2 = decapsulate(&ct, &kp.secret).unwrap();
        assert_eq!(ss1.as_bytes(), ss2.as_bytes());
    }

    #[test]
    fn wrong_secret_key_yields_different_secret() {
        let kp_a = generate_keypair();
        let kp_b = generate_keypair();
        let (ct, ss_a) = encapsulate(&kp_a.public);
        // ML-KEM does not authenticate the secret key used for decapsulation:
        // decapsulating with the wrong key still "succeeds" but yields an
        // unrelated secret. Downstream AEAD use of that secret is what
        // surfaces the mismatch (see share::unwrap_as).
        let ss_b = decapsulate(&ct, &kp_b.secret).unwrap();
        assert_ne!(ss_a.as_bytes(), ss_b.as_bytes());
    }

    #[test]
    fn double_length_ciphertext_reconciles() {
        let kp = generate_keypair();
        let (ct, ss1) = encapsulate(&kp.public);
        let mut doubled = ct.clone();
        doubled.extend_from_slice(&ct);
        assert_eq!(doubled.len(), CIPHERTEXT_SIZE * 2);
        let ss2 = decapsulate(&doubled, &kp.secret).unwrap();
        assert_eq!(ss1.as_bytes(), ss2.as_bytes());
    }

    #[test]
    fn random_length_ciphertext_fails_as_kem_failure() {
        let kp = generate_keypair();
        let garbage = vec![0x42u8; CIPHERTEXT_SIZE];
        let result = decapsulate(&garbage, &kp.secret);
        // A same-length but invalid ciphertext must decapsulate without
        // erroring at the length-reconciliation layer; whether the
        // primitive itself errors depends on its internal validation, but
        // it must never surface as MalformedEncoding.
        if let Err(e) = result {
            assert!(matches!(e, CryptoError::KemFailure(_)));
        }
    }

    #[test]
    fn short_ciphertext_is_zero_padded_not_rejected() {
        let kp = generate_keypair();
        let (ct, _) = encapsulate(&kp.public);
        let short = &ct[..CIPHERTEXT_SIZE - 16];
        // Must not error at the reconciliation layer — it proceeds to the
        // primitive, which will most likely fail to match the original
        // secret but must do so as a KemFailure, not a panic or length error.
        let _ = decapsulate(short, &kp.secret);
    }
}
