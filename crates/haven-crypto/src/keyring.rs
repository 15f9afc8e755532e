//! Session keyring (C3).
//!
//! Holds the active session's unlocked long-term keypairs and a derived
//! master key used only for filename/foldername encryption (never file
//! content — see the "two encryption contexts" note in `DESIGN.md`).
//!
//! The source treats this as a module-level singleton with lazy init; here
//! it is an explicit, passed-in capability with an `unlock`/`clear`
//! lifecycle (§9 "shared key-manager singleton → explicit capability").
//! Unlock/clear are the only write transitions and take a writer lock;
//! `unwrap_cek`/`get_master_key` take a reader lock, so concurrent
//! transfers never block each other on key lookups.

use std::sync::Arc;

use hkdf::Hkdf;
use sha2::Sha256;
use tokio::sync::RwLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::{self, AeadKey, Nonce};
use crate::error::{CryptoError, Result};
use crate::kem;
use crate::share::WrappingRecord;

const MASTER_KEY_HKDF_INFO: &[u8] = b"haven-keyring-master-key-v1";
const MASTER_KEY_SIZE: usize = 32;

/// The key material handed to the keyring on unlock. Already decrypted by
/// whatever external key manager the caller uses — this crate never
/// performs password-based unwrapping itself (see `spec` Non-goals).
pub struct UnlockedIdentity {
    pub kem_public: kem::PublicKey,
    pub kem_secret: kem::SecretKey,
    pub ed25519_signing_key: ed25519_dalek::SigningKey,
    pub mldsa_public: pqcrypto_mldsa::mldsa65::PublicKey,
    pub mldsa_secret: pqcrypto_mldsa::mldsa65::SecretKey,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterKey([u8; MASTER_KEY_SIZE]);

struct Unlocked {
    identity: UnlockedIdentity,
    master_key: MasterKey,
}

/// Process-wide session keyring, shared via `Arc` and passed explicitly
/// into the upload/download engines as a capability reference.
pub struct Keyring {
    state: RwLock<Option<Unlocked>>,
}

impl Keyring {
    /// A locked keyring with no key material yet.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(None),
        })
    }

    /// Unlocks the keyring with already-decrypted key material, deriving
    /// and caching the master key. This is the only write transition other
    /// than [`Keyring::clear`].
    pub async fn unlock(&self, identity: UnlockedIdentity) -> Result<()> {
        let master_key = derive_master_key(&identity.kem_secret)?;
        let mut guard = self.state.write().await;
        *guard = Some(Unlocked {
            identity,
            master_key,
        });
        Ok(())
    }

    /// Clears all secret material. Idempotent.
    pub async fn clear(&self) {
        let mut guard = self.state.write().await;
        *guard = None;
    }

    /// Whether the keyring currently holds unlocked key material.
    pub async fn has_keys(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Returns the 32-byte master key used for filename/foldername
    /// encryption. Never used for file content (`AeadKey` for the CEK is a
    /// distinct type and a distinct value).
    pub async fn get_master_key(&self) -> Result<[u8; MASTER_KEY_SIZE]> {
        let guard = self.state.read().await;
        let unlocked = guard
            .as_ref()
            .ok_or_else(|| CryptoError::KeyUnavailable("keyring is locked".into()))?;
        Ok(unlocked.master_key.0)
    }

    /// Unwraps a CEK wrapping record addressed to this keyring's KEM
    /// secret key: decapsulate (with C2's length reconciliation), then
    /// AEAD-decrypt the wrapped CEK with the resulting shared secret.
    pub async fn unwrap_cek(&self, record: &WrappingRecord) -> Result<AeadKey> {
        let guard = self.state.read().await;
        let unlocked = guard
            .as_ref()
            .ok_or_else(|| CryptoError::KeyUnavailable("keyring is locked".into()))?;
        crate::share::unwrap_as(record, &unlocked.identity.kem_secret)
    }

    /// Returns the signing material needed to dual-sign a manifest.
    /// Requires the keyring to be unlocked.
    pub async fn signing_keys(
        &self,
    ) -> Result<(
        ed25519_dalek::SigningKey,
        pqcrypto_mldsa::mldsa65::PublicKey,
        pqcrypto_mldsa::mldsa65::SecretKey,
    )> {
        let guard = self.state.read().await;
        let unlocked = guard
            .as_ref()
            .ok_or_else(|| CryptoError::KeyUnavailable("keyring is locked".into()))?;
        Ok((
            unlocked.identity.ed25519_signing_key.clone(),
            unlocked.identity.mldsa_public.clone(),
            unlocked.identity.mldsa_secret.clone(),
        ))
    }

    /// Returns this keyring's own KEM public key, used to author the
    /// owner's wrapping record on upload (C8 self-wrap).
    pub async fn own_kem_public_key(&self) -> Result<kem::PublicKey> {
        let guard = self.state.read().await;
        let unlocked = guard
            .as_ref()
            .ok_or_else(|| CryptoError::KeyUnavailable("keyring is locked".into()))?;
        Ok(unlocked.identity.kem_public.clone())
    }
}

fn derive_master_key(kem_secret: &kem::SecretKey) -> Result<MasterKey> {
    let hk = Hkdf::<Sha256>::new(None, kem_secret.as_bytes());
    let mut out = [0u8; MASTER_KEY_SIZE];
    hk.expand(MASTER_KEY_HKDF_INFO, &mut out)
        .map_err(|_| CryptoError::Internal("master key derivation failed".into()))?;
    Ok(MasterKey(out))
}

/// Encrypts `plaintext` (a filename or foldername) under the keyring's
/// master key. Distinct AEAD call from any CEK-based content encryption —
/// see the module doc comment.
pub async fn encrypt_name(keyring: &Keyring, plaintext: &[u8]) -> Result<(Vec<u8>, Nonce)> {
    let master = keyring.get_master_key().await?;
    let key = AeadKey::from_bytes(&master)?;
    let nonce = Nonce::random();
    let ciphertext = aead::encrypt(&key, &nonce, plaintext)?;
    Ok((ciphertext, nonce))
}

/// Decrypts a filename/foldername previously produced by [`encrypt_name`].
pub async fn decrypt_name(keyring: &Keyring, ciphertext: &[u8], nonce: &Nonce) -> Result<Vec<u8>> {
    let master = keyring.get_master_key().await?;
    let key = AeadKey::from_bytes(&master)?;
    aead::decrypt(&key, nonce, ciphertext)
}
