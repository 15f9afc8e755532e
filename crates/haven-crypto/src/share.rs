//! CEK wrapping for sharing (C8).
//!
//! `wrap_for` encapsulates a fresh shared secret to a recipient's ML-KEM
//! public key and uses it to AEAD-wrap the CEK; `unwrap_as` reverses this
//! with the recipient's secret key. The same two functions back three call
//! sites: the owner's own wrapping record on upload, one record per
//! recipient when a share is created, and the recipient's `unwrap_as` call
//! on share acceptance.
//!
//! Per the "cyclic-like coupling between upload and share" design note
//! (§9), the upload engine never calls `wrap_for` directly — it depends on
//! the [`CekWrapper`] port, which this module and any self-wrap path both
//! implement, so `haven-client::upload` has no direct dependency on share
//! semantics.

use async_trait::async_trait;

use crate::aead::{self, AeadKey, Nonce};
use crate::error::Result;
use crate::kem;

/// Per-recipient record letting the holder of `recipient_kem_public`'s
/// matching secret key recover a CEK. The shared secret from encapsulation
/// is used once, as the AEAD key, and is never stored.
#[derive(Debug, Clone)]
pub struct WrappingRecord {
    /// Identifies which recipient public key this record targets (an
    /// opaque server-assigned id, not the key bytes themselves).
    pub recipient_key_id: String,
    /// The ML-KEM ciphertext produced by encapsulation (1088 bytes).
    pub kem_ciphertext: Vec<u8>,
    /// The CEK, AEAD-wrapped under the encapsulated shared secret.
    pub wrapped_cek: Vec<u8>,
    /// The 24-byte nonce used for the AEAD wrap.
    pub nonce: Nonce,
}

/// Encapsulates to `recipient_public` and AEAD-wraps `cek` under the
/// resulting shared secret with a fresh nonce.
pub fn wrap_for(
    cek: &AeadKey,
    recipient_key_id: &str,
    recipient_public: &kem::PublicKey,
) -> Result<WrappingRecord> {
    let (kem_ciphertext, shared_secret) = kem::encapsulate(recipient_public);
    let wrap_key = AeadKey::from_bytes(shared_secret.as_bytes())?;
    let nonce = Nonce::random();
    let wrapped_cek = aead::encrypt(&wrap_key, &nonce, cek.as_bytes())?;
    Ok(WrappingRecord {
        recipient_key_id: recipient_key_id.to_string(),
        kem_ciphertext,
        wrapped_cek,
        nonce,
    })
}

/// Decapsulates `record.kem_ciphertext` with `my_secret` (applying C2's
/// length reconciliation) and AEAD-decrypts the wrapped CEK with the
/// resulting shared secret.
pub fn unwrap_as(record: &WrappingRecord, my_secret: &kem::SecretKey) -> Result<AeadKey> {
    let shared_secret = kem::decapsulate(&record.kem_ciphertext, my_secret)?;
    let wrap_key = AeadKey::from_bytes(shared_secret.as_bytes())?;
    let cek_bytes = aead::decrypt(&wrap_key, &record.nonce, &record.wrapped_cek)?;
    AeadKey::from_bytes(&cek_bytes)
}

/// The port the upload engine depends on instead of calling `wrap_for`
/// directly, so share semantics stay out of `haven-client::upload`.
#[async_trait]
pub trait CekWrapper: Send + Sync {
    async fn wrap(&self, cek: &AeadKey, recipient_key_id: &str) -> Result<WrappingRecord>;
}

/// The trivial implementation: an owner wrapping their own CEK for
/// themselves, given their own KEM public key directly rather than looking
/// one up by recipient id.
pub struct SelfWrapper {
    pub owner_key_id: String,
    pub owner_public: kem::PublicKey,
}

#[async_trait]
impl CekWrapper for SelfWrapper {
    async fn wrap(&self, cek: &AeadKey, _recipient_key_id: &str) -> Result<WrappingRecord> {
        wrap_for(cek, &self.owner_key_id, &self.owner_public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_roundtrip() {
        let kp = kem::generate_keypair();
        let cek = AeadKey::generate();
        let record = wrap_for(&cek, "recipient-b", &kp.public).unwrap();
        let recovered = unwrap_as(&record, &kp.secret).unwrap();
        assert_eq!(cek.as_bytes(), recovered.as_bytes());
    }

    #[test]
    fn wrong_recipient_secret_key_fails() {
        let kp_a = kem::generate_keypair();
        let kp_b = kem::generate_keypair();
        let cek = AeadKey::generate();
        let record = wrap_for(&cek, "recipient-a", &kp_a.public).unwrap();
        assert!(unwrap_as(&record, &kp_b.secret).is_err());
    }

    #[tokio::test]
    async fn self_wrapper_port_roundtrips() {
        let kp = kem::generate_keypair();
        let cek = AeadKey::generate();
        let wrapper = SelfWrapper {
            owner_key_id: "owner".into(),
            owner_public: kp.public,
        };
        let record: Box<dyn CekWrapper> = Box::new(wrapper);
        let wrapped = record.wrap(&cek, "owner").await.unwrap();
        let recovered = unwrap_as(&wrapped, &kp.secret).unwrap();
        assert_eq!(cek.as_bytes(), recovered.as_bytes());
    }
}
