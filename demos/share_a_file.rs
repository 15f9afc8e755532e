//! Demonstrates the C8 share re-wrap flow end to end: user A uploads a file,
//! wraps its CEK for user B's ML-KEM public key, and user B recovers the CEK
//! and downloads the file — all in-memory, no network.
//!
//! Run with: `cargo run --example share_a_file`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use haven_client::wire::{
    CreateShareRequest, DownloadInfoResponse, MeResponse, ObjectStore, PresignedGet, PresignedPut,
    ServerApi, ShareResponse, UploadCommitRequest, UploadCommitResponse, UploadInitRequest,
    UploadInitResponse,
};
use haven_client::{Config, DownloadEngine, DownloadOptions, InMemorySource, Result, UploadEngine, UploadOptions};
use haven_crypto::keyring::{Keyring, UnlockedIdentity};
use haven_crypto::share::{wrap_for, WrappingRecord};
use haven_crypto::workers::WorkerPool;

struct InMemoryServer {
    committed: Mutex<Option<UploadCommitRequest>>,
    /// Overrides the owner's wrapping record in `download_info` with a
    /// recipient's, simulating what `POST /shares` would persist server-side.
    recipient_record: Mutex<Option<haven_client::wire::EncryptionRecordWire>>,
}

#[async_trait]
impl ServerApi for InMemoryServer {
    async fn upload_init(&self, req: UploadInitRequest) -> Result<UploadInitResponse> {
        let presigned = (0..req.projected_chunk_count)
            .map(|i| PresignedPut {
                chunk_index: i,
                put_url: format!("mem://chunk/{i}"),
                object_key: format!("obj-{i}"),
            })
            .collect();
        Ok(UploadInitResponse {
            projected_chunk_count: req.projected_chunk_count,
            presigned,
        })
    }

    async fn upload_commit(&self, req: UploadCommitRequest) -> Result<UploadCommitResponse> {
        *self.committed.lock().unwrap() = Some(req);
        Ok(UploadCommitResponse {
            file_id: "shared-file".to_string(),
        })
    }

    async fn download_info(&self, _file_id: &str) -> Result<DownloadInfoResponse> {
        let committed = self.committed.lock().unwrap();
        let req = committed.as_ref().expect("upload must commit before download");
        let presigned = req
            .manifest
            .chunks
            .iter()
            .map(|c| PresignedGet {
                chunk_index: c.index,
                get_url: format!("mem://chunk/{}", c.index),
                object_key: format!("obj-{}", c.index),
            })
            .collect();
        let encryption = self
            .recipient_record
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| req.recipients[0].clone());
        Ok(DownloadInfoResponse {
            file_id: req.manifest.file_id.clone(),
            storage_key: "shared-key".to_string(),
            original_filename: req.manifest.original_filename.clone(),
            filename_salt: req.manifest.filename_salt.clone(),
            mimetype: req.manifest.mimetype.clone(),
            size: req.manifest.size,
            whole_file_hash: req.manifest.whole_file_hash.clone(),
            chunk_count: req.manifest.chunks.len() as u32,
            chunks: req.manifest.chunks.clone(),
            presigned,
            manifest: req.manifest.clone(),
            signatures: req.signatures.clone(),
            encryption,
        })
    }

    async fn me(&self) -> Result<MeResponse> {
        unimplemented!()
    }
    async fn create_share(&self, _req: CreateShareRequest) -> Result<ShareResponse> {
        unimplemented!("the server-side /shares endpoint is out of scope for the core; see spec.md §1")
    }
    async fn accept_share(&self, _share_id: &str) -> Result<ShareResponse> {
        unimplemented!()
    }
    async fn decline_share(&self, _share_id: &str) -> Result<ShareResponse> {
        unimplemented!()
    }
    async fn delete_share(&self, _share_id: &str) -> Result<()> {
        unimplemented!()
    }
    async fn get_share(&self, _share_id: &str) -> Result<ShareResponse> {
        unimplemented!()
    }
}

struct InMemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<()> {
        self.objects.lock().unwrap().insert(url.to_string(), body);
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<(Vec<u8>, Option<u64>)> {
        let body = self.objects.lock().unwrap().get(url).cloned().unwrap_or_default();
        let len = body.len() as u64;
        Ok((body, Some(len)))
    }
}

async fn fresh_identity() -> (Arc<Keyring>, haven_crypto::kem::PublicKey) {
    let keyring = Keyring::new();
    let kem_kp = haven_crypto::kem::generate_keypair();
    let public = kem_kp.public.clone();
    let ed = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
    let (mldsa_pk, mldsa_sk) = pqcrypto_mldsa::mldsa65::keypair();
    keyring
        .unlock(UnlockedIdentity {
            kem_public: kem_kp.public,
            kem_secret: kem_kp.secret,
            ed25519_signing_key: ed,
            mldsa_public: mldsa_pk,
            mldsa_secret: mldsa_sk,
        })
        .await
        .unwrap();
    (keyring, public)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // User A (the owner) uploads the file normally.
    let (keyring_a, _public_a) = fresh_identity().await;
    let store = Arc::new(InMemoryStore {
        objects: Mutex::new(HashMap::new()),
    });
    let server = Arc::new(InMemoryServer {
        committed: Mutex::new(None),
        recipient_record: Mutex::new(None),
    });
    let workers = Arc::new(WorkerPool::new(haven_crypto::workers::clamp_worker_count(None)));
    let config = Config::new("mem://demo").with_chunk_size(64 * 1024);

    let upload = UploadEngine::new(server.clone(), store.clone(), workers.clone(), keyring_a.clone(), config.clone());
    let plaintext = b"hello, recipient!".to_vec();
    let source = InMemorySource(plaintext.clone());
    let file_id = upload
        .upload(
            &source,
            UploadOptions {
                filename: "secret-note.txt".to_string(),
                mimetype: "text/plain".to_string(),
                ..Default::default()
            },
        )
        .await?;
    println!("user A uploaded {file_id}");

    // The CEK never leaves this process, so to share it we recover it from
    // the owner's own wrapping record, then re-wrap it for user B. A real
    // server round trip would go through POST /shares instead.
    let committed = server.committed.lock().unwrap().clone().unwrap();
    let owner_record = WrappingRecord {
        recipient_key_id: committed.recipients[0].recipient_key_id.clone(),
        kem_ciphertext: haven_crypto::codec::hex_decode(&committed.recipients[0].kyber_ciphertext)?,
        wrapped_cek: haven_crypto::codec::base64_decode(&committed.recipients[0].wrapped_cek)?,
        nonce: haven_crypto::aead::Nonce::from_bytes(&haven_crypto::codec::base64_decode(
            &committed.recipients[0].nonce_wrap_kyber,
        )?)?,
    };
    let cek = keyring_a.unwrap_cek(&owner_record).await?;

    // User B generates their own keypair and is given a wrapping record for
    // the same CEK, targeted at their public key.
    let (keyring_b, public_b) = fresh_identity().await;
    let record_for_b = wrap_for(&cek, "user-b", &public_b)?;
    *server.recipient_record.lock().unwrap() = Some(haven_client::wire::EncryptionRecordWire {
        recipient_key_id: record_for_b.recipient_key_id,
        kyber_ciphertext: haven_crypto::codec::hex_encode(&record_for_b.kem_ciphertext),
        wrapped_cek: haven_crypto::codec::base64_encode(&record_for_b.wrapped_cek),
        nonce_wrap_kyber: haven_crypto::codec::base64_encode(record_for_b.nonce.as_bytes()),
    });

    // User B downloads using only their own keyring; `unwrap_cek` recovers
    // the same CEK A encrypted with, via B's ML-KEM secret key.
    let download = DownloadEngine::new(server, store, workers, keyring_b, config);
    let mut out = Vec::new();
    let result = download
        .download(&file_id, &mut out, DownloadOptions::default())
        .await?;
    assert_eq!(out, plaintext);
    println!(
        "user B recovered {:?} ({} bytes, mimetype={})",
        String::from_utf8_lossy(&result.filename),
        result.total_size,
        result.mimetype
    );
    println!("share round-trip verified");
    Ok(())
}
