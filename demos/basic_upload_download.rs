//! Uploads a small in-memory file through `UploadEngine`, then downloads it
//! back through `DownloadEngine` and checks the round-trip, all against an
//! in-memory `ServerApi`/`ObjectStore` pair so the demo runs with no network.
//!
//! Run with: `cargo run --example basic_upload_download`

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
use haven_crypto::workers::WorkerPool;

/// An in-memory server that just echoes back whatever manifest/commit it was
/// given, and serves chunks straight out of the object store it shares with
/// [`InMemoryStore`].
struct InMemoryServer {
    committed: Mutex<Option<haven_client::wire::UploadCommitRequest>>,
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
            file_id: "demo-file".to_string(),
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
        Ok(DownloadInfoResponse {
            file_id: req.manifest.file_id.clone(),
            storage_key: "demo-key".to_string(),
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
            encryption: req.recipients[0].clone(),
        })
    }

    async fn me(&self) -> Result<MeResponse> {
        unimplemented!("not exercised by this demo")
    }
    async fn create_share(&self, _req: CreateShareRequest) -> Result<ShareResponse> {
        unimplemented!("see share_a_file.rs")
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let keyring = Keyring::new();
    let kem_kp = haven_crypto::kem::generate_keypair();
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
        .await?;

    let store = Arc::new(InMemoryStore {
        objects: Mutex::new(HashMap::new()),
    });
    let server = Arc::new(InMemoryServer {
        committed: Mutex::new(None),
    });
    let workers = Arc::new(WorkerPool::new(haven_crypto::workers::clamp_worker_count(None)));
    let config = Config::new("mem://demo").with_chunk_size(64 * 1024);

    let upload = UploadEngine::new(server.clone(), store.clone(), workers.clone(), keyring.clone(), config.clone());
    let plaintext = b"Haven demo payload, encrypted end-to-end before it ever leaves this process.".to_vec();
    let source = InMemorySource(plaintext.clone());
    let file_id = upload
        .upload(
            &source,
            UploadOptions {
                filename: "demo.txt".to_string(),
                mimetype: "text/plain".to_string(),
                ..Default::default()
            },
        )
        .await?;
    println!("uploaded as {file_id}");

    let download = DownloadEngine::new(server, store, workers, keyring, config);
    let mut out = Vec::new();
    let result = download
        .download(&file_id, &mut out, DownloadOptions::default())
        .await?;
    println!(
        "downloaded {} bytes, filename={:?}, mimetype={}",
        result.total_size,
        String::from_utf8_lossy(&result.filename),
        result.mimetype
    );
    assert_eq!(out, plaintext, "round-tripped plaintext must match the original");
    println!("round-trip verified");
    Ok(())
}
