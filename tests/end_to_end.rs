//! End-to-end coverage for the upload/download round trip: the testable
//! properties and concrete scenarios for the transfer core, run against an
//! in-memory `ServerApi`/`ObjectStore` pair so nothing touches the network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use haven_client::wire::{
    CreateShareRequest, DownloadInfoResponse, EncryptionRecordWire, MeResponse, ObjectStore,
    PresignedGet, PresignedPut, ServerApi, ShareResponse, UploadCommitRequest,
    UploadCommitResponse, UploadInitRequest, UploadInitResponse,
};
use haven_client::{
    Config, DownloadEngine, DownloadOptions, InMemorySource, NoopProgress, ProgressSink,
    TransferError, TransferProgress, UploadEngine, UploadOptions,
};
use haven_crypto::keyring::{Keyring, UnlockedIdentity};
use haven_crypto::workers::WorkerPool;

/// Echoes back whatever manifest/commit it was given, and serves chunk
/// metadata straight from the last committed upload. A test can reach into
/// `committed` to tamper with the manifest before a download, or override
/// `recipient_override` to simulate a `POST /shares` hand-off.
struct TestServer {
    committed: Mutex<Option<UploadCommitRequest>>,
    recipient_override: Mutex<Option<EncryptionRecordWire>>,
}

impl TestServer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            committed: Mutex::new(None),
            recipient_override: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ServerApi for TestServer {
    async fn upload_init(
        &self,
        req: UploadInitRequest,
    ) -> haven_client::Result<UploadInitResponse> {
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

    async fn upload_commit(
        &self,
        req: UploadCommitRequest,
    ) -> haven_client::Result<UploadCommitResponse> {
        *self.committed.lock().unwrap() = Some(req);
        Ok(UploadCommitResponse {
            file_id: "test-file".to_string(),
        })
    }

    async fn download_info(&self, _file_id: &str) -> haven_client::Result<DownloadInfoResponse> {
        let committed = self.committed.lock().unwrap();
        let req = committed
            .as_ref()
            .expect("upload must commit before download");
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
            .recipient_override
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| req.recipients[0].clone());
        Ok(DownloadInfoResponse {
            file_id: req.manifest.file_id.clone(),
            storage_key: "test-key".to_string(),
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

    async fn me(&self) -> haven_client::Result<MeResponse> {
        unimplemented!()
    }
    async fn create_share(&self, _req: CreateShareRequest) -> haven_client::Result<ShareResponse> {
        unimplemented!()
    }
    async fn accept_share(&self, _share_id: &str) -> haven_client::Result<ShareResponse> {
        unimplemented!()
    }
    async fn decline_share(&self, _share_id: &str) -> haven_client::Result<ShareResponse> {
        unimplemented!()
    }
    async fn delete_share(&self, _share_id: &str) -> haven_client::Result<()> {
        unimplemented!()
    }
    async fn get_share(&self, _share_id: &str) -> haven_client::Result<ShareResponse> {
        unimplemented!()
    }
}

/// An object store that can be told to append trailing bytes, corrupt a
/// chunk, or delay a chunk's GET, so tests can drive the download engine's
/// size-reconciliation and in-order-emission paths deliberately.
#[derive(Default)]
struct TestStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    trailing_bytes: usize,
    corrupt_chunk: Option<u32>,
    delay_chunk: Option<(u32, Duration)>,
}

impl TestStore {
    fn plain() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_trailing_bytes(n: usize) -> Arc<Self> {
        Arc::new(Self {
            trailing_bytes: n,
            ..Self::default()
        })
    }

    fn with_corrupt_chunk(index: u32) -> Arc<Self> {
        Arc::new(Self {
            corrupt_chunk: Some(index),
            ..Self::default()
        })
    }

    fn with_delayed_chunk(index: u32, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay_chunk: Some((index, delay)),
            ..Self::default()
        })
    }

    fn chunk_index_from_url(url: &str) -> u32 {
        url.rsplit('/').next().unwrap().parse().unwrap()
    }
}

#[async_trait]
impl ObjectStore for TestStore {
    async fn put(&self, url: &str, body: Vec<u8>) -> haven_client::Result<()> {
        self.objects.lock().unwrap().insert(url.to_string(), body);
        Ok(())
    }

    async fn get(&self, url: &str) -> haven_client::Result<(Vec<u8>, Option<u64>)> {
        let index = Self::chunk_index_from_url(url);
        if let Some((delay_index, delay)) = self.delay_chunk {
            if index == delay_index {
                tokio::time::sleep(delay).await;
            }
        }
        let mut body = self
            .objects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default();
        if self.corrupt_chunk == Some(index) && !body.is_empty() {
            let last = body.len() - 1;
            body[last] ^= 0xFF;
        }
        if self.trailing_bytes > 0 {
            body.extend(std::iter::repeat(0xAAu8).take(self.trailing_bytes));
        }
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

/// A small, non-cryptographic xorshift stream, used only to generate
/// deterministic test fixtures reproducibly across runs (E2E-2).
fn deterministic_bytes(seed: u32, len: usize) -> Vec<u8> {
    let mut state = seed;
    let mut out = Vec::with_capacity(len + 4);
    while out.len() < len {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        out.extend_from_slice(&state.to_le_bytes());
    }
    out.truncate(len);
    out
}

struct Harness {
    server: Arc<TestServer>,
    store: Arc<TestStore>,
    workers: Arc<WorkerPool>,
    keyring: Arc<Keyring>,
    config: Config,
}

impl Harness {
    async fn new(store: Arc<TestStore>, chunk_size: u64) -> Self {
        let (keyring, _public) = fresh_identity().await;
        Self {
            server: TestServer::new(),
            store,
            workers: Arc::new(WorkerPool::new(haven_crypto::workers::clamp_worker_count(None))),
            keyring,
            config: Config::new("mem://test").with_chunk_size(chunk_size),
        }
    }

    async fn upload(&self, plaintext: Vec<u8>, filename: &str) -> haven_client::Result<String> {
        let engine = UploadEngine::new(
            self.server.clone(),
            self.store.clone(),
            self.workers.clone(),
            self.keyring.clone(),
            self.config.clone(),
        );
        let source = InMemorySource(plaintext);
        engine
            .upload(
                &source,
                UploadOptions {
                    filename: filename.to_string(),
                    mimetype: "application/octet-stream".to_string(),
                    ..Default::default()
                },
            )
            .await
    }

    fn download_engine(&self) -> DownloadEngine {
        DownloadEngine::new(
            self.server.clone(),
            self.store.clone(),
            self.workers.clone(),
            self.keyring.clone(),
            self.config.clone(),
        )
    }

    async fn download(&self, file_id: &str) -> haven_client::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.download_engine()
            .download(file_id, &mut out, DownloadOptions::default())
            .await?;
        Ok(out)
    }
}

// Property 1: round-trip.
#[tokio::test]
async fn round_trip_arbitrary_bytes() {
    let harness = Harness::new(TestStore::plain(), 4 * 1024 * 1024).await;
    let plaintext = deterministic_bytes(0x1234_5678, 50_000);
    let file_id = harness.upload(plaintext.clone(), "blob.bin").await.unwrap();
    let out = harness.download(&file_id).await.unwrap();
    assert_eq!(out, plaintext);
}

// Property 2: chunk boundary correctness, exercised through the full engine
// with a small chunk size so each boundary case runs fast.
#[tokio::test]
async fn chunk_boundary_sizes_round_trip() {
    const CHUNK_SIZE: u64 = 1024;
    for size in [0usize, 1, 1023, 1024, 1025, 3072, 3089] {
        let harness = Harness::new(TestStore::plain(), CHUNK_SIZE).await;
        let plaintext = deterministic_bytes(0xC0FF_EE00 ^ size as u32, size);
        let expected_chunk_count = std::cmp::max(1, (size as u64).div_ceil(CHUNK_SIZE));
        let file_id = harness
            .upload(plaintext.clone(), "boundary.bin")
            .await
            .unwrap();
        {
            let committed = harness.server.committed.lock().unwrap();
            let chunks = &committed.as_ref().unwrap().manifest.chunks;
            assert_eq!(chunks.len() as u64, expected_chunk_count, "size {size}");
            let last = chunks.last().unwrap();
            let expected_last_size = size as u64 - (expected_chunk_count - 1) * CHUNK_SIZE;
            assert_eq!(last.size, expected_last_size, "size {size}");
        }
        let out = harness.download(&file_id).await.unwrap();
        assert_eq!(out, plaintext, "size {size}");
    }
}

// Property 3: nonce uniqueness, exercised through a real multi-chunk upload.
#[tokio::test]
async fn nonces_differ_only_in_chunk_index() {
    let harness = Harness::new(TestStore::plain(), 1024).await;
    let plaintext = deterministic_bytes(0x9999, 1024 * 3 + 50);
    harness.upload(plaintext, "nonces.bin").await.unwrap();

    let committed = harness.server.committed.lock().unwrap();
    let chunks = &committed.as_ref().unwrap().manifest.chunks;
    assert_eq!(chunks.len(), 4);

    let nonces: Vec<Vec<u8>> = chunks
        .iter()
        .map(|c| haven_crypto::codec::base64_decode(&c.nonce).unwrap())
        .collect();

    let prefix_len = nonces[0].len() - 4;
    for (i, nonce) in nonces.iter().enumerate() {
        assert_eq!(&nonce[..prefix_len], &nonces[0][..prefix_len], "chunk {i}");
        let index_bytes: [u8; 4] = nonce[prefix_len..].try_into().unwrap();
        assert_eq!(u32::from_le_bytes(index_bytes), i as u32);
    }
    for i in 0..nonces.len() {
        for j in (i + 1)..nonces.len() {
            assert_ne!(nonces[i], nonces[j]);
        }
    }
}

// Property 4 + E2E-3: share round trip between two independent identities.
#[tokio::test]
async fn share_round_trip_between_two_identities() {
    let harness_a = Harness::new(TestStore::plain(), 4 * 1024 * 1024).await;
    let plaintext = b"hello, recipient!".to_vec();
    let file_id = harness_a
        .upload(plaintext.clone(), "secret-note.txt")
        .await
        .unwrap();

    let committed = harness_a.server.committed.lock().unwrap().clone().unwrap();
    let owner_record = haven_crypto::share::WrappingRecord {
        recipient_key_id: committed.recipients[0].recipient_key_id.clone(),
        kem_ciphertext: haven_crypto::codec::hex_decode(&committed.recipients[0].kyber_ciphertext)
            .unwrap(),
        wrapped_cek: haven_crypto::codec::base64_decode(&committed.recipients[0].wrapped_cek)
            .unwrap(),
        nonce: haven_crypto::aead::Nonce::from_bytes(
            &haven_crypto::codec::base64_decode(&committed.recipients[0].nonce_wrap_kyber)
                .unwrap(),
        )
        .unwrap(),
    };
    let cek = harness_a.keyring.unwrap_cek(&owner_record).await.unwrap();

    let (keyring_b, public_b) = fresh_identity().await;
    let record_for_b = haven_crypto::share::wrap_for(&cek, "user-b", &public_b).unwrap();

    *harness_a.server.recipient_override.lock().unwrap() = Some(EncryptionRecordWire {
        recipient_key_id: record_for_b.recipient_key_id,
        kyber_ciphertext: haven_crypto::codec::hex_encode(&record_for_b.kem_ciphertext),
        wrapped_cek: haven_crypto::codec::base64_encode(&record_for_b.wrapped_cek),
        nonce_wrap_kyber: haven_crypto::codec::base64_encode(record_for_b.nonce.as_bytes()),
    });

    let download_b = DownloadEngine::new(
        harness_a.server.clone(),
        harness_a.store.clone(),
        harness_a.workers.clone(),
        keyring_b,
        harness_a.config.clone(),
    );
    let mut out = Vec::new();
    download_b
        .download(&file_id, &mut out, DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(out, plaintext);
}

// Property 4 negative case: a record wrapped for A is not decryptable by B.
#[tokio::test]
async fn wrapping_for_one_recipient_fails_for_another() {
    let cek = haven_crypto::aead::AeadKey::generate();
    let (_keyring_a, public_a) = fresh_identity().await;
    let (keyring_b, _public_b) = fresh_identity().await;

    let record_for_a = haven_crypto::share::wrap_for(&cek, "user-a", &public_a).unwrap();
    let result = keyring_b.unwrap_cek(&record_for_a).await;
    assert!(result.is_err());
}

// E2E-1: exact 4 MiB boundary file.
#[tokio::test]
async fn e2e_1_exact_boundary_file() {
    let harness = Harness::new(TestStore::plain(), 4 * 1024 * 1024).await;
    let plaintext = vec![0x61u8; 4_194_304];
    let expected_hash =
        haven_crypto::hash::FileHash::compute(haven_crypto::hash::HashAlgorithm::Sha256, &plaintext)
            .to_hex();

    let file_id = harness.upload(plaintext.clone(), "a.bin").await.unwrap();
    {
        let committed = harness.server.committed.lock().unwrap();
        let manifest = &committed.as_ref().unwrap().manifest;
        assert_eq!(manifest.chunks.len(), 1);
        assert_eq!(manifest.chunks[0].size, 4_194_304);
        assert_eq!(manifest.whole_file_hash, expected_hash);
    }
    let out = harness.download(&file_id).await.unwrap();
    assert_eq!(out, plaintext);
}

// E2E-2: multi-chunk file with a tail, deterministic PRNG content.
#[tokio::test]
async fn e2e_2_multi_chunk_with_tail() {
    let harness = Harness::new(TestStore::plain(), 4 * 1024 * 1024).await;
    let plaintext = deterministic_bytes(0xDEAD_BEEF, 9_437_201);

    let file_id = harness.upload(plaintext.clone(), "tail.bin").await.unwrap();
    {
        let committed = harness.server.committed.lock().unwrap();
        let chunks = &committed.as_ref().unwrap().manifest.chunks;
        assert_eq!(chunks.len(), 3);
        let sizes: Vec<u64> = chunks.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![4_194_304, 4_194_304, 1_048_593]);

        let nonces: Vec<Vec<u8>> = chunks
            .iter()
            .map(|c| haven_crypto::codec::base64_decode(&c.nonce).unwrap())
            .collect();
        let prefix_len = nonces[0].len() - 4;
        for (i, nonce) in nonces.iter().enumerate() {
            assert_eq!(&nonce[..prefix_len], &nonces[0][..prefix_len]);
            let index_bytes: [u8; 4] = nonce[prefix_len..].try_into().unwrap();
            assert_eq!(u32::from_le_bytes(index_bytes), i as u32);
        }
    }

    let out = harness.download(&file_id).await.unwrap();
    assert_eq!(out, plaintext);
}

// E2E-4 / property 5: trailing bytes within and beyond the reconciliation
// budget.
#[tokio::test]
async fn e2e_4_trailing_bytes_within_budget_still_decrypts() {
    let harness = Harness::new(TestStore::with_trailing_bytes(7), 4096).await;
    let plaintext = deterministic_bytes(0x1111, 4096 * 2);
    let file_id = harness.upload(plaintext.clone(), "trail.bin").await.unwrap();
    let out = harness.download(&file_id).await.unwrap();
    assert_eq!(out, plaintext);
}

#[tokio::test]
async fn size_reconciliation_accepts_exactly_32_trailing_bytes() {
    let harness = Harness::new(TestStore::with_trailing_bytes(32), 4096).await;
    let plaintext = deterministic_bytes(0x2222, 4096);
    let file_id = harness.upload(plaintext.clone(), "trail32.bin").await.unwrap();
    let out = harness.download(&file_id).await.unwrap();
    assert_eq!(out, plaintext);
}

#[tokio::test]
async fn size_reconciliation_rejects_64_trailing_bytes() {
    let harness = Harness::new(TestStore::with_trailing_bytes(64), 4096).await;
    let plaintext = deterministic_bytes(0x3333, 4096);
    let file_id = harness.upload(plaintext, "trail64.bin").await.unwrap();
    let result = harness.download(&file_id).await;
    assert!(result.is_err());
}

// E2E-5 / property 7: corrupting a chunk's ciphertext fails decryption and
// reports which chunk.
#[tokio::test]
async fn e2e_5_corrupted_chunk_reports_its_index() {
    let harness = Harness::new(TestStore::with_corrupt_chunk(1), 4096).await;
    let plaintext = deterministic_bytes(0x4444, 4096 * 2);
    let file_id = harness.upload(plaintext, "corrupt.bin").await.unwrap();

    let result = harness.download(&file_id).await;
    match result {
        Err(TransferError::ChunkFailure { index, source }) => {
            assert_eq!(index, 1);
            assert!(matches!(source, haven_crypto::CryptoError::AeadFailure(_)));
        }
        other => panic!("expected ChunkFailure for chunk 1, got {other:?}"),
    }
}

// E2E-6: empty file.
#[tokio::test]
async fn e2e_6_empty_file() {
    let harness = Harness::new(TestStore::plain(), 4 * 1024 * 1024).await;
    let file_id = harness.upload(Vec::new(), "empty.bin").await.unwrap();
    {
        let committed = harness.server.committed.lock().unwrap();
        let chunks = &committed.as_ref().unwrap().manifest.chunks;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].size, 0);
        let nonce = haven_crypto::codec::base64_decode(&chunks[0].nonce).unwrap();
        let prefix_len = nonce.len() - 4;
        let index_bytes: [u8; 4] = nonce[prefix_len..].try_into().unwrap();
        assert_eq!(u32::from_le_bytes(index_bytes), 0);
    }
    let out = harness.download(&file_id).await.unwrap();
    assert_eq!(out, Vec::<u8>::new());
}

// Property 7 (manifest half): tampering the whole-file hash field
// invalidates both signatures.
#[tokio::test]
async fn tampered_manifest_body_fails_signature_verification() {
    let harness = Harness::new(TestStore::plain(), 4096).await;
    let file_id = harness.upload(vec![7u8; 4096], "tamper.bin").await.unwrap();
    {
        let mut committed = harness.server.committed.lock().unwrap();
        let hash = &mut committed.as_mut().unwrap().manifest.whole_file_hash;
        let mut chars: Vec<char> = hash.chars().collect();
        chars[0] = if chars[0] == '0' { '1' } else { '0' };
        *hash = chars.into_iter().collect();
    }
    let result = harness.download(&file_id).await;
    assert!(matches!(
        result,
        Err(TransferError::Crypto(haven_crypto::CryptoError::SignatureFailure(_)))
    ));
}

// Property 8: exactly one valid signature is rejected.
#[tokio::test]
async fn single_valid_signature_is_rejected() {
    let harness = Harness::new(TestStore::plain(), 4096).await;
    let file_id = harness.upload(vec![9u8; 4096], "tamper2.bin").await.unwrap();
    {
        let mut committed = harness.server.committed.lock().unwrap();
        let sig = &mut committed.as_mut().unwrap().signatures[0].signature;
        let mid = sig.len() / 2;
        let mut chars: Vec<char> = sig.chars().collect();
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        *sig = chars.into_iter().collect();
    }
    let result = harness.download(&file_id).await;
    assert!(matches!(
        result,
        Err(TransferError::Crypto(haven_crypto::CryptoError::SignatureFailure(_)))
    ));
}

// Property 9: in-order emission under shuffled arrival. Chunk 0 is delayed
// so chunks 1 and 2 finish fetching first; the assembled output must still
// be in strict ascending order.
#[tokio::test]
async fn in_order_emission_under_shuffled_arrival() {
    let harness = Harness::new(TestStore::with_delayed_chunk(0, Duration::from_millis(30)), 4096).await;
    let mut plaintext = vec![b'A'; 4096];
    plaintext.extend(std::iter::repeat(b'B').take(4096));
    plaintext.extend(std::iter::repeat(b'C').take(100));

    let file_id = harness.upload(plaintext.clone(), "shuffled.bin").await.unwrap();
    let out = harness.download(&file_id).await.unwrap();
    assert_eq!(out, plaintext);
}

// Property 10: cancellation before a download starts is prompt and emits no
// progress.
#[tokio::test]
async fn cancellation_before_download_is_prompt() {
    let harness = Harness::new(TestStore::plain(), 4096).await;
    let file_id = harness.upload(vec![1u8; 4096], "cancel.bin").await.unwrap();

    struct PanicOnProgress;
    impl ProgressSink for PanicOnProgress {
        fn on_progress(&self, _progress: TransferProgress) {
            panic!("no progress callback should fire after cancellation");
        }
    }

    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let options = DownloadOptions {
        progress: Arc::new(PanicOnProgress),
        cancel,
        ..Default::default()
    };

    let mut out = Vec::new();
    let result = harness
        .download_engine()
        .download(&file_id, &mut out, options)
        .await;
    assert!(matches!(result, Err(TransferError::Cancelled)));
}

#[allow(dead_code)]
fn unused_noop_progress_silences_import_warning() -> Arc<dyn ProgressSink> {
    Arc::new(NoopProgress)
}
