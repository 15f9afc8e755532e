//! Download engine (C7).
//!
//! Two stages run per chunk: Stage A fetches ciphertext from a presigned
//! GET URL (bounded to `Config::download_concurrency` concurrent fetches),
//! Stage B decrypts, decompresses, and verifies it on the worker pool.
//! Chunks complete in whatever order their fetches happen to finish in;
//! this engine buffers out-of-order completions and only writes to the
//! output sink once every lower-indexed chunk has already been written, so
//! the emitted byte stream is always in strict chunk order regardless of
//! network arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use haven_crypto::aead::Nonce;
use haven_crypto::hash::{HashAlgorithm, IncrementalHasher};
use haven_crypto::keyring::Keyring;
use haven_crypto::manifest::{
    CompressionAlgorithm, CompressionDescriptor, ManifestBody, ManifestChunk, SignatureBlock,
    SignedManifest,
};
use haven_crypto::share::WrappingRecord;
use haven_crypto::workers::{Job, JobOutput, WorkerPool};

use crate::config::Config;
use crate::error::{Result, TransferError};
use crate::upload::{NoopProgress, ProgressSink, TransferProgress};
use crate::wire::{DownloadInfoResponse, EncryptionRecordWire, ObjectStore, ServerApi};

/// The download state machine's states, reported alongside byte progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Initializing,
    Downloading,
    Assembling,
    Verifying,
    Complete,
    Cancelled,
    Failed,
}

/// Lets a caller quiesce an in-progress download between chunks without
/// aborting any fetch already underway (§4.7 "Cancellation & pause": "it
/// must not cancel in-flight fetches"). Backed by a `tokio::sync::watch`
/// channel rather than a `Notify`/`AtomicBool` pair so a `resume()` that
/// races ahead of a waiter can never be missed: the waiter always
/// observes the latest value instead of depending on being registered
/// before the notification fires.
#[derive(Clone)]
pub struct PauseController {
    state: Arc<tokio::sync::watch::Sender<bool>>,
}

impl PauseController {
    pub fn new() -> Self {
        let (tx, _rx) = tokio::sync::watch::channel(false);
        Self { state: Arc::new(tx) }
    }

    /// Requests that the pipeline quiesce at its next chunk boundary.
    pub fn pause(&self) {
        let _ = self.state.send(true);
    }

    /// Lets a quiesced pipeline resume.
    pub fn resume(&self) {
        let _ = self.state.send(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.state.borrow()
    }

    /// The `pause.wait` suspension point (§5): returns immediately if not
    /// paused, otherwise suspends until [`PauseController::resume`] is
    /// called.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        while *rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for PauseController {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DownloadOptions {
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
    pub pause: PauseController,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
            pause: PauseController::new(),
        }
    }
}

/// The decrypted filename and mimetype recovered alongside the file's
/// content, returned so a caller can name the output appropriately.
pub struct DownloadResult {
    pub filename: Vec<u8>,
    pub mimetype: String,
    pub total_size: u64,
}

pub struct DownloadEngine {
    server: Arc<dyn ServerApi>,
    store: Arc<dyn ObjectStore>,
    workers: Arc<WorkerPool>,
    keyring: Arc<Keyring>,
    config: Config,
}

impl DownloadEngine {
    pub fn new(
        server: Arc<dyn ServerApi>,
        store: Arc<dyn ObjectStore>,
        workers: Arc<WorkerPool>,
        keyring: Arc<Keyring>,
        config: Config,
    ) -> Self {
        Self {
            server,
            store,
            workers,
            keyring,
            config,
        }
    }

    /// Downloads `file_id`, writing plaintext to `sink` in strict chunk
    /// order, and verifies the whole-file hash before returning. Drives the
    /// §4.7 state machine (`Initializing → Downloading → Assembling →
    /// Verifying → Complete`, with `Cancelled`/`Failed` reachable from any
    /// non-terminal state) through `options.progress.on_state_change`.
    #[tracing::instrument(skip(self, sink, options))]
    pub async fn download(
        &self,
        file_id: &str,
        sink: &mut (dyn tokio::io::AsyncWrite + Unpin + Send),
        options: DownloadOptions,
    ) -> Result<DownloadResult> {
        options.progress.on_state_change(DownloadState::Initializing);
        let result = self.download_inner(file_id, sink, &options).await;
        options.progress.on_state_change(match &result {
            Ok(_) => DownloadState::Complete,
            Err(TransferError::Cancelled) => DownloadState::Cancelled,
            Err(_) => DownloadState::Failed,
        });
        result
    }

    async fn download_inner(
        &self,
        file_id: &str,
        sink: &mut (dyn tokio::io::AsyncWrite + Unpin + Send),
        options: &DownloadOptions,
    ) -> Result<DownloadResult> {
        let info = self.server.download_info(file_id).await?;
        let signed = parse_signed_manifest(&info)?;
        haven_crypto::manifest::verify(&signed)?;

        let filename_ciphertext =
            haven_crypto::codec::base64_decode(&signed.body.ciphertext_filename)?;
        let filename_nonce_bytes =
            haven_crypto::codec::base64_decode(&signed.body.filename_salt)?;
        let filename_nonce = Nonce::from_bytes(&filename_nonce_bytes)?;
        let filename = haven_crypto::keyring::decrypt_name(
            &self.keyring,
            &filename_ciphertext,
            &filename_nonce,
        )
        .await?;

        let wrapping_record = parse_wrapping_record(&info.encryption)?;
        let cek = self.keyring.unwrap_cek(&wrapping_record).await?;

        let chunk_count = signed.body.chunks.len() as u32;
        let total_size = signed.body.total_size;
        let get_urls: HashMap<u32, String> = info
            .presigned
            .iter()
            .map(|p| (p.chunk_index, p.get_url.clone()))
            .collect();

        let fetch_jobs = stream::iter(signed.body.chunks.clone().into_iter().map(|chunk| {
            let get_url = get_urls
                .get(&chunk.index)
                .cloned()
                .ok_or_else(|| TransferError::Internal(format!("missing presigned GET for chunk {}", chunk.index)));
            (chunk, get_url)
        }))
        .map(|(chunk, get_url)| {
            let cek = cek.clone();
            let cancel = options.cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(TransferError::Cancelled);
                }
                let get_url = get_url?;
                let plaintext = self.fetch_and_decode_chunk(&chunk, &get_url, &cek).await?;
                Ok::<(u32, Vec<u8>), TransferError>((chunk.index, plaintext))
            }
        })
        .buffer_unordered(self.config.download_concurrency);

        options.progress.on_state_change(DownloadState::Downloading);

        let mut pending: HashMap<u32, Vec<u8>> = HashMap::new();
        let mut next_to_emit = 0u32;
        let mut bytes_emitted = 0u64;
        let mut whole_hasher = IncrementalHasher::new(HashAlgorithm::from_hex_len(
            signed.body.whole_file_hash.len(),
        )?);

        let mut pinned = Box::pin(fetch_jobs);
        loop {
            // Quiesces at the next chunk boundary without aborting any
            // fetch already in flight inside `pinned`. Pausing only
            // withholds the next `.next()` poll; it never cancels (§4.7).
            options.pause.wait().await;
            let Some(result) = pinned.next().await else {
                break;
            };
            let (index, plaintext) = result?;
            pending.insert(index, plaintext);
            while let Some(next) = pending.remove(&next_to_emit) {
                sink.write_all(&next).await?;
                whole_hasher.update(&next);
                bytes_emitted += next.len() as u64;
                next_to_emit += 1;
                options.progress.on_progress(TransferProgress {
                    bytes_done: bytes_emitted,
                    total_bytes: total_size,
                    chunks_done: next_to_emit,
                    chunk_count,
                });
            }
        }

        options.progress.on_state_change(DownloadState::Assembling);

        if next_to_emit != chunk_count {
            return Err(TransferError::Internal(
                "download ended with chunks missing from the in-order stream".to_string(),
            ));
        }

        sink.flush().await?;

        options.progress.on_state_change(DownloadState::Verifying);

        let actual_hash = whole_hasher.finalize_hex();
        if actual_hash != signed.body.whole_file_hash {
            return Err(TransferError::Crypto(
                haven_crypto::CryptoError::IntegrityFailure {
                    expected: signed.body.whole_file_hash.clone(),
                    actual: actual_hash,
                },
            ));
        }

        Ok(DownloadResult {
            filename,
            mimetype: signed.body.mimetype,
            total_size,
        })
    }

    async fn fetch_and_decode_chunk(
        &self,
        chunk: &ManifestChunk,
        get_url: &str,
        cek: &haven_crypto::aead::AeadKey,
    ) -> Result<Vec<u8>> {
        self.fetch_and_decode_chunk_inner(chunk, get_url, cek)
            .await
            .map_err(|e| attach_chunk_index(e, chunk.index))
    }

    async fn fetch_and_decode_chunk_inner(
        &self,
        chunk: &ManifestChunk,
        get_url: &str,
        cek: &haven_crypto::aead::AeadKey,
    ) -> Result<Vec<u8>> {
        let (raw, reported_len) = self.store.get(get_url).await?;
        let expected_ciphertext_len =
            chunk.compression.compressed_size as usize + haven_crypto::aead::TAG_SIZE;
        let nonce_bytes = haven_crypto::codec::base64_decode(&chunk.nonce)?;
        let nonce = Nonce::from_bytes(&nonce_bytes)?;

        let decrypted = self
            .decrypt_with_size_reconciliation(raw, reported_len, expected_ciphertext_len, cek, &nonce)
            .await?;

        let plaintext = if chunk.compression.algorithm == CompressionAlgorithm::None {
            decrypted
        } else {
            match self
                .workers
                .submit(Job::Decompress {
                    algorithm: chunk.compression.algorithm,
                    compressed: decrypted,
                    original_size: chunk.compression.original_size as usize,
                })
                .await?
            {
                JobOutput::Bytes(b) => b,
                JobOutput::Hex(_) => unreachable!("Decompress always yields JobOutput::Bytes"),
            }
        };

        haven_crypto::hash::verify_chunk_hash(&plaintext, &chunk.content_hash)?;
        Ok(plaintext)
    }

    /// Implements §4.7's size-reconciliation rule for one fetched chunk
    /// body, decrypting as it goes (the "try full buffer, then sweep
    /// truncation offsets" fallback is only meaningful measured against
    /// whether decryption actually succeeds):
    ///
    /// - `received == expected`: decrypt as is.
    /// - `received > expected`, `diff <= 32`: truncate to `expected`, decrypt.
    /// - `received > expected`, `diff > 32`: try the full buffer first; on
    ///   `AeadFailure`, sweep truncation offsets `1..=min(32, diff)` off the
    ///   end of the buffer until one decrypts or the sweep is exhausted.
    /// - `received < expected` but `received == reported_len`: accept as is
    ///   (the store's own `Content-Length` agrees with what it sent).
    /// - otherwise: `SizeMismatch`.
    async fn decrypt_with_size_reconciliation(
        &self,
        body: Vec<u8>,
        reported_len: Option<u64>,
        expected_len: usize,
        cek: &haven_crypto::aead::AeadKey,
        nonce: &Nonce,
    ) -> Result<Vec<u8>> {
        let received_len = body.len();

        if received_len < expected_len {
            if reported_len == Some(received_len as u64) {
                return self.decrypt_candidate(body, cek, nonce).await;
            }
            return Err(TransferError::SizeMismatch {
                expected: expected_len as u64,
                actual: received_len as u64,
            });
        }

        let diff = received_len - expected_len;
        if diff == 0 {
            return self.decrypt_candidate(body, cek, nonce).await;
        }
        if diff <= 32 {
            let mut truncated = body;
            truncated.truncate(expected_len);
            return self.decrypt_candidate(truncated, cek, nonce).await;
        }

        // diff > 32: try the full buffer, then sweep small truncations off
        // the tail before giving up.
        if let Ok(plaintext) = self.decrypt_candidate(body.clone(), cek, nonce).await {
            return Ok(plaintext);
        }
        for trim in 1..=32usize.min(diff) {
            let mut candidate = body.clone();
            candidate.truncate(received_len - trim);
            if let Ok(plaintext) = self.decrypt_candidate(candidate, cek, nonce).await {
                return Ok(plaintext);
            }
        }
        Err(TransferError::SizeMismatch {
            expected: expected_len as u64,
            actual: received_len as u64,
        })
    }

    async fn decrypt_candidate(
        &self,
        ciphertext: Vec<u8>,
        cek: &haven_crypto::aead::AeadKey,
        nonce: &Nonce,
    ) -> Result<Vec<u8>> {
        match self
            .workers
            .submit(Job::DecryptChunk {
                key: cek.clone(),
                nonce: *nonce,
                ciphertext,
            })
            .await?
        {
            JobOutput::Bytes(b) => Ok(b),
            JobOutput::Hex(_) => unreachable!("DecryptChunk always yields JobOutput::Bytes"),
        }
    }
}

/// Attributes a crypto failure to the chunk that produced it, so a caller
/// can report exactly which chunk was unrecoverable rather than just "some
/// chunk failed" (§7, §8 property 7 / E2E-5). Non-crypto errors (a missing
/// presigned URL, cancellation) pass through unchanged.
fn attach_chunk_index(err: TransferError, index: u32) -> TransferError {
    match err {
        TransferError::Crypto(source) => TransferError::ChunkFailure { index, source },
        other => other,
    }
}

fn parse_signed_manifest(info: &DownloadInfoResponse) -> Result<SignedManifest> {
    let chunks = info
        .manifest
        .chunks
        .iter()
        .map(|c| {
            let algorithm = CompressionAlgorithm::parse(&c.compression)?;
            Ok(ManifestChunk {
                index: c.index,
                size: c.size,
                content_hash: c.sha256.clone(),
                nonce: c.nonce.clone(),
                compression: CompressionDescriptor {
                    algorithm,
                    original_size: c.original_size,
                    compressed_size: c.compressed_size,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let body = ManifestBody {
        file_id: info.manifest.file_id.clone(),
        ciphertext_filename: info.manifest.original_filename.clone(),
        filename_salt: info.manifest.filename_salt.clone(),
        mimetype: info.manifest.mimetype.clone(),
        total_size: info.manifest.size,
        whole_file_hash: info.manifest.whole_file_hash.clone(),
        chunks,
        created_at_unix: info.manifest.created_at,
        algorithm_version: info.manifest.algorithm_version.clone(),
    };

    let mut classical = None;
    let mut post_quantum = None;
    for sig in &info.signatures {
        let block = SignatureBlock {
            algorithm: algorithm_static(&sig.algorithm)?,
            public_key_b64: sig.public_key.clone(),
            signature_b64: sig.signature.clone(),
        };
        match sig.algorithm.as_str() {
            "ed25519" => classical = Some(block),
            "ml-dsa-65" => post_quantum = Some(block),
            other => return Err(TransferError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    Ok(SignedManifest {
        body,
        classical: classical
            .ok_or_else(|| TransferError::MalformedEncoding("missing ed25519 signature".into()))?,
        post_quantum: post_quantum.ok_or_else(|| {
            TransferError::MalformedEncoding("missing ml-dsa-65 signature".into())
        })?,
    })
}

fn algorithm_static(s: &str) -> Result<&'static str> {
    match s {
        "ed25519" => Ok("ed25519"),
        "ml-dsa-65" => Ok("ml-dsa-65"),
        other => Err(TransferError::UnsupportedAlgorithm(other.to_string())),
    }
}

fn parse_wrapping_record(wire: &EncryptionRecordWire) -> Result<WrappingRecord> {
    Ok(WrappingRecord {
        recipient_key_id: wire.recipient_key_id.clone(),
        kem_ciphertext: haven_crypto::codec::hex_decode(&wire.kyber_ciphertext)?,
        wrapped_cek: haven_crypto::codec::base64_decode(&wire.wrapped_cek)?,
        nonce: Nonce::from_bytes(&haven_crypto::codec::base64_decode(&wire.nonce_wrap_kyber)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{
        CreateShareRequest, ManifestChunkWire, ManifestWire, MeResponse, PresignedGet,
        ShareResponse, SignatureWire, UploadCommitRequest, UploadCommitResponse,
        UploadInitRequest, UploadInitResponse,
    };
    use haven_crypto::aead::{AeadKey, NoncePrefix};
    use haven_crypto::keyring::UnlockedIdentity;
    use haven_crypto::manifest::{self as manifest_mod};
    use haven_crypto::share::{CekWrapper, SelfWrapper};
    use std::sync::Mutex as StdMutex;

    struct FixtureServer {
        info: DownloadInfoResponse,
    }

    #[async_trait::async_trait]
    impl ServerApi for FixtureServer {
        async fn upload_init(&self, _req: UploadInitRequest) -> Result<UploadInitResponse> {
            unimplemented!()
        }
        async fn upload_commit(&self, _req: UploadCommitRequest) -> Result<UploadCommitResponse> {
            unimplemented!()
        }
        async fn download_info(&self, _file_id: &str) -> Result<DownloadInfoResponse> {
            Ok(self.info.clone())
        }
        async fn me(&self) -> Result<MeResponse> {
            unimplemented!()
        }
        async fn create_share(&self, _req: CreateShareRequest) -> Result<ShareResponse> {
            unimplemented!()
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

    struct FixtureStore {
        objects: StdMutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for FixtureStore {
        async fn put(&self, url: &str, body: Vec<u8>) -> Result<()> {
            self.objects.lock().unwrap().insert(url.to_string(), body);
            Ok(())
        }
        async fn get(&self, url: &str) -> Result<(Vec<u8>, Option<u64>)> {
            let body = self
                .objects
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| TransferError::Internal("missing object".into()))?;
            let len = body.len() as u64;
            Ok((body, Some(len)))
        }
    }

    async fn build_fixture(plaintext: &[u8]) -> (Arc<FixtureServer>, Arc<FixtureStore>, Arc<Keyring>) {
        let keyring = Keyring::new();
        let kem_kp = haven_crypto::kem::generate_keypair();
        let ed = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let (mldsa_pk, mldsa_sk) = pqcrypto_mldsa::mldsa65::keypair();
        keyring
            .unlock(UnlockedIdentity {
                kem_public: kem_kp.public.clone(),
                kem_secret: kem_kp.secret,
                ed25519_signing_key: ed,
                mldsa_public: mldsa_pk,
                mldsa_secret: mldsa_sk,
            })
            .await
            .unwrap();

        let cek = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let nonce = Nonce::for_chunk(&prefix, 0);
        let content_hash = haven_crypto::hash::blake3_chunk_hash(plaintext);
        let ciphertext = haven_crypto::aead::encrypt(&cek, &nonce, plaintext).unwrap();

        let objects = StdMutex::new(HashMap::new());
        objects
            .lock()
            .unwrap()
            .insert("https://store.example/get/0".to_string(), ciphertext);
        let store = Arc::new(FixtureStore { objects });

        let (ciphertext_filename, filename_nonce) =
            haven_crypto::keyring::encrypt_name(&keyring, b"secret.txt").await.unwrap();

        let whole_hash = haven_crypto::hash::FileHash::compute(
            HashAlgorithm::Sha256,
            plaintext,
        )
        .to_hex();

        let body = manifest_mod::ManifestBody {
            file_id: "file-1".to_string(),
            ciphertext_filename: haven_crypto::codec::base64_encode(&ciphertext_filename),
            filename_salt: haven_crypto::codec::base64_encode(filename_nonce.as_bytes()),
            mimetype: "text/plain".to_string(),
            total_size: plaintext.len() as u64,
            whole_file_hash: whole_hash,
            chunks: vec![ManifestChunk {
                index: 0,
                size: plaintext.len() as u64,
                content_hash,
                nonce: haven_crypto::codec::base64_encode(nonce.as_bytes()),
                compression: CompressionDescriptor {
                    algorithm: CompressionAlgorithm::None,
                    original_size: plaintext.len() as u64,
                    compressed_size: plaintext.len() as u64,
                },
            }],
            created_at_unix: 1_700_000_000,
            algorithm_version: manifest_mod::ALGORITHM_VERSION.to_string(),
        };

        let (ed_key, mldsa_pk2, mldsa_sk2) = keyring.signing_keys().await.unwrap();
        let signed = manifest_mod::sign(body, &ed_key, &mldsa_pk2, &mldsa_sk2).unwrap();

        let wrapper = SelfWrapper {
            owner_key_id: "owner".to_string(),
            owner_public: kem_kp.public,
        };
        let wrapping_record = wrapper.wrap(&cek, "owner").await.unwrap();

        let info = DownloadInfoResponse {
            file_id: "file-1".to_string(),
            storage_key: "key-1".to_string(),
            original_filename: signed.body.ciphertext_filename.clone(),
            filename_salt: signed.body.filename_salt.clone(),
            mimetype: signed.body.mimetype.clone(),
            size: signed.body.total_size,
            whole_file_hash: signed.body.whole_file_hash.clone(),
            chunk_count: 1,
            chunks: vec![ManifestChunkWire {
                index: 0,
                size: signed.body.chunks[0].size,
                sha256: signed.body.chunks[0].content_hash.clone(),
                nonce: signed.body.chunks[0].nonce.clone(),
                compression: signed.body.chunks[0].compression.algorithm.as_str().to_string(),
                original_size: signed.body.chunks[0].compression.original_size,
                compressed_size: signed.body.chunks[0].compression.compressed_size,
            }],
            presigned: vec![PresignedGet {
                chunk_index: 0,
                get_url: "https://store.example/get/0".to_string(),
                object_key: "obj-0".to_string(),
            }],
            manifest: ManifestWire {
                file_id: signed.body.file_id.clone(),
                original_filename: signed.body.ciphertext_filename.clone(),
                filename_salt: signed.body.filename_salt.clone(),
                mimetype: signed.body.mimetype.clone(),
                size: signed.body.total_size,
                whole_file_hash: signed.body.whole_file_hash.clone(),
                algorithm_version: signed.body.algorithm_version.clone(),
                created_at: signed.body.created_at_unix,
                chunks: vec![ManifestChunkWire {
                    index: 0,
                    size: signed.body.chunks[0].size,
                    sha256: signed.body.chunks[0].content_hash.clone(),
                    nonce: signed.body.chunks[0].nonce.clone(),
                    compression: signed.body.chunks[0]
                        .compression
                        .algorithm
                        .as_str()
                        .to_string(),
                    original_size: signed.body.chunks[0].compression.original_size,
                    compressed_size: signed.body.chunks[0].compression.compressed_size,
                }],
            },
            signatures: vec![
                SignatureWire {
                    algorithm: signed.classical.algorithm.to_string(),
                    public_key: signed.classical.public_key_b64.clone(),
                    signature: signed.classical.signature_b64.clone(),
                },
                SignatureWire {
                    algorithm: signed.post_quantum.algorithm.to_string(),
                    public_key: signed.post_quantum.public_key_b64.clone(),
                    signature: signed.post_quantum.signature_b64.clone(),
                },
            ],
            encryption: EncryptionRecordWire {
                recipient_key_id: wrapping_record.recipient_key_id,
                kyber_ciphertext: haven_crypto::codec::hex_encode(&wrapping_record.kem_ciphertext),
                wrapped_cek: haven_crypto::codec::base64_encode(&wrapping_record.wrapped_cek),
                nonce_wrap_kyber: haven_crypto::codec::base64_encode(
                    wrapping_record.nonce.as_bytes(),
                ),
            },
        };

        (Arc::new(FixtureServer { info }), store, keyring)
    }

    #[tokio::test]
    async fn downloads_and_verifies_small_file() {
        let plaintext = b"this content roundtrips through the whole download pipeline";
        let (server, store, keyring) = build_fixture(plaintext).await;
        let workers = Arc::new(WorkerPool::new(2));
        let config = Config::new("https://api.example.com");
        let engine = DownloadEngine::new(server, store, workers, keyring, config);

        let mut out = Vec::new();
        let result = engine
            .download("file-1", &mut out, DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(out, plaintext);
        assert_eq!(result.filename, b"secret.txt");
        assert_eq!(result.mimetype, "text/plain");
    }

    #[tokio::test]
    async fn tampered_chunk_hash_is_rejected() {
        let plaintext = b"tamper target";
        let (server, store, keyring) = build_fixture(plaintext).await;
        {
            let mut objects = store.objects.lock().unwrap();
            let ct = objects.get_mut("https://store.example/get/0").unwrap();
            let last = ct.len() - 1;
            ct[last] ^= 0xFF;
        }
        let workers = Arc::new(WorkerPool::new(2));
        let config = Config::new("https://api.example.com");
        let engine = DownloadEngine::new(server, store, workers, keyring, config);

        let mut out = Vec::new();
        let result = engine
            .download("file-1", &mut out, DownloadOptions::default())
            .await;
        assert!(result.is_err());
    }
}
