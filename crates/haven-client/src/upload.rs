//! Upload engine (C6).
//!
//! Reads a plaintext source chunk by chunk, compresses and encrypts each
//! chunk on the worker pool, uploads ciphertext to a presigned object-store
//! URL, and — once every chunk has landed — builds and dual-signs the
//! manifest and commits it. The per-chunk pipeline runs with bounded
//! concurrency (`Config::upload_concurrency`); the manifest build and commit
//! are a barrier after every chunk succeeds.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use haven_crypto::aead::{AeadKey, Nonce, NoncePrefix};
use haven_crypto::hash::HashAlgorithm;
use haven_crypto::keyring::Keyring;
use haven_crypto::manifest::{
    self, CompressionDescriptor, ManifestBody, ManifestChunk, SignedManifest,
};
use haven_crypto::share::{CekWrapper, SelfWrapper};
use haven_crypto::workers::{Job, JobOutput, WorkerPool};

use crate::chunk::{self, all_chunk_ranges};
use crate::config::Config;
use crate::error::{Result, TransferError};
use crate::wire::{
    EncryptionRecordWire, ManifestChunkWire, ManifestWire, ObjectStore, PresignedPut, ServerApi,
    SignatureWire, UploadCommitRequest, UploadInitRequest,
};

/// A source of plaintext bytes the upload engine reads chunk ranges from.
/// Implemented by callers over whatever storage their plaintext actually
/// lives in (a file, a buffer, a database blob).
#[async_trait::async_trait]
pub trait PlaintextSource: Send + Sync {
    async fn size(&self) -> Result<u64>;
    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>>;
}

/// An in-memory plaintext source, mainly useful for tests and small files.
pub struct InMemorySource(pub Vec<u8>);

#[async_trait::async_trait]
impl PlaintextSource for InMemorySource {
    async fn size(&self) -> Result<u64> {
        Ok(self.0.len() as u64)
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        Ok(self.0[start as usize..end as usize].to_vec())
    }
}

/// Receives progress updates during a transfer, throttled to at most one
/// call per `Config::progress_min_interval`.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: TransferProgress);

    /// Reports a download state-machine transition (§4.7:
    /// `Initializing → Downloading → Assembling → Verifying → Complete`,
    /// with `Cancelled`/`Failed` reachable from any non-terminal state).
    /// Uploads have no state machine of their own, so the default is a
    /// no-op; [`crate::download::DownloadEngine`] is the only caller.
    fn on_state_change(&self, _state: crate::download::DownloadState) {}
}

#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    pub bytes_done: u64,
    pub total_bytes: u64,
    pub chunks_done: u32,
    pub chunk_count: u32,
}

/// A [`ProgressSink`] that does nothing, for callers that don't care.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _progress: TransferProgress) {}
}

struct ProgressThrottle {
    sink: Arc<dyn ProgressSink>,
    min_interval: Duration,
    last_emitted: Mutex<Option<Instant>>,
}

impl ProgressThrottle {
    fn new(sink: Arc<dyn ProgressSink>, min_interval: Duration) -> Self {
        Self {
            sink,
            min_interval,
            last_emitted: Mutex::new(None),
        }
    }

    fn report(&self, progress: TransferProgress) {
        let mut last = self.last_emitted.lock().unwrap();
        let now = Instant::now();
        let due = last.map(|t| now.duration_since(t) >= self.min_interval).unwrap_or(true);
        let is_final = progress.chunks_done == progress.chunk_count;
        if due || is_final {
            *last = Some(now);
            drop(last);
            self.sink.on_progress(progress);
        }
    }
}

/// Options for one upload, distinct from the engine-wide [`Config`].
pub struct UploadOptions {
    pub filename: String,
    pub mimetype: String,
    pub parent_folder_id: Option<String>,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            filename: String::new(),
            mimetype: "application/octet-stream".to_string(),
            parent_folder_id: None,
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }
}

/// Runs upload transfers against a server API and object store.
pub struct UploadEngine {
    server: Arc<dyn ServerApi>,
    store: Arc<dyn ObjectStore>,
    workers: Arc<WorkerPool>,
    keyring: Arc<Keyring>,
    config: Config,
}

impl UploadEngine {
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

    /// Uploads `source` end to end: chunk, compress, encrypt, PUT, then
    /// build, sign, and commit the manifest. Returns the server-assigned
    /// file id on success.
    #[tracing::instrument(skip(self, source, options))]
    pub async fn upload(
        &self,
        source: &dyn PlaintextSource,
        options: UploadOptions,
    ) -> Result<String> {
        let total_size = source.size().await?;
        let chunk_count = chunk::chunk_count(total_size, self.config.chunk_size);
        let ranges = all_chunk_ranges(total_size, self.config.chunk_size);

        let init = self
            .server
            .upload_init(UploadInitRequest {
                projected_chunk_count: chunk_count,
                content_type: options.mimetype.clone(),
                parent_folder_id: options.parent_folder_id.clone(),
            })
            .await?;
        let put_urls: HashMap<u32, PresignedPut> = init
            .presigned
            .into_iter()
            .map(|p| (p.chunk_index, p))
            .collect();

        let cek = AeadKey::generate();
        let nonce_prefix = NoncePrefix::generate();
        let throttle = Arc::new(ProgressThrottle::new(
            options.progress.clone(),
            self.config.progress_min_interval,
        ));

        let chunk_jobs = stream::iter(ranges.into_iter().enumerate().map(|(idx, range)| {
            let index = idx as u32;
            let put_url = put_urls
                .get(&index)
                .cloned()
                .ok_or_else(|| TransferError::Internal(format!("missing presigned PUT for chunk {index}")));
            (index, range, put_url)
        }))
        .map(|(index, (start, end), put_url)| {
            let cek = cek.clone();
            let nonce_prefix = nonce_prefix.clone();
            let throttle = throttle.clone();
            let cancel = options.cancel.clone();
            let mimetype = options.mimetype.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(TransferError::Cancelled);
                }
                let put_url = put_url?;
                let record = self
                    .upload_one_chunk(
                        index,
                        start,
                        end,
                        source,
                        &cek,
                        &nonce_prefix,
                        &mimetype,
                        &put_url.put_url,
                    )
                    .await?;
                throttle.report(TransferProgress {
                    bytes_done: end,
                    total_bytes: total_size,
                    chunks_done: index + 1,
                    chunk_count,
                });
                Ok(record)
            }
        })
        .buffer_unordered(self.config.upload_concurrency);

        let mut chunk_results: Vec<ManifestChunk> = Vec::new();
        let mut by_index: HashMap<u32, ManifestChunk> = HashMap::new();
        let mut pinned = Box::pin(chunk_jobs);
        while let Some(result) = pinned.next().await {
            let record = result?;
            by_index.insert(record.index, record);
        }
        for index in 0..chunk_count {
            let record = by_index
                .remove(&index)
                .ok_or_else(|| TransferError::Internal(format!("chunk {index} never completed")))?;
            chunk_results.push(record);
        }

        if options.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let whole_plaintext = source.read_range(0, total_size).await?;
        let algorithm = HashAlgorithm::Sha256;
        let whole_file_hash = match self
            .workers
            .submit(Job::HashWhole {
                algorithm,
                data: whole_plaintext,
            })
            .await?
        {
            JobOutput::Hex(hex) => hex,
            JobOutput::Bytes(_) => unreachable!("HashWhole always yields JobOutput::Hex"),
        };

        let (ciphertext_filename, filename_nonce) =
            haven_crypto::keyring::encrypt_name(&self.keyring, options.filename.as_bytes())
                .await?;

        let created_at_unix = chrono::Utc::now().timestamp();
        let body = ManifestBody {
            file_id: String::new(),
            ciphertext_filename: haven_crypto::codec::base64_encode(&ciphertext_filename),
            filename_salt: haven_crypto::codec::base64_encode(filename_nonce.as_bytes()),
            mimetype: options.mimetype.clone(),
            total_size,
            whole_file_hash,
            chunks: chunk_results,
            created_at_unix,
            algorithm_version: manifest::ALGORITHM_VERSION.to_string(),
        };

        let (ed_key, mldsa_pk, mldsa_sk) = self.keyring.signing_keys().await?;
        let signed = manifest::sign(body, &ed_key, &mldsa_pk, &mldsa_sk)?;

        let owner_key_id = "owner".to_string();
        let owner_public = self.keyring.own_kem_public_key().await?;
        let wrapper = SelfWrapper {
            owner_key_id: owner_key_id.clone(),
            owner_public,
        };
        let wrapping_record = wrapper.wrap(&cek, &owner_key_id).await?;

        let commit = self
            .server
            .upload_commit(build_commit_request(&signed, wrapping_record))
            .await?;
        Ok(commit.file_id)
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_one_chunk(
        &self,
        index: u32,
        start: u64,
        end: u64,
        source: &dyn PlaintextSource,
        cek: &AeadKey,
        nonce_prefix: &NoncePrefix,
        mimetype: &str,
        put_url: &str,
    ) -> Result<ManifestChunk> {
        let plaintext = source.read_range(start, end).await?;
        let content_hash = haven_crypto::hash::blake3_chunk_hash(&plaintext);
        let original_size = plaintext.len() as u64;

        let algorithm = chunk::choose_algorithm(self.config.compression_policy, mimetype, plaintext.len());
        let for_encryption = if algorithm == haven_crypto::manifest::CompressionAlgorithm::None {
            plaintext
        } else {
            match self
                .workers
                .submit(Job::Compress {
                    algorithm,
                    plaintext,
                })
                .await?
            {
                JobOutput::Bytes(b) => b,
                JobOutput::Hex(_) => unreachable!("Compress always yields JobOutput::Bytes"),
            }
        };
        let compressed_size = for_encryption.len() as u64;

        let nonce = Nonce::for_chunk(nonce_prefix, index);
        let ciphertext = match self
            .workers
            .submit(Job::EncryptChunk {
                key: cek.clone(),
                nonce,
                plaintext: for_encryption,
            })
            .await?
        {
            JobOutput::Bytes(b) => b,
            JobOutput::Hex(_) => unreachable!("EncryptChunk always yields JobOutput::Bytes"),
        };

        retry_with_backoff(self.config.retry_max, || {
            self.store.put(put_url, ciphertext.clone())
        })
        .await?;

        Ok(ManifestChunk {
            index,
            size: original_size,
            content_hash,
            nonce: haven_crypto::codec::base64_encode(nonce.as_bytes()),
            compression: CompressionDescriptor {
                algorithm,
                original_size,
                compressed_size,
            },
        })
    }
}

fn build_commit_request(
    signed: &SignedManifest,
    wrapping_record: haven_crypto::share::WrappingRecord,
) -> UploadCommitRequest {
    let chunks = signed
        .body
        .chunks
        .iter()
        .map(|c| ManifestChunkWire {
            index: c.index,
            size: c.size,
            sha256: c.content_hash.clone(),
            nonce: c.nonce.clone(),
            compression: c.compression.algorithm.as_str().to_string(),
            original_size: c.compression.original_size,
            compressed_size: c.compression.compressed_size,
        })
        .collect();

    let manifest = ManifestWire {
        file_id: signed.body.file_id.clone(),
        original_filename: signed.body.ciphertext_filename.clone(),
        filename_salt: signed.body.filename_salt.clone(),
        mimetype: signed.body.mimetype.clone(),
        size: signed.body.total_size,
        whole_file_hash: signed.body.whole_file_hash.clone(),
        algorithm_version: signed.body.algorithm_version.clone(),
        created_at: signed.body.created_at_unix,
        chunks,
    };

    let signatures = vec![
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
    ];

    let recipients = vec![EncryptionRecordWire {
        recipient_key_id: wrapping_record.recipient_key_id,
        kyber_ciphertext: haven_crypto::codec::hex_encode(&wrapping_record.kem_ciphertext),
        wrapped_cek: haven_crypto::codec::base64_encode(&wrapping_record.wrapped_cek),
        nonce_wrap_kyber: haven_crypto::codec::base64_encode(wrapping_record.nonce.as_bytes()),
    }];

    UploadCommitRequest {
        manifest,
        signatures,
        recipients,
    }
}

/// Retries `f` while its error is transient, up to `max_attempts` extra
/// tries, backing off `100ms * 2^attempt` (capped) between tries. A
/// non-transient error (any 4xx other than 408/429) is returned immediately.
async fn retry_with_backoff<F, Fut>(max_attempts: u32, mut f: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_attempts && e.is_transient() => {
                attempt += 1;
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt.min(6)));
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{
        CreateShareRequest, DownloadInfoResponse, MeResponse, ShareResponse, UploadCommitResponse,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockServer {
        chunk_count: u32,
    }

    #[async_trait::async_trait]
    impl ServerApi for MockServer {
        async fn upload_init(&self, req: UploadInitRequest) -> Result<crate::wire::UploadInitResponse> {
            let presigned = (0..req.projected_chunk_count)
                .map(|i| PresignedPut {
                    chunk_index: i,
                    put_url: format!("https://store.example/put/{i}"),
                    object_key: format!("obj-{i}"),
                })
                .collect();
            Ok(crate::wire::UploadInitResponse {
                projected_chunk_count: req.projected_chunk_count,
                presigned,
            })
        }

        async fn upload_commit(&self, _req: UploadCommitRequest) -> Result<UploadCommitResponse> {
            Ok(UploadCommitResponse {
                file_id: "file-abc".to_string(),
            })
        }

        async fn download_info(&self, _file_id: &str) -> Result<DownloadInfoResponse> {
            unimplemented!("not exercised by upload tests")
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

    #[allow(dead_code)]
    struct MockStore {
        puts: std::sync::Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for MockStore {
        async fn put(&self, url: &str, body: Vec<u8>) -> Result<()> {
            self.puts.lock().unwrap().insert(url.to_string(), body);
            Ok(())
        }

        async fn get(&self, url: &str) -> Result<(Vec<u8>, Option<u64>)> {
            let body = self.puts.lock().unwrap().get(url).cloned().unwrap_or_default();
            let len = body.len() as u64;
            Ok((body, Some(len)))
        }
    }

    async fn fresh_keyring() -> Arc<Keyring> {
        let keyring = Keyring::new();
        let kem_kp = haven_crypto::kem::generate_keypair();
        let ed = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let (mldsa_pk, mldsa_sk) = pqcrypto_mldsa::mldsa65::keypair();
        keyring
            .unlock(haven_crypto::keyring::UnlockedIdentity {
                kem_public: kem_kp.public,
                kem_secret: kem_kp.secret,
                ed25519_signing_key: ed,
                mldsa_public: mldsa_pk,
                mldsa_secret: mldsa_sk,
            })
            .await
            .unwrap();
        keyring
    }

    #[tokio::test]
    async fn uploads_small_file_and_commits() {
        let keyring = fresh_keyring().await;
        let store = Arc::new(MockStore {
            puts: std::sync::Mutex::new(HashMap::new()),
        });
        let server = Arc::new(MockServer { chunk_count: 1 });
        let workers = Arc::new(WorkerPool::new(2));
        let config = Config::new("https://api.example.com").with_chunk_size(1024);
        let engine = UploadEngine::new(server, store, workers, keyring, config);

        let source = InMemorySource(b"hello, this is a small test file".to_vec());
        let progress_calls = Arc::new(AtomicU32::new(0));
        struct CountingProgress(Arc<AtomicU32>);
        impl ProgressSink for CountingProgress {
            fn on_progress(&self, _progress: TransferProgress) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let options = UploadOptions {
            filename: "test.txt".to_string(),
            progress: Arc::new(CountingProgress(progress_calls.clone())),
            ..Default::default()
        };

        let file_id = engine.upload(&source, options).await.unwrap();
        assert_eq!(file_id, "file-abc");
        assert!(progress_calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn cancellation_before_start_short_circuits() {
        let keyring = fresh_keyring().await;
        let store = Arc::new(MockStore {
            puts: std::sync::Mutex::new(HashMap::new()),
        });
        let server = Arc::new(MockServer { chunk_count: 1 });
        let workers = Arc::new(WorkerPool::new(2));
        let config = Config::new("https://api.example.com").with_chunk_size(1024);
        let engine = UploadEngine::new(server, store, workers, keyring, config);

        let source = InMemorySource(vec![0u8; 4096]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = UploadOptions {
            filename: "test.bin".to_string(),
            cancel,
            ..Default::default()
        };

        let result = engine.upload(&source, options).await;
        assert!(matches!(result, Err(TransferError::Cancelled)));
    }
}
