//! Client and transfer engine configuration.
//!
//! `endpoint`/`access_token`/`request_timeout`/`user_agent` carry over
//! directly from `fula_client::Config`; the rest realize §6's enumerated
//! transfer configuration (chunk size, concurrency, retries, progress
//! throttling, compression policy). No CLI parsing and no environment
//! variable reads happen at this layer — an embedding application is free
//! to populate this struct from whatever source it likes.

use std::time::Duration;

/// Compression policy governing whether a chunk is compressed before
/// encryption (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionPolicy {
    /// Compress unless the content type or chunk size says not to bother.
    #[default]
    Auto,
    /// Always attempt compression.
    Always,
    /// Never compress.
    Never,
}

/// Configuration for the API client and the upload/download engines.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server API base URL.
    pub endpoint: String,
    /// Bearer token sent on every request to the server API (never to
    /// object-store presigned URLs — those carry their own authorization
    /// in the URL and must be sent without credentials, §6).
    pub access_token: Option<String>,
    /// Target plaintext size per chunk. Default 4 MiB.
    pub chunk_size: u64,
    /// Max concurrent chunk PUTs during upload.
    pub upload_concurrency: usize,
    /// Max concurrent chunk GETs during download (Stage A, §4.7).
    pub download_concurrency: usize,
    /// CPU worker pool size. `None` means auto-detect, clamped to `[2, 8]`.
    pub worker_pool_size: Option<usize>,
    /// Max retry attempts for a transient PUT/GET failure.
    pub retry_max: u32,
    /// Minimum interval between progress-sink callbacks.
    pub progress_min_interval: Duration,
    /// Whether chunks are compressed before encryption.
    pub compression_policy: CompressionPolicy,
    /// Request timeout for the HTTP client.
    pub request_timeout: Duration,
    /// User agent string sent on every request.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            access_token: None,
            chunk_size: haven_crypto::DEFAULT_CHUNK_SIZE,
            upload_concurrency: 3,
            download_concurrency: 6,
            worker_pool_size: None,
            retry_max: 3,
            progress_min_interval: Duration::from_millis(100),
            compression_policy: CompressionPolicy::Auto,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("haven-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_upload_concurrency(mut self, n: usize) -> Self {
        self.upload_concurrency = n;
        self
    }

    pub fn with_download_concurrency(mut self, n: usize) -> Self {
        self.download_concurrency = n;
        self
    }

    pub fn with_compression_policy(mut self, policy: CompressionPolicy) -> Self {
        self.compression_policy = policy;
        self
    }

    pub fn with_retry_max(mut self, n: u32) -> Self {
        self.retry_max = n;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint
    }
}
