//! External interfaces (§6): the server API and object-store ports the
//! transfer engines depend on, plus a `reqwest`-based implementation of
//! both.
//!
//! The JSON shapes here mirror §6 exactly: `upload/init` returns a batch of
//! presigned PUT URLs, `upload/commit` sends the signed manifest and
//! per-recipient wrapping records, and `files/{id}/download` returns one
//! bundle carrying metadata, presigned GET URLs, the manifest, both
//! signatures, and the encryption record. All binary fields are hex except
//! AEAD nonces, which are base64, per §6.
//!
//! The wire-facing `#[instrument(skip(self))]`/private-`request`-helper
//! shape is carried over from `fula_client::client::FulaClient`, retargeted
//! from XML to JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Result, TransferError};

/// One presigned PUT URL, paired with the chunk it's for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignedPut {
    pub chunk_index: u32,
    pub put_url: String,
    pub object_key: String,
}

/// One presigned GET URL, paired with the chunk it's for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignedGet {
    pub chunk_index: u32,
    pub get_url: String,
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadInitRequest {
    pub projected_chunk_count: u32,
    pub content_type: String,
    pub parent_folder_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadInitResponse {
    pub projected_chunk_count: u32,
    pub presigned: Vec<PresignedPut>,
}

/// One chunk's wire entry in the signed manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestChunkWire {
    pub index: u32,
    pub size: u64,
    /// Hex BLAKE3 content hash of the chunk's plaintext.
    pub sha256: String,
    /// Base64 24-byte AEAD nonce.
    pub nonce: String,
    pub compression: String,
    pub original_size: u64,
    pub compressed_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestWire {
    pub file_id: String,
    pub original_filename: String,
    pub filename_salt: String,
    pub mimetype: String,
    pub size: u64,
    pub whole_file_hash: String,
    pub algorithm_version: String,
    pub created_at: i64,
    pub chunks: Vec<ManifestChunkWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureWire {
    pub algorithm: String,
    pub public_key: String,
    pub signature: String,
}

/// The per-recipient CEK wrapping record, wire-shaped (hex KEM ciphertext,
/// base64 wrapped CEK and nonce — §6's field naming:
/// `wrappedCek`/`nonceWrapKyber`/`kyberCiphertext`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionRecordWire {
    pub recipient_key_id: String,
    pub kyber_ciphertext: String,
    pub wrapped_cek: String,
    pub nonce_wrap_kyber: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadCommitRequest {
    pub manifest: ManifestWire,
    pub signatures: Vec<SignatureWire>,
    pub recipients: Vec<EncryptionRecordWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadCommitResponse {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadInfoResponse {
    pub file_id: String,
    pub storage_key: String,
    pub original_filename: String,
    pub filename_salt: String,
    pub mimetype: String,
    pub size: u64,
    pub whole_file_hash: String,
    pub chunk_count: u32,
    pub chunks: Vec<ManifestChunkWire>,
    pub presigned: Vec<PresignedGet>,
    pub manifest: ManifestWire,
    pub signatures: Vec<SignatureWire>,
    pub encryption: EncryptionRecordWire,
}

/// Opaque to this crate: the user's encrypted keypairs, consumed by the
/// keyring's external unlocking collaborator (§1 Non-goals).
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse(pub serde_json::Value);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    Pending,
    Accepted,
    Declined,
    Removed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateShareRequest {
    pub item_id: String,
    pub item_type: String,
    pub recipient_key_id: String,
    pub wrapping_record: EncryptionRecordWire,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareResponse {
    pub share_id: String,
    pub item_id: String,
    pub item_type: String,
    pub status: ShareStatus,
    pub wrapping_record: EncryptionRecordWire,
    pub created_at: i64,
}

/// The server API port consumed by the upload/download/share flows (§6).
#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn upload_init(&self, req: UploadInitRequest) -> Result<UploadInitResponse>;
    async fn upload_commit(&self, req: UploadCommitRequest) -> Result<UploadCommitResponse>;
    async fn download_info(&self, file_id: &str) -> Result<DownloadInfoResponse>;
    async fn me(&self) -> Result<MeResponse>;
    async fn create_share(&self, req: CreateShareRequest) -> Result<ShareResponse>;
    async fn accept_share(&self, share_id: &str) -> Result<ShareResponse>;
    async fn decline_share(&self, share_id: &str) -> Result<ShareResponse>;
    async fn delete_share(&self, share_id: &str) -> Result<()>;
    async fn get_share(&self, share_id: &str) -> Result<ShareResponse>;
}

/// The object-store port: plain HTTPS PUT/GET against presigned URLs, sent
/// without credentials (§6). Returns the server-reported content length
/// alongside the body so the download engine's size reconciliation (§4.7)
/// can distinguish "store appended trailing bytes" from "store actually
/// sent a shorter object."
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<()>;
    async fn get(&self, url: &str) -> Result<(Vec<u8>, Option<u64>)>;
}

/// `reqwest`-backed implementation of [`ServerApi`].
pub struct HttpServerApi {
    http: reqwest::Client,
    config: Config,
}

impl HttpServerApi {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    #[tracing::instrument(skip(self, body))]
    async fn post_json<B: Serialize + std::fmt::Debug, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        handle_json_response(response).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_json<R: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<R> {
        let mut request = self.http.get(self.url(path));
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        handle_json_response(response).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        let mut request = self.http.delete(self.url(path));
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(TransferError::from_status(status, body))
        }
    }
}

async fn handle_json_response<R: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<R> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransferError::from_status(status.as_u16(), body));
    }
    response
        .json::<R>()
        .await
        .map_err(|e| TransferError::MalformedEncoding(e.to_string()))
}

#[async_trait]
impl ServerApi for HttpServerApi {
    async fn upload_init(&self, req: UploadInitRequest) -> Result<UploadInitResponse> {
        self.post_json("/upload/init", &req).await
    }

    async fn upload_commit(&self, req: UploadCommitRequest) -> Result<UploadCommitResponse> {
        self.post_json("/upload/commit", &req).await
    }

    async fn download_info(&self, file_id: &str) -> Result<DownloadInfoResponse> {
        self.get_json(&format!("/files/{file_id}/download")).await
    }

    async fn me(&self) -> Result<MeResponse> {
        self.get_json("/me").await
    }

    async fn create_share(&self, req: CreateShareRequest) -> Result<ShareResponse> {
        self.post_json("/shares", &req).await
    }

    async fn accept_share(&self, share_id: &str) -> Result<ShareResponse> {
        self.post_json(&format!("/shares/{share_id}/accept"), &())
            .await
    }

    async fn decline_share(&self, share_id: &str) -> Result<ShareResponse> {
        self.post_json(&format!("/shares/{share_id}/decline"), &())
            .await
    }

    async fn delete_share(&self, share_id: &str) -> Result<()> {
        self.delete(&format!("/shares/{share_id}")).await
    }

    async fn get_share(&self, share_id: &str) -> Result<ShareResponse> {
        self.get_json(&format!("/shares/{share_id}")).await
    }
}

/// `reqwest`-backed implementation of [`ObjectStore`], using a bare client
/// with no auth headers — presigned URLs authorize themselves (§6).
pub struct HttpObjectStore {
    http: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(request_timeout: std::time::Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[tracing::instrument(skip(self, body))]
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<()> {
        let response = self.http.put(url).body(body).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            Err(TransferError::from_status(status, text))
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<(Vec<u8>, Option<u64>)> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(TransferError::from_status(status, text));
        }
        let content_length = response.content_length();
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_length))
    }
}
