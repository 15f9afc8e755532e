//! # Haven Client
//!
//! The transfer-engine half of the Haven encrypted storage client: chunking
//! and compression, the upload and download engines, and the `ServerApi`/
//! `ObjectStore` ports that connect them to a presigned-URL object store
//! (§6). The cryptographic core itself — AEAD, KEM, manifest signing, the
//! keyring, and the worker pool — lives in `haven-crypto`; this crate
//! depends on it and never reimplements it.
//!
//! ## Layout
//!
//! - [`config`] — `Config`, the engine-wide transfer configuration (chunk
//!   size, concurrency limits, retry budget, compression policy).
//! - [`chunk`] — chunk-boundary arithmetic (C4) and the compression policy.
//! - [`wire`] — the `ServerApi`/`ObjectStore` ports (§6) and a `reqwest`
//!   implementation of both.
//! - [`upload`] — the upload engine (C6): chunk, compress, encrypt, PUT,
//!   then build, sign, and commit the manifest.
//! - [`download`] — the download engine (C7): the fetch/decrypt/decompress
//!   pipeline with in-order emission and whole-file verification.
//! - [`error`] — `TransferError`, realizing §7's error kinds.

pub mod chunk;
pub mod config;
pub mod download;
pub mod error;
pub mod upload;
pub mod wire;

pub use config::{Config, CompressionPolicy};
pub use download::{DownloadEngine, DownloadOptions, DownloadResult, DownloadState, PauseController};
pub use error::{Result, TransferError};
pub use upload::{
    InMemorySource, NoopProgress, PlaintextSource, ProgressSink, TransferProgress, UploadEngine,
    UploadOptions,
};
pub use wire::{HttpObjectStore, HttpServerApi, ObjectStore, ServerApi};
