//! CPU worker pool (C9).
//!
//! The source dispatches CPU-bound work through a dynamic message-passing
//! pool with ad-hoc job shapes; here each job kind is a variant of a single
//! typed enum, and buffers move into and out of the worker by ownership
//! transfer (no job payload is ever cloned by the pool itself). Workers are
//! stateless between jobs: all key material needed for a job travels in the
//! job payload and is zeroed by the worker immediately after use.

use tokio::sync::{mpsc, oneshot};

use crate::aead::{AeadKey, Nonce};
use crate::error::Result;
use crate::hash::HashAlgorithm;

/// One unit of CPU-bound work. Each variant owns everything it needs; the
/// pool never reaches back into shared state to run a job.
pub enum Job {
    EncryptChunk {
        key: AeadKey,
        nonce: Nonce,
        plaintext: Vec<u8>,
    },
    DecryptChunk {
        key: AeadKey,
        nonce: Nonce,
        ciphertext: Vec<u8>,
    },
    Compress {
        algorithm: crate::manifest::CompressionAlgorithm,
        plaintext: Vec<u8>,
    },
    Decompress {
        algorithm: crate::manifest::CompressionAlgorithm,
        compressed: Vec<u8>,
        original_size: usize,
    },
    HashWhole {
        algorithm: HashAlgorithm,
        data: Vec<u8>,
    },
}

/// The buffer (or digest) a [`Job`] produces.
pub enum JobOutput {
    Bytes(Vec<u8>),
    Hex(String),
}

type JobEnvelope = (Job, oneshot::Sender<Result<JobOutput>>);

/// A small pool of CPU workers, sized to the logical core count and
/// clamped to `[2, 8]` per §4.9. Concurrency is bounded entirely by the
/// worker count and the bounded `mpsc` queue feeding them; there is no
/// separate semaphore to keep in sync with either.
pub struct WorkerPool {
    sender: mpsc::Sender<JobEnvelope>,
}

impl WorkerPool {
    /// Spawns the pool with the given worker count (already clamped by the
    /// caller; see [`clamp_worker_count`]).
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<JobEnvelope>(worker_count * 4);
        let receiver = std::sync::Arc::new(tokio::sync::Mutex::new(receiver));

        for _ in 0..worker_count {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                loop {
                    let envelope = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    match envelope {
                        Some((job, reply)) => {
                            let result = run_job(job);
                            let _ = reply.send(result);
                        }
                        None => break,
                    }
                }
            });
        }

        Self { sender }
    }

    /// Submits a job and awaits its result. Blocks the submitter (backing
    /// up the bounded channel) when every worker is busy and the queue is
    /// full, per §4.9's "submitters block" discipline.
    pub async fn submit(&self, job: Job) -> Result<JobOutput> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send((job, reply_tx))
            .await
            .map_err(|_| crate::error::CryptoError::Internal("worker pool is shut down".into()))?;
        reply_rx
            .await
            .map_err(|_| crate::error::CryptoError::Internal("worker dropped its reply".into()))?
    }
}

/// Clamps a requested worker count into `[2, 8]`, defaulting to the
/// logical core count when `requested` is `None`.
pub fn clamp_worker_count(requested: Option<usize>) -> usize {
    let n = requested.unwrap_or_else(|| std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4));
    n.clamp(2, 8)
}

fn run_job(job: Job) -> Result<JobOutput> {
    match job {
        Job::EncryptChunk {
            key,
            nonce,
            plaintext,
        } => crate::aead::encrypt(&key, &nonce, &plaintext).map(JobOutput::Bytes),
        Job::DecryptChunk {
            key,
            nonce,
            ciphertext,
        } => crate::aead::decrypt(&key, &nonce, &ciphertext).map(JobOutput::Bytes),
        Job::Compress {
            algorithm,
            plaintext,
        } => crate::compress::compress(algorithm, &plaintext).map(JobOutput::Bytes),
        Job::Decompress {
            algorithm,
            compressed,
            original_size,
        } => crate::compress::decompress(algorithm, &compressed, original_size)
            .map(JobOutput::Bytes),
        Job::HashWhole { algorithm, data } => {
            Ok(JobOutput::Hex(crate::hash::FileHash::compute(algorithm, &data).to_hex()))
        }
    }
    // Key material in `job` (the `AeadKey` above) is dropped here, zeroing
    // it via `AeadKey`'s `ZeroizeOnDrop` impl before this worker picks up
    // its next job.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::NoncePrefix;

    #[test]
    fn worker_count_is_clamped() {
        assert_eq!(clamp_worker_count(Some(1)), 2);
        assert_eq!(clamp_worker_count(Some(100)), 8);
        assert_eq!(clamp_worker_count(Some(4)), 4);
    }

    #[tokio::test]
    async fn submits_and_completes_jobs() {
        let pool = WorkerPool::new(2);
        let key = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let nonce = Nonce::for_chunk(&prefix, 0);
        let output = pool
            .submit(Job::EncryptChunk {
                key: key.clone(),
                nonce,
                plaintext: b"hello".to_vec(),
            })
            .await
            .unwrap();
        let JobOutput::Bytes(ciphertext) = output else {
            panic!("expected bytes");
        };
        let output = pool
            .submit(Job::DecryptChunk {
                key,
                nonce,
                ciphertext,
            })
            .await
            .unwrap();
        let JobOutput::Bytes(plaintext) = output else {
            panic!("expected bytes");
        };
        assert_eq!(plaintext, b"hello");
    }

    #[tokio::test]
    async fn handles_many_concurrent_jobs() {
        let pool = WorkerPool::new(4);
        let key = AeadKey::generate();
        let prefix = NoncePrefix::generate();
        let mut handles = Vec::new();
        for i in 0..32u32 {
            let pool_ref = &pool;
            let nonce = Nonce::for_chunk(&prefix, i);
            let key = key.clone();
            handles.push(async move {
                pool_ref
                    .submit(Job::EncryptChunk {
                        key,
                        nonce,
                        plaintext: format!("chunk-{i}").into_bytes(),
                    })
                    .await
            });
        }
        let results = futures::future::join_all(handles).await;
        assert!(results.into_iter().all(|r| r.is_ok()));
    }
}
