//! Benchmarks for haven-crypto

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use haven_crypto::aead::{self, AeadKey, Nonce, NoncePrefix};
use haven_crypto::hash::{self, HashAlgorithm};
use haven_crypto::kem;

fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing");

    for size in [1024, 64 * 1024, 1024 * 1024].iter() {
        let data = vec![0u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("blake3-chunk-hash", size), &data, |b, data| {
            b.iter(|| hash::blake3_chunk_hash(data))
        });

        group.bench_with_input(BenchmarkId::new("sha256-whole-file", size), &data, |b, data| {
            b.iter(|| hash::FileHash::compute(HashAlgorithm::Sha256, data))
        });
    }

    group.finish();
}

fn bench_aead(c: &mut Criterion) {
    let mut group = c.benchmark_group("aead");
    let key = AeadKey::generate();
    let prefix = NoncePrefix::generate();

    for size in [1024, 64 * 1024, 4 * 1024 * 1024].iter() {
        let data = vec![0u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));

        let nonce = Nonce::for_chunk(&prefix, 0);
        group.bench_with_input(
            BenchmarkId::new("xchacha20poly1305-encrypt", size),
            &data,
            |b, data| b.iter(|| aead::encrypt(&key, &nonce, data).unwrap()),
        );

        let ciphertext = aead::encrypt(&key, &nonce, &data).unwrap();
        group.bench_with_input(
            BenchmarkId::new("xchacha20poly1305-decrypt", size),
            &ciphertext,
            |b, ciphertext| b.iter(|| aead::decrypt(&key, &nonce, ciphertext).unwrap()),
        );
    }

    group.finish();
}

fn bench_kem(c: &mut Criterion) {
    let mut group = c.benchmark_group("mlkem768");
    let keypair = kem::generate_keypair();

    group.bench_function("keygen", |b| b.iter(kem::generate_keypair));

    group.bench_function("encapsulate", |b| {
        b.iter(|| kem::encapsulate(&keypair.public))
    });

    let (ciphertext, _) = kem::encapsulate(&keypair.public);
    group.bench_function("decapsulate", |b| {
        b.iter(|| kem::decapsulate(&ciphertext, &keypair.secret).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_hashing, bench_aead, bench_kem);
criterion_main!(benches);
