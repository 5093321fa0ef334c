use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use cryptoki_membrane::crypto;

fn bench_sha256(c: &mut Criterion) {
    let mut group = c.benchmark_group("sha256");
    for size in [64usize, 4096, 65536] {
        let data = vec![0x5Au8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| crypto::sha256(data));
        });
    }
    group.finish();
}

fn bench_hmac_sha256(c: &mut Criterion) {
    let key = [0x11u8; 32];
    let data = vec![0x22u8; 4096];
    c.bench_function("hmac_sha256_4096", |b| {
        b.iter(|| crypto::hmac_sha256(&key, &data));
    });
}

fn bench_aes128_cbc_encrypt(c: &mut Criterion) {
    let key = [0x33u8; 16];
    let iv = [0x44u8; 16];
    c.bench_function("aes128_cbc_encrypt_4096", |b| {
        b.iter_batched(
            || vec![0x55u8; 4096],
            |mut data| crypto::aes128_cbc_encrypt(&key, &iv, &mut data).unwrap(),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_aes128_gcm_encrypt(c: &mut Criterion) {
    let key = [0x66u8; 16];
    let iv = [0x77u8; 12];
    let aad = [0x88u8; 16];
    let data = vec![0x99u8; 4096];
    c.bench_function("aes128_gcm_encrypt_4096", |b| {
        b.iter(|| crypto::aes128_gcm_encrypt(&key, &iv, &aad, &data));
    });
}

criterion_group!(
    benches,
    bench_sha256,
    bench_hmac_sha256,
    bench_aes128_cbc_encrypt,
    bench_aes128_gcm_encrypt
);
criterion_main!(benches);
