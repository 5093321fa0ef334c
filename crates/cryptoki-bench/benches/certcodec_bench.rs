use criterion::{criterion_group, criterion_main, Criterion};
use cryptoki_core::certcodec::compress::{pack, unpack, CompCert, IssueDate};

fn sample_cert() -> CompCert {
    CompCert {
        signature: vec![0x42u8; 64],
        issue: IssueDate { year: 2024, month: 6, day: 15, hour: 12 },
        expire_years: 10,
        signer_id: 7,
        template_id: 3,
        chain_id: 1,
        format_version: 0,
    }
}

fn bench_pack(c: &mut Criterion) {
    c.bench_function("certcodec_pack", |b| {
        b.iter(|| pack(sample_cert()).unwrap());
    });
}

fn bench_unpack(c: &mut Criterion) {
    let record = pack(sample_cert()).unwrap();
    c.bench_function("certcodec_unpack", |b| {
        b.iter(|| unpack(&record).unwrap());
    });
}

criterion_group!(benches, bench_pack, bench_unpack);
criterion_main!(benches);
