//! Codec throughput benchmarks.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use stackio_core::Stream;
use stackio_core::codec::aes::{AesKey, AesMode};
use stackio_core::codec::sha1::Sha1State;
use stackio_core::codec::zlib::ZlibParams;

fn bench_aes_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("aes_block");
    for key_len in [16usize, 24, 32] {
        let key_bytes: Vec<u8> = (0..key_len as u8).collect();
        let key = AesKey::new(&key_bytes).unwrap();
        group.bench_with_input(BenchmarkId::new("encrypt", key_len * 8), &key, |b, key| {
            let mut block = [0x5au8; 16];
            b.iter(|| {
                key.encrypt_block(&mut block);
                criterion::black_box(&block);
            });
        });
    }
    group.finish();
}

fn bench_aes_cbc_pipeline(c: &mut Criterion) {
    let key: Vec<u8> = (0..16u8).collect();
    let iv = [0u8; 16];
    let payload = vec![0xabu8; 64 * 1024];

    c.bench_function("aes_cbc_64k_pipeline", |b| {
        b.iter(|| {
            let sink = Stream::dynamic_buffer("wb").unwrap();
            let enc = Stream::aes_encrypt(&sink, &key, AesMode::Cbc, Some(iv), "wb").unwrap();
            enc.write_all(&payload).unwrap();
            enc.close().unwrap();
            criterion::black_box(sink.contents().unwrap());
        });
    });
}

fn bench_sha1(c: &mut Criterion) {
    let chunk = vec![0x42u8; 64 * 1024];
    c.bench_function("sha1_64k", |b| {
        b.iter(|| {
            let mut s = Sha1State::new();
            s.update(&chunk);
            criterion::black_box(s.finalize());
        });
    });
}

fn bench_hex_pipeline(c: &mut Criterion) {
    let payload = vec![0xcdu8; 16 * 1024];
    c.bench_function("hex_encode_16k", |b| {
        b.iter(|| {
            let sink = Stream::dynamic_buffer("wb").unwrap();
            let enc = Stream::hex_encode(&sink, "wb").unwrap();
            enc.write_all(&payload).unwrap();
            enc.close().unwrap();
            criterion::black_box(sink.contents().unwrap());
        });
    });
}

fn bench_deflate(c: &mut Criterion) {
    let payload = vec![0u8; 256 * 1024];
    c.bench_function("deflate_256k_zeros", |b| {
        b.iter(|| {
            let sink = Stream::dynamic_buffer("wb").unwrap();
            let z = Stream::zlib_deflate(&sink, ZlibParams::default(), "wb").unwrap();
            z.write_all(&payload).unwrap();
            z.close().unwrap();
            criterion::black_box(sink.contents().unwrap());
        });
    });
}

fn bench_growable_write(c: &mut Criterion) {
    let chunk = [0u8; 256];
    let mut group = c.benchmark_group("growable_write_64k");
    group.bench_function("minimal", |b| {
        b.iter(|| {
            let s = Stream::minimal_buffer("wb").unwrap();
            for _ in 0..256 {
                s.write_all(&chunk).unwrap();
            }
            criterion::black_box(s.contents().unwrap());
        });
    });
    group.bench_function("dynamic", |b| {
        b.iter(|| {
            let s = Stream::dynamic_buffer("wb").unwrap();
            for _ in 0..256 {
                s.write_all(&chunk).unwrap();
            }
            criterion::black_box(s.contents().unwrap());
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_aes_block,
    bench_aes_cbc_pipeline,
    bench_sha1,
    bench_hex_pipeline,
    bench_deflate,
    bench_growable_write
);
criterion_main!(benches);
