use std::sync::Arc;

use blob_store::{BlobConfig, BlobManager, MemoryKv, SEEK_SET};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const BLOB_LEN: usize = 256 * 1024;

fn manager() -> BlobManager<MemoryKv> {
    BlobManager::open(Arc::new(MemoryKv::new()), &BlobConfig::default()).unwrap()
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn write_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("blob_write");
    group.throughput(Throughput::Bytes(BLOB_LEN as u64));
    let data = payload(BLOB_LEN);

    group.bench_function("aligned", |b| {
        let blobs = manager();
        b.iter(|| blobs.write("bench", &data).unwrap())
    });

    group.bench_function("unaligned", |b| {
        let blobs = manager();
        blobs.write("bench", &data).unwrap();
        b.iter(|| {
            let mut writer = blobs.writer("bench");
            writer.seek(17, SEEK_SET).unwrap();
            writer.write(&data[..BLOB_LEN - 17]).unwrap()
        })
    });
    group.finish();
}

fn read_benchmark(c: &mut Criterion) {
    let blobs = manager();
    blobs.write("bench", &payload(BLOB_LEN)).unwrap();

    let mut group = c.benchmark_group("blob_read");
    for window in [100u64, 10 * 1024, 64 * 1024] {
        group.throughput(Throughput::Bytes(window));
        group.bench_with_input(BenchmarkId::new("range", window), &window, |b, window| {
            let mut reader = blobs.reader("bench");
            b.iter(|| {
                reader.seek(5000, SEEK_SET).unwrap();
                reader.read(Some(*window)).unwrap()
            })
        });
    }
    group.bench_function("size", |b| b.iter(|| blobs.size("bench").unwrap()));
    group.finish();
}

criterion_group!(benches, write_benchmark, read_benchmark);
criterion_main!(benches);
