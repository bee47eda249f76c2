//! Benchmarks for listfile loading and namespace walks

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::fmt::Write;
use std::hint::black_box;
use wowvfs::NamespaceIndex;

const EXTENSIONS: [&str; 4] = ["m2", "blp", "wmo", "adt"];

/// Listfile with `count` entries spread over zones and model kinds
fn listfile(count: u32) -> String {
    let mut text = String::new();
    for id in 0..count {
        let zone = id % 97;
        let ext = EXTENSIONS[(id % 4) as usize];
        let _ = writeln!(text, "{id};World\\Zone{zone:02}\\Doodads\\Model_{id}.{ext}");
    }
    text
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("namespace_load");

    for count in [1_000u32, 50_000] {
        let text = listfile(count);
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            let mut index = NamespaceIndex::new();
            b.iter(|| {
                index.load_str(black_box(text));
                black_box(index.len())
            });
        });
    }

    group.finish();
}

fn bench_walk(c: &mut Criterion) {
    let mut index = NamespaceIndex::new();
    index.load_str(&listfile(50_000));

    let mut group = c.benchmark_group("namespace_walk");
    group.bench_function("directory_with_extension", |b| {
        b.iter(|| {
            index
                .iter_by_path_and_extension(black_box("world/zone42"), "wmo")
                .count()
        });
    });
    group.bench_function("extension", |b| {
        b.iter(|| index.iter_by_extension(black_box("blp")).count());
    });
    group.bench_function("id_lookup", |b| {
        b.iter(|| index.id_of(black_box("world/zone42/doodads/model_42.wmo")));
    });

    group.finish();
}

criterion_group!(benches, bench_load, bench_walk);
criterion_main!(benches);
