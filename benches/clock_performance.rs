//! Performance benchmarks for the hot formatting and snapshot paths

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempo_hall::registry::Registry;
use tempo_hall::utils::{format_clock, normalize_piece_names};

fn bench_format_clock(c: &mut Criterion) {
    c.bench_function("format_clock", |b| {
        b.iter(|| {
            for ms in [0u64, 9_900, 65_000, 299_900, 600_000, 3_599_000] {
                black_box(format_clock(black_box(ms)));
            }
        })
    });
}

fn bench_normalize_piece_names(c: &mut Criterion) {
    let pieces: Vec<String> = (0..16)
        .map(|i| format!("Royal Guard {}", i))
        .collect();

    c.bench_function("normalize_piece_names_16", |b| {
        b.iter(|| black_box(normalize_piece_names(black_box(&pieces))))
    });
}

fn bench_registry_snapshot(c: &mut Criterion) {
    let mut registry = Registry::new();
    for i in 0..200 {
        registry.register(
            format!("conn-{}", i),
            format!("player-{}", i),
            "kingdom".to_string(),
            vec!["Rook".to_string(), "King".to_string(), "Pawn".to_string()],
            300_000,
        );
    }

    c.bench_function("registry_snapshot_200_users", |b| {
        b.iter(|| black_box(registry.snapshot()))
    });
}

criterion_group!(
    benches,
    bench_format_clock,
    bench_normalize_piece_names,
    bench_registry_snapshot
);
criterion_main!(benches);
