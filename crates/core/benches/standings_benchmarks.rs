use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use arena_core::parse_standings;

/// Raw standings text with `n` records and a handful of ties.
fn raw_standings(n: usize) -> String {
    (0..n)
        .map(|i| format!("0x{i:040x}, {}, {}", (i * 7919) % 1000, i % 50))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_parse_and_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_standings");
    for n in [100usize, 1_000, 10_000] {
        let raw = raw_standings(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &raw, |b, raw| {
            b.iter(|| parse_standings(black_box(raw)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse_and_rank);
criterion_main!(benches);
