use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lufs_meter::gating::{gated_loudness, gated_loudness_multiple};
use lufs_meter::loudness_to_energy;
use rand::Rng;

// One hour of blocks at 10 Hz
const BLOCKS: usize = 36_000;

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let energies = (0..BLOCKS)
        .map(|_| loudness_to_energy(rng.gen_range(-90.0, 0.0)))
        .collect::<Vec<_>>();

    let mut group = c.benchmark_group("gating: 1h");
    group.bench_function("single", |b| {
        b.iter(|| gated_loudness(black_box(&energies)))
    });

    let parts = energies.chunks(BLOCKS / 12).collect::<Vec<_>>();
    group.bench_function("12 programmes", |b| {
        b.iter(|| gated_loudness_multiple(black_box(&parts)))
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
