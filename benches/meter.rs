use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lufs_meter::LufsMeter;

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("meter create: 48kHz 2ch");

    group.bench_function("Rust", |b| {
        b.iter(|| {
            let meter = LufsMeter::with_params(black_box(48_000), black_box(2)).unwrap();
            drop(black_box(meter));
        })
    });

    group.finish();

    let mut data = vec![0i16; 48_000 * 5 * 2];
    let mut accumulator = 0.0;
    let step = 2.0 * std::f32::consts::PI * 440.0 / 48_000.0;
    for out in data.chunks_exact_mut(2) {
        let val = f32::sin(accumulator) * std::i16::MAX as f32;
        out[0] = val as i16;
        out[1] = val as i16;
        accumulator += step;
    }

    let mut group = c.benchmark_group("meter integrated: 48kHz 2ch i16 5s");

    for chunk_frames in &[480usize, 4_800, 48_000 * 5] {
        let mut meter = LufsMeter::with_params(48_000, 2).unwrap();
        group.bench_function(format!("{} frames per buffer", chunk_frames), |b| {
            b.iter(|| {
                meter.start_integrated().unwrap();
                for chunk in data.chunks(chunk_frames * 2) {
                    meter.process_buffer_interleaved(black_box(chunk)).unwrap();
                }
                meter.stop_integrated().unwrap();
                black_box(meter.integrated_loudness().unwrap());
            })
        });
    }

    let mut meter = LufsMeter::with_params(48_000, 2).unwrap();
    group.bench_function("with progress", |b| {
        b.iter(|| {
            meter.start_integrated().unwrap();
            for chunk in data.chunks(4_800 * 2) {
                meter
                    .process_buffer_interleaved_with_progress(black_box(chunk), |p| {
                        black_box(p);
                    })
                    .unwrap();
            }
            meter.stop_integrated().unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
