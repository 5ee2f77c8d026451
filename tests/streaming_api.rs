use float_eq::assert_float_eq;
use lufs_meter::{
    default_channel_map, energy_to_loudness, measure, Channel, Error, LufsMeter, MemorySource,
    Progress, State,
};

fn tone(rate: u32, freq: f64, amplitude: f64, seconds: f64) -> Vec<f32> {
    let step = 2.0 * std::f64::consts::PI * freq / rate as f64;
    (0..(rate as f64 * seconds) as usize)
        .map(|i| (amplitude * f64::sin(step * i as f64)) as f32)
        .collect()
}

#[test]
fn full_session() {
    let left = tone(44_100, 1_000.0, 0.25, 5.0);
    let right = tone(44_100, 1_000.0, 0.25, 5.0);

    let mut meter = LufsMeter::new();
    assert_eq!(meter.state(), State::Idle);

    meter.prepare(44_100, 2).unwrap();
    assert_eq!(meter.channel_map(), &default_channel_map(2)[..]);
    meter.set_expected_frames(Some(left.len() as u64));
    meter.start_integrated().unwrap();

    let mut last = None;
    for (l, r) in Iterator::zip(left.chunks(4_410), right.chunks(4_410)) {
        meter
            .process_buffer_with_progress(&[l, r], |p: Progress| last = Some(p))
            .unwrap();
    }
    meter.stop_integrated().unwrap();

    let loudness = meter.integrated_loudness().unwrap();
    // Two channels of -12 dBFS 1 kHz sine
    assert_float_eq!(loudness, 20.0 * f64::log10(0.25), abs <= 0.1);

    let last = last.unwrap();
    assert_eq!(last.loudness, loudness);
    assert_eq!(last.fraction, 1.0);
    assert_eq!(last.frames_processed, left.len() as u64);
    assert_eq!(meter.blocks().len(), 47);

    let (count, energy) = meter.gating_block_count_and_energy().unwrap();
    assert_float_eq!(
        energy_to_loudness(energy / count as f64),
        loudness,
        abs <= 1e-9
    );
}

#[test]
fn sample_formats_agree() {
    let data = tone(48_000, 440.0, 0.5, 2.0);

    let mut meter = LufsMeter::with_params(48_000, 1).unwrap();
    let mut measure_with = |f: &dyn Fn(&mut LufsMeter)| {
        meter.start_integrated().unwrap();
        f(&mut meter);
        meter.stop_integrated().unwrap();
        meter.integrated_loudness().unwrap()
    };

    let f32_loudness =
        measure_with(&|m: &mut LufsMeter| m.process_buffer(&[&data[..]]).unwrap());
    let f64_data = data.iter().map(|v| *v as f64).collect::<Vec<_>>();
    let f64_loudness =
        measure_with(&|m: &mut LufsMeter| m.process_buffer_interleaved(&f64_data).unwrap());
    let i16_data = data
        .iter()
        .map(|v| (*v * 32768.0) as i16)
        .collect::<Vec<_>>();
    let i16_loudness =
        measure_with(&|m: &mut LufsMeter| m.process_buffer(&[&i16_data[..]]).unwrap());
    let i32_data = data
        .iter()
        .map(|v| (*v as f64 * 2147483648.0) as i32)
        .collect::<Vec<_>>();
    let i32_loudness =
        measure_with(&|m: &mut LufsMeter| m.process_buffer_interleaved(&i32_data).unwrap());

    assert_eq!(f32_loudness, f64_loudness);
    assert_float_eq!(i16_loudness, f32_loudness, abs <= 0.001);
    assert_float_eq!(i32_loudness, f32_loudness, abs <= 1e-6);
}

#[test]
fn misuse_is_reported() {
    let mut meter = LufsMeter::new();
    let data = [0.0f32; 480];

    assert_eq!(
        meter.process_buffer(&[&data[..]]),
        Err(Error::InvalidStateTransition {
            operation: "process a buffer",
            state: State::Idle
        })
    );
    assert_eq!(
        meter.relative_threshold(),
        Err(Error::InvalidStateTransition {
            operation: "read the relative threshold",
            state: State::Idle
        })
    );

    meter.prepare(48_000, 1).unwrap();
    meter.start_integrated().unwrap();
    assert!(matches!(
        meter.start_integrated(),
        Err(Error::InvalidStateTransition { .. })
    ));
    assert_eq!(
        meter.set_channel_map(&[Channel::Center]),
        Err(Error::InvalidStateTransition {
            operation: "set the channel map",
            state: State::Integrating
        })
    );
    assert_eq!(
        meter.process_buffer(&[&data[..], &data[..]]),
        Err(Error::ChannelCountMismatch {
            expected: 1,
            actual: 2
        })
    );
    assert_eq!(meter.state(), State::Prepared);
}

#[test]
fn empty_buffers() {
    let mut meter = LufsMeter::with_params(48_000, 2).unwrap();
    meter.start_integrated().unwrap();

    let empty: [f32; 0] = [];
    let mut calls = 0;
    meter
        .process_buffer_with_progress(&[&empty[..], &empty[..]], |_| calls += 1)
        .unwrap();
    meter
        .process_buffer_interleaved_with_progress(&empty[..], |_| calls += 1)
        .unwrap();
    assert_eq!(calls, 2);
    assert_eq!(meter.frames_processed(), 0);

    meter.stop_integrated().unwrap();
    assert_eq!(meter.integrated_loudness().unwrap(), -std::f64::INFINITY);
}

#[test]
fn album_loudness() {
    let loud = tone(48_000, 440.0, 0.5, 3.0);
    let quiet = tone(48_000, 440.0, 0.05, 3.0);

    let mut meters = Vec::new();
    let mut counts = 0;
    let mut energies = 0.0;
    for data in [&loud, &quiet] {
        let mut meter = LufsMeter::with_params(48_000, 1).unwrap();
        meter.start_integrated().unwrap();
        meter.process_buffer(&[&data[..]]).unwrap();
        meter.stop_integrated().unwrap();

        let (count, energy) = meter.gating_block_count_and_energy().unwrap();
        counts += count;
        energies += energy;
        meters.push(meter);
    }

    // The quiet track is 20 LU below the loud one and gated away when pooled
    let album = LufsMeter::integrated_loudness_multiple(&meters).unwrap();
    assert_float_eq!(
        album,
        meters[0].integrated_loudness().unwrap(),
        abs <= 1e-9
    );

    // Pooling the per-track gated sums doesn't gate across tracks
    let pooled = energy_to_loudness(energies / counts as f64);
    assert!(pooled < album);
}

#[test]
fn meters_on_threads() {
    let handles = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let data = tone(48_000, 440.0, 0.1 * (i + 1) as f64, 2.0);
                let mut source = MemorySource::new(48_000, vec![data], 4_800).unwrap();
                measure(&mut source, |_| ()).unwrap()
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect::<Vec<_>>();

    for w in results.windows(2) {
        assert!(w[0] < w[1]);
    }
}
