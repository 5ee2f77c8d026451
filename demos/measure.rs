/*
cargo run --example measure input.wav

RUST_LOG=lufs_meter=debug shows the meter's state changes.
*/
use lufs_meter::{measure, PcmSource, WavSource};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let input_path = std::env::args()
        .nth(1)
        .expect("Please specify input wav path");

    let mut source = WavSource::open(&input_path).expect("Failed to open WAV file");
    println!(
        "{}: {} Hz, {} channels",
        input_path,
        source.rate(),
        source.channels()
    );

    let mut last_percent = None;
    let loudness = measure(&mut source, |progress| {
        let percent = (progress.fraction * 100.0) as u32;
        if last_percent != Some(percent / 10) {
            last_percent = Some(percent / 10);
            eprintln!("{:3}% {:.1} LUFS", percent, progress.loudness);
        }
    })
    .expect("Failed to measure loudness");

    if loudness == f64::NEG_INFINITY {
        println!("Integrated loudness: silent");
    } else {
        println!("Integrated loudness: {:.1} LUFS", loudness);
    }
}
