use lufs_meter::{energy_to_loudness, LufsMeter, PcmSource, PlanarBuffer, WavSource};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// ReplayGain 2.0 Reference Gain
///
/// See the [ReplayGain 2.0 specification][rg2spec] for details.
///
/// [rg2spec]: https://wiki.hydrogenaud.io/index.php?title=ReplayGain_2.0_specification#Reference_level
const REPLAYGAIN2_REFERENCE_LUFS: f64 = -18.0;

struct TrackData {
    pub loudness: f64,
    pub peak: f64,
    pub gating_block_count: u64,
    pub energy: f64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let input_path = std::env::args()
        .nth(1)
        .expect("Please specify input wav directory path");

    let mut album_peak: f64 = 0.0;
    let mut album_gating_block_count: u64 = 0;
    let mut album_energy: f64 = 0.0;

    for dir_entry in std::fs::read_dir(&input_path).expect("Failed to read directory path") {
        let dir_entry = dir_entry.expect("Failed to read dir entry");
        let metadata = dir_entry.metadata().expect("Failed to read metadata");
        if !metadata.is_file() {
            continue;
        }

        let track_data = analyze_file(&dir_entry.path());
        let track_gain = REPLAYGAIN2_REFERENCE_LUFS - track_data.loudness;
        let track_peak = track_data.peak;

        println!("TRACK_PATH={}", dir_entry.path().display());

        // ReplayGain 2.0 Track Gain, formatted according to "Table 3: Metadata keys and value
        // formatting" in the ["Metadata format" section in the ReplayGain 2.0 specification][rgmeta].
        //
        // [rgmeta]: https://wiki.hydrogenaud.io/index.php?title=ReplayGain_2.0_specification#Metadata_format
        println!("REPLAYGAIN_TRACK_GAIN={track_gain:.2} dB");
        println!("REPLAYGAIN_TRACK_PEAK={track_peak:.6}");
        println!();

        // Album peak is just the maximum peak on the album.
        album_peak = album_peak.max(track_peak);
        album_gating_block_count += track_data.gating_block_count;
        album_energy += track_data.energy;
    }

    let album_gain =
        REPLAYGAIN2_REFERENCE_LUFS - album_loudness(album_gating_block_count, album_energy);

    println!("REPLAYGAIN_ALBUM_GAIN={album_gain:.2} dB");
    println!("REPLAYGAIN_ALBUM_PEAK={album_peak:.6}");
    println!("REPLAYGAIN_REFERENCE_LOUDNESS={REPLAYGAIN2_REFERENCE_LUFS:.2} LUFS");
}

/// Loudness of the pooled gating blocks of all tracks.
fn album_loudness(gating_block_count: u64, energy: f64) -> f64 {
    // No track had a block above the gates, e.g. an empty directory or only silence
    if gating_block_count == 0 {
        return -f64::INFINITY;
    }

    energy_to_loudness(energy / gating_block_count as f64)
}

fn analyze_file(input_path: &Path) -> TrackData {
    let mut source = WavSource::open(input_path).expect("Failed to open WAV file");

    let mut meter = LufsMeter::with_params(source.rate(), source.channels())
        .expect("Failed to create loudness meter");
    meter.start_integrated().expect("Failed to start measurement");

    // Sample peak, not true peak
    let mut peak = 0.0f64;
    while let Some(buffer) = source.next_buffer().expect("Failed to read samples") {
        if let PlanarBuffer::F64(ref planes) = buffer {
            for plane in planes {
                peak = plane.iter().fold(peak, |peak, v| peak.max(v.abs()));
            }
        }

        buffer
            .process(&mut meter, |_| ())
            .expect("Failed to add frames");
    }

    meter.stop_integrated().expect("Failed to stop measurement");

    let loudness = meter
        .integrated_loudness()
        .expect("Failed to get integrated loudness");
    let (gating_block_count, energy) = meter
        .gating_block_count_and_energy()
        .expect("Failed to get gating block count and energy");

    TrackData {
        loudness,
        peak,
        gating_block_count,
        energy,
    }
}
