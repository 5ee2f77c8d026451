// Copyright (c) 2011 Jan Kokemüller
// Copyright (c) 2020 Sebastian Dröge <sebastian@centricular.com>
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//!  Streaming measurement of integrated loudness according to
//!  [ITU-R BS.1770](https://www.itu.int/rec/R-REC-BS.1770) and the
//!  [EBU R128 loudness standard](https://tech.ebu.ch/docs/r/r128.pdf).
//!
//!  Audio is K-weighted, cut into 400ms blocks overlapping by 75% and gated with an absolute
//!  threshold of -70 LUFS and a relative threshold 10 LU below the absolute-gated loudness. The
//!  result is a single loudness value in LUFS for a whole programme, which can be used to
//!  normalize volume during playback.
//!
//!  Features:
//!   * Streaming: audio can be fed in buffers of any size, the result does not depend on how the
//!     input was split
//!   * Planar and interleaved `i16`, `i32`, `f32` and `f64` samples
//!   * Supports all samplerates between 1 kHz and 400 kHz by recalculation of the filter
//!     coefficients
//!   * Channel weighting for surround layouts
//!   * Pooled loudness of several programmes, e.g. for album gain
//!   * Reading WAV files (feature `wav`, enabled by default)
//!
//!  ```
//!  use lufs_meter::LufsMeter;
//!
//!  # fn main() -> Result<(), lufs_meter::Error> {
//!  let mut meter = LufsMeter::with_params(48_000, 1)?;
//!  meter.start_integrated()?;
//!
//!  let step = 2.0 * std::f64::consts::PI * 997.0 / 48_000.0;
//!  let tone = (0..48_000 * 5)
//!      .map(|i| f64::sin(step * i as f64))
//!      .collect::<Vec<_>>();
//!  meter.process_buffer(&[&tone[..]])?;
//!
//!  meter.stop_integrated()?;
//!  let loudness = meter.integrated_loudness()?;
//!  assert!((loudness + 3.01).abs() < 0.1);
//!  # Ok(())
//!  # }
//!  ```

mod channel;
pub use self::channel::{default_channel_map, Channel};

mod error;
pub use self::error::{Error, Result};

mod meter;
pub use self::meter::{LufsMeter, Progress, State, MAX_CHANNELS, MAX_RATE, MIN_RATE};

mod source;
#[cfg(feature = "wav")]
pub use self::source::WavSource;
pub use self::source::{measure, MeasureError, MemorySource, PcmSource, PlanarBuffer};

mod utils;
#[cfg(feature = "internal-tests")]
pub use self::utils::{Interleaved, Planar, Samples};
pub use self::utils::{energy_to_loudness, loudness_to_energy, Sample};

#[cfg(feature = "internal-tests")]
pub mod filter;
#[cfg(not(feature = "internal-tests"))]
pub(crate) mod filter;

#[cfg(feature = "internal-tests")]
pub mod segmenter;
#[cfg(not(feature = "internal-tests"))]
pub(crate) mod segmenter;

#[cfg(feature = "internal-tests")]
pub mod gating;
#[cfg(not(feature = "internal-tests"))]
pub(crate) mod gating;

pub use self::segmenter::BlockEnergy;
