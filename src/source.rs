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

//! Sources of PCM audio and a driver measuring them.
//!
//! A [`PcmSource`](trait.PcmSource.html) delivers planar buffers of a fixed rate and channel
//! count until it runs dry. [`measure`](fn.measure.html) feeds such a source through a
//! [`LufsMeter`](../struct.LufsMeter.html) and returns the integrated loudness.

use smallvec::SmallVec;
use tracing::debug;

use crate::error::Error;
use crate::meter::{LufsMeter, Progress};

/// One chunk of planar audio, one `Vec` per channel, all of the same length.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanarBuffer {
    F32(Vec<Vec<f32>>),
    F64(Vec<Vec<f64>>),
}

impl PlanarBuffer {
    /// Number of channels.
    pub fn channels(&self) -> usize {
        match self {
            PlanarBuffer::F32(data) => data.len(),
            PlanarBuffer::F64(data) => data.len(),
        }
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        match self {
            PlanarBuffer::F32(data) => data.first().map(Vec::len).unwrap_or(0),
            PlanarBuffer::F64(data) => data.first().map(Vec::len).unwrap_or(0),
        }
    }

    /// Add this buffer to the running session of `meter`.
    pub fn process<F: FnMut(Progress)>(
        &self,
        meter: &mut LufsMeter,
        progress: F,
    ) -> Result<(), Error> {
        match self {
            PlanarBuffer::F32(data) => {
                let planes = data.iter().map(|c| &c[..]).collect::<SmallVec<[_; 8]>>();
                meter.process_buffer_with_progress(&planes[..], progress)
            }
            PlanarBuffer::F64(data) => {
                let planes = data.iter().map(|c| &c[..]).collect::<SmallVec<[_; 8]>>();
                meter.process_buffer_with_progress(&planes[..], progress)
            }
        }
    }
}

/// A stream of PCM audio with a fixed sample rate and channel count.
pub trait PcmSource {
    type Error: std::error::Error + 'static;

    /// Sample rate in Hz.
    fn rate(&self) -> u32;

    /// Number of channels of every buffer.
    fn channels(&self) -> u32;

    /// Total number of frames, if known up front.
    fn total_frames(&self) -> Option<u64>;

    /// Next buffer of audio, `None` once the source is exhausted.
    fn next_buffer(&mut self) -> Result<Option<PlanarBuffer>, Self::Error>;
}

/// Error returned by [`measure`](fn.measure.html).
#[derive(thiserror::Error, Debug)]
pub enum MeasureError<E: std::error::Error + 'static> {
    #[error("Loudness measurement failed: {0}")]
    Meter(#[from] Error),
    #[error("Reading audio failed: {0}")]
    Source(#[source] E),
}

/// Measure the integrated loudness of everything `source` delivers, in LUFS.
///
/// `progress` is called once per buffer, with the fraction of
/// [`PcmSource::total_frames`](trait.PcmSource.html#tymethod.total_frames) consumed so far.
pub fn measure<S: PcmSource, F: FnMut(Progress)>(
    source: &mut S,
    mut progress: F,
) -> Result<f64, MeasureError<S::Error>> {
    let mut meter = LufsMeter::with_params(source.rate(), source.channels())?;
    meter.set_expected_frames(source.total_frames());
    meter.start_integrated()?;

    while let Some(buffer) = source.next_buffer().map_err(MeasureError::Source)? {
        buffer.process(&mut meter, &mut progress)?;
    }

    meter.stop_integrated()?;
    let loudness = meter.integrated_loudness()?;

    debug!(
        frames = meter.frames_processed(),
        loudness, "Measured source"
    );

    Ok(loudness)
}

/// Planar `f32` audio held in memory, handed out in chunks.
#[derive(Debug, Clone)]
pub struct MemorySource {
    rate: u32,
    data: Vec<Vec<f32>>,
    chunk_frames: usize,
    position: usize,
}

impl MemorySource {
    /// Wrap planar data, one `Vec` per channel.
    pub fn new(rate: u32, data: Vec<Vec<f32>>, chunk_frames: usize) -> Result<Self, Error> {
        let frames = data.first().map(Vec::len).unwrap_or(0);
        if data.iter().any(|c| c.len() != frames) {
            return Err(Error::MismatchedChannelLengths);
        }

        Ok(MemorySource {
            rate,
            data,
            chunk_frames: std::cmp::max(chunk_frames, 1),
            position: 0,
        })
    }

    /// Deinterleave `data` into a new source.
    pub fn from_interleaved(
        rate: u32,
        channels: u32,
        data: &[f32],
        chunk_frames: usize,
    ) -> Result<Self, Error> {
        if channels == 0 {
            return Err(Error::InvalidChannelCount(0));
        }
        if data.len() % channels as usize != 0 {
            return Err(Error::IncompleteFrame {
                len: data.len(),
                channels,
            });
        }

        let channels = channels as usize;
        let planar = (0..channels)
            .map(|c| data.iter().skip(c).step_by(channels).copied().collect())
            .collect();

        Self::new(rate, planar, chunk_frames)
    }

    fn frames(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }
}

impl PcmSource for MemorySource {
    type Error = std::convert::Infallible;

    fn rate(&self) -> u32 {
        self.rate
    }

    fn channels(&self) -> u32 {
        self.data.len() as u32
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.frames() as u64)
    }

    fn next_buffer(&mut self) -> Result<Option<PlanarBuffer>, Self::Error> {
        if self.position >= self.frames() {
            return Ok(None);
        }

        let end = std::cmp::min(self.position + self.chunk_frames, self.frames());
        let buffer = self
            .data
            .iter()
            .map(|c| c[self.position..end].to_vec())
            .collect();
        self.position = end;

        Ok(Some(PlanarBuffer::F32(buffer)))
    }
}

#[cfg(feature = "wav")]
pub use self::wav::WavSource;

#[cfg(feature = "wav")]
mod wav {
    use std::fs::File;
    use std::io::{BufReader, Read};
    use std::path::Path;

    use tracing::debug;

    use super::{PcmSource, PlanarBuffer};

    /// Frames per buffer handed out by [`WavSource`](struct.WavSource.html).
    const CHUNK_FRAMES: usize = 4096;

    /// Streams a RIFF/WAVE file as planar `f64` buffers.
    ///
    /// Integer PCM of any bit depth up to 32 bits and 32 bit float are supported. Integer
    /// samples are scaled to full scale `[-1.0, 1.0)`.
    pub struct WavSource<R: Read> {
        reader: hound::WavReader<R>,
        spec: hound::WavSpec,
        remaining: u64,
    }

    impl WavSource<BufReader<File>> {
        /// Open the WAV file at `path`.
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, hound::Error> {
            Self::new(hound::WavReader::open(path)?)
        }
    }

    impl<R: Read> WavSource<R> {
        /// Wrap an already opened reader.
        pub fn new(reader: hound::WavReader<R>) -> Result<Self, hound::Error> {
            let spec = reader.spec();

            match (spec.sample_format, spec.bits_per_sample) {
                (hound::SampleFormat::Int, 1..=32) | (hound::SampleFormat::Float, 32) => (),
                _ => return Err(hound::Error::Unsupported),
            }
            if spec.channels == 0 {
                return Err(hound::Error::FormatError("no channels"));
            }

            debug!(
                rate = spec.sample_rate,
                channels = spec.channels,
                bits = spec.bits_per_sample,
                frames = reader.duration(),
                "Opened WAV source"
            );

            Ok(WavSource {
                remaining: reader.duration() as u64,
                reader,
                spec,
            })
        }

        fn deinterleave<T, I: Iterator<Item = Result<T, hound::Error>>>(
            samples: I,
            channels: usize,
            frames: usize,
            convert: impl Fn(T) -> f64,
        ) -> Result<Vec<Vec<f64>>, hound::Error> {
            let mut planes = vec![Vec::with_capacity(frames); channels];

            for (i, sample) in samples.take(frames * channels).enumerate() {
                planes[i % channels].push(convert(sample?));
            }

            // Truncated file
            let frames = planes[channels - 1].len();
            for plane in &mut planes {
                plane.truncate(frames);
            }

            Ok(planes)
        }
    }

    impl<R: Read> PcmSource for WavSource<R> {
        type Error = hound::Error;

        fn rate(&self) -> u32 {
            self.spec.sample_rate
        }

        fn channels(&self) -> u32 {
            self.spec.channels as u32
        }

        fn total_frames(&self) -> Option<u64> {
            Some(self.reader.duration() as u64)
        }

        fn next_buffer(&mut self) -> Result<Option<PlanarBuffer>, Self::Error> {
            if self.remaining == 0 {
                return Ok(None);
            }

            let channels = self.spec.channels as usize;
            let frames = std::cmp::min(self.remaining, CHUNK_FRAMES as u64) as usize;

            let planes = match self.spec.sample_format {
                hound::SampleFormat::Float => Self::deinterleave(
                    self.reader.samples::<f32>(),
                    channels,
                    frames,
                    |v| v as f64,
                )?,
                hound::SampleFormat::Int => {
                    let scale = 1.0 / (1u64 << (self.spec.bits_per_sample - 1)) as f64;
                    Self::deinterleave(
                        self.reader.samples::<i32>(),
                        channels,
                        frames,
                        |v| v as f64 * scale,
                    )?
                }
            };

            let read = planes.first().map(Vec::len).unwrap_or(0);
            if read == 0 {
                self.remaining = 0;
                return Ok(None);
            }
            self.remaining -= read as u64;

            Ok(Some(PlanarBuffer::F64(planes)))
        }
    }
}
