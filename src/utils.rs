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

use crate::error::Error;

/// Convert linear energy to logarithmic loudness.
///
/// `energy` is the channel-weighted mean square of K-weighted samples. Zero energy maps to
/// negative infinity.
pub fn energy_to_loudness(energy: f64) -> f64 {
    10.0 * f64::log10(energy) - 0.691
}

/// Convert logarithmic loudness back to linear energy.
pub fn loudness_to_energy(loudness: f64) -> f64 {
    f64::powf(10.0, (loudness + 0.691) / 10.0)
}

/// Trait for abstracting over interleaved and planar samples.
pub trait Samples<'a, S: Sample + 'a>: Sized {
    /// Call the given closure for each sample of the given channel.
    // FIXME: Workaround for TrustedLen / TrustedRandomAccess being unstable
    // and because of that we wouldn't get nice optimizations
    fn foreach_sample(&self, channel: usize, func: impl FnMut(&'a S));

    /// Number of frames.
    fn frames(&self) -> usize;

    /// Number of channels.
    fn channels(&self) -> usize;

    /// Split into two at the given frame.
    fn split_at(self, frame: usize) -> (Self, Self);

    /// Position `(channel, frame)` of the first NaN or infinite sample, if any.
    fn find_non_finite(&self) -> Option<(usize, usize)> {
        for channel in 0..self.channels() {
            let mut frame = 0;
            let mut found = None;
            self.foreach_sample(channel, |sample| {
                if found.is_none() && !sample.to_f64().is_finite() {
                    found = Some(frame);
                }
                frame += 1;
            });

            if let Some(frame) = found {
                return Some((channel, frame));
            }
        }

        None
    }
}

/// Struct representing interleaved samples.
pub struct Interleaved<'a, S> {
    /// Interleaved sample data.
    data: &'a [S],
    /// Number of channels.
    channels: usize,
}

impl<'a, S> Interleaved<'a, S> {
    /// Create a new wrapper around the interleaved channels and do a sanity check.
    pub fn new(data: &'a [S], channels: usize) -> Result<Self, Error> {
        if channels == 0 {
            return Err(Error::InvalidChannelCount(0));
        }

        if data.len() % channels != 0 {
            return Err(Error::IncompleteFrame {
                len: data.len(),
                channels: channels as u32,
            });
        }

        Ok(Interleaved { data, channels })
    }
}

impl<'a, S: Sample> Samples<'a, S> for Interleaved<'a, S> {
    #[inline]
    fn foreach_sample(&self, channel: usize, mut func: impl FnMut(&'a S)) {
        assert!(channel < self.channels);

        for v in self.data.chunks_exact(self.channels) {
            func(&v[channel])
        }
    }

    #[inline]
    fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    #[inline]
    fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    fn split_at(self, frame: usize) -> (Self, Self) {
        assert!(frame * self.channels <= self.data.len());

        let (fst, snd) = self.data.split_at(frame * self.channels);
        (
            Interleaved {
                data: fst,
                channels: self.channels,
            },
            Interleaved {
                data: snd,
                channels: self.channels,
            },
        )
    }
}

/// Struct representing planar samples, one slice per channel.
pub struct Planar<'a, S> {
    data: &'a [&'a [S]],
    start: usize,
    end: usize,
}

impl<'a, S> Planar<'a, S> {
    /// Create a new wrapper around the planar channels and do a sanity check.
    ///
    /// An empty channel list is accepted here and rejected by the meter's channel count check.
    pub fn new(data: &'a [&'a [S]]) -> Result<Self, Error> {
        let end = data.first().map(|d| d.len()).unwrap_or(0);

        if data.iter().any(|d| d.len() != end) {
            return Err(Error::MismatchedChannelLengths);
        }

        Ok(Planar {
            data,
            start: 0,
            end,
        })
    }
}

impl<'a, S: Sample> Samples<'a, S> for Planar<'a, S> {
    #[inline]
    fn foreach_sample(&self, channel: usize, mut func: impl FnMut(&'a S)) {
        assert!(channel < self.data.len());

        for v in &self.data[channel][self.start..self.end] {
            func(v)
        }
    }

    #[inline]
    fn frames(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    fn channels(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn split_at(self, frame: usize) -> (Self, Self) {
        assert!(self.start + frame <= self.end);

        (
            Planar {
                data: self.data,
                start: self.start,
                end: self.start + frame,
            },
            Planar {
                data: self.data,
                start: self.start + frame,
                end: self.end,
            },
        )
    }
}

/// Sample formats accepted by the meter.
///
/// Integer samples are scaled so that their full range maps to `[-1.0, 1.0]`.
pub trait Sample:
    dasp_sample::Sample + dasp_sample::Duplex<f32> + dasp_sample::Duplex<f64>
{
    /// Convert to a full-scale `f64` sample.
    #[inline(always)]
    fn to_f64(self) -> f64 {
        dasp_sample::Sample::to_sample::<f64>(self)
    }
}

impl Sample for f32 {}
impl Sample for f64 {}
impl Sample for i16 {}
impl Sample for i32 {}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    pub struct Signal<T: FromF32> {
        pub data: Vec<T>,
        pub channels: u32,
        pub rate: u32,
    }

    impl<T: FromF32> Signal<T> {
        /// Planar copy of the interleaved data.
        pub fn planar(&self) -> Vec<Vec<T>> {
            let channels = self.channels as usize;
            (0..channels)
                .map(|c| {
                    self.data
                        .iter()
                        .skip(c)
                        .step_by(channels)
                        .copied()
                        .collect()
                })
                .collect()
        }
    }

    pub trait FromF32: Copy + Clone + std::fmt::Debug + Send + Sync + 'static {
        fn from_f32(val: f32) -> Self;
    }

    impl FromF32 for i16 {
        fn from_f32(val: f32) -> Self {
            (val * (std::i16::MAX - 1) as f32) as i16
        }
    }

    impl FromF32 for i32 {
        fn from_f32(val: f32) -> Self {
            (val * (std::i32::MAX - 1) as f32) as i32
        }
    }

    impl FromF32 for f32 {
        fn from_f32(val: f32) -> Self {
            val
        }
    }

    impl FromF32 for f64 {
        fn from_f32(val: f32) -> Self {
            val as f64
        }
    }

    impl<T: FromF32 + quickcheck::Arbitrary> quickcheck::Arbitrary for Signal<T> {
        fn arbitrary<G: quickcheck::Gen>(g: &mut G) -> Self {
            use rand::Rng;

            let channels = g.gen_range(1, 8);
            let rate = g.gen_range(16_000, 96_000);
            let num_frames = (rate as f64 * g.gen_range(0.0, 3.0)) as usize;

            let max = g.gen_range(0.0, 1.0);
            let freqs = [
                g.gen_range(20.0, 16_000.0),
                g.gen_range(20.0, 16_000.0),
                g.gen_range(20.0, 16_000.0),
                g.gen_range(20.0, 16_000.0),
            ];
            let volumes = [
                g.gen_range(0.0, 1.0),
                g.gen_range(0.0, 1.0),
                g.gen_range(0.0, 1.0),
                g.gen_range(0.0, 1.0),
            ];
            let volume_scale = 1.0 / volumes.iter().sum::<f32>();
            let mut accumulators = [0.0; 4];
            let steps = [
                2.0 * std::f32::consts::PI * freqs[0] / rate as f32,
                2.0 * std::f32::consts::PI * freqs[1] / rate as f32,
                2.0 * std::f32::consts::PI * freqs[2] / rate as f32,
                2.0 * std::f32::consts::PI * freqs[3] / rate as f32,
            ];

            let mut data = vec![T::from_f32(0.0); num_frames * channels as usize];
            for frame in data.chunks_exact_mut(channels as usize) {
                let val = max
                    * (f32::sin(accumulators[0]) * volumes[0]
                        + f32::sin(accumulators[1]) * volumes[1]
                        + f32::sin(accumulators[2]) * volumes[2]
                        + f32::sin(accumulators[3]) * volumes[3])
                    * volume_scale;

                for sample in frame.iter_mut() {
                    *sample = T::from_f32(val);
                }

                for (acc, step) in accumulators.iter_mut().zip(steps.iter()) {
                    *acc += step;
                }
            }

            Signal {
                data,
                channels,
                rate,
            }
        }

        fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
            Box::new(SignalShrinker {
                frames: 0,
                tried_mono: self.channels == 1,
                seed: self.clone(),
            })
        }
    }

    /// Yields prefixes of growing length, first as mono and then with all channels.
    struct SignalShrinker<T: FromF32> {
        seed: Signal<T>,
        /// Frames of the next prefix
        frames: usize,
        /// Whether the mono prefixes are exhausted
        tried_mono: bool,
    }

    impl<T: FromF32> Iterator for SignalShrinker<T> {
        type Item = Signal<T>;

        fn next(&mut self) -> Option<Signal<T>> {
            let channels = self.seed.channels as usize;
            let total_frames = self.seed.data.len() / channels;

            if self.frames >= total_frames {
                if self.tried_mono {
                    return None;
                }
                self.tried_mono = true;
                self.frames = 0;
                return self.next();
            }

            let (data, channels) = if self.tried_mono {
                (
                    Vec::from(&self.seed.data[..self.frames * channels]),
                    self.seed.channels,
                )
            } else {
                (
                    self.seed
                        .data
                        .iter()
                        .step_by(channels)
                        .take(self.frames)
                        .copied()
                        .collect(),
                    1,
                )
            };

            self.frames = if self.frames == 0 { 1 } else { self.frames * 2 };

            Some(Signal {
                data,
                channels,
                rate: self.seed.rate,
            })
        }
    }

    #[test]
    fn interleaved_split() {
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let s = Interleaved::new(&data[..], 2).unwrap();
        assert_eq!(s.frames(), 3);

        let (fst, snd) = s.split_at(1);
        assert_eq!(fst.frames(), 1);
        assert_eq!(snd.frames(), 2);

        let mut right = Vec::new();
        snd.foreach_sample(1, |v| right.push(*v));
        assert_eq!(right, [4.0, 6.0]);
    }

    #[test]
    fn interleaved_incomplete_frame() {
        let data = [0.0f32; 5];
        assert_eq!(
            Interleaved::new(&data[..], 2).err(),
            Some(Error::IncompleteFrame {
                len: 5,
                channels: 2
            })
        );
    }

    #[test]
    fn planar_split() {
        let left = [1i16, 2, 3, 4];
        let right = [5i16, 6, 7, 8];
        let data = [&left[..], &right[..]];
        let s = Planar::new(&data).unwrap();
        assert_eq!(s.channels(), 2);

        let (fst, snd) = s.split_at(3);
        assert_eq!(fst.frames(), 3);
        assert_eq!(snd.frames(), 1);

        let mut right = Vec::new();
        fst.foreach_sample(1, |v| right.push(*v));
        assert_eq!(right, [5, 6, 7]);
    }

    #[test]
    fn planar_mismatched_lengths() {
        let left = [0.0f64; 4];
        let right = [0.0f64; 3];
        let data = [&left[..], &right[..]];
        assert_eq!(
            Planar::new(&data).err(),
            Some(Error::MismatchedChannelLengths)
        );
    }

    #[test]
    fn non_finite_position() {
        let data = [0.0f32, 1.0, 2.0, std::f32::NAN, 4.0, std::f32::INFINITY];
        let s = Interleaved::new(&data[..], 2).unwrap();
        assert_eq!(s.find_non_finite(), Some((1, 1)));

        let (fst, snd) = s.split_at(1);
        assert_eq!(fst.find_non_finite(), None);
        assert_eq!(snd.find_non_finite(), Some((1, 0)));

        let left = [0.0f64, -std::f64::INFINITY];
        let right = [std::f64::NAN, 0.0];
        let planes = [&left[..], &right[..]];
        assert_eq!(Planar::new(&planes).unwrap().find_non_finite(), Some((0, 1)));

        let ints = [i16::MIN, i16::MAX];
        assert_eq!(Interleaved::new(&ints[..], 1).unwrap().find_non_finite(), None);
    }

    #[test]
    fn integer_samples_full_scale() {
        assert_eq!(i16::MIN.to_f64(), -1.0);
        assert_eq!(0i32.to_f64(), 0.0);
        assert_eq!(0.5f32.to_f64(), 0.5);
    }

    #[test]
    fn loudness_energy_inverse() {
        use float_eq::assert_float_eq;

        assert_float_eq!(energy_to_loudness(1.0), -0.691, abs <= 1e-12);
        assert_float_eq!(
            energy_to_loudness(loudness_to_energy(-23.0)),
            -23.0,
            abs <= 1e-9
        );
        assert_eq!(energy_to_loudness(0.0), -std::f64::INFINITY);
    }
}
