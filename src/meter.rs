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

use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::channel::{check_channel, default_channel_map, Channel};
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::gating::{gated_loudness_multiple, AbsoluteGate, Gating};
use crate::segmenter::{BlockEnergy, Segmenter};
use crate::utils::{Interleaved, Planar, Sample, Samples};

/// Lowest supported sample rate in Hz.
pub const MIN_RATE: u32 = 1_000;
/// Highest supported sample rate in Hz.
pub const MAX_RATE: u32 = 400_000;
/// Highest supported number of channels.
pub const MAX_CHANNELS: u32 = 64;

/// Lifecycle state of a [`LufsMeter`](struct.LufsMeter.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Nothing configured yet.
    Idle,
    /// Sample rate and channels are known, filter coefficients are derived.
    Prepared,
    /// A measurement session is running and accepts audio.
    Integrating,
    /// The last session was finalized and its result can be read.
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Idle => "idle",
            State::Prepared => "prepared",
            State::Integrating => "integrating",
            State::Stopped => "stopped",
        })
    }
}

/// Progress report passed to the callback of
/// [`LufsMeter::process_buffer_with_progress`](struct.LufsMeter.html#method.process_buffer_with_progress).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Integrated loudness of the blocks completed so far in LUFS.
    pub loudness: f64,
    /// Share of the expected frames processed so far in `[0, 1]`, `NaN` if the total is unknown.
    pub fraction: f64,
    /// Frames processed in the current session.
    pub frames_processed: u64,
}

/// Filter and segmenter for one rate / channel configuration.
struct Prepared {
    rate: u32,
    channels: u32,
    channel_map: Box<[Channel]>,
    filter: Filter,
    segmenter: Segmenter,
}

/// Everything measured between `start_integrated()` and `stop_integrated()`.
#[derive(Default)]
struct Session {
    /// Completed gating blocks in order.
    blocks: Vec<BlockEnergy>,
    /// Channel-weighted energy of each block in `blocks`.
    energies: Vec<f64>,
    /// Absolute gate over `energies`, for progress reports.
    absolute_gate: AbsoluteGate,
    frames_processed: u64,
    /// Gating result, set by `stop_integrated()`.
    gating: Option<Gating>,
}

/// Streaming EBU R128 / BS.1770 integrated loudness meter.
///
/// A meter goes through `Idle → Prepared → Integrating → Stopped`:
///
/// ```
/// use lufs_meter::LufsMeter;
///
/// # fn main() -> Result<(), lufs_meter::Error> {
/// let mut meter = LufsMeter::new();
/// meter.prepare(48_000, 2)?;
/// meter.start_integrated()?;
///
/// let silence = vec![0.0f32; 48_000];
/// meter.process_buffer(&[&silence[..], &silence[..]])?;
///
/// meter.stop_integrated()?;
/// assert_eq!(meter.integrated_loudness()?, f64::NEG_INFINITY);
/// # Ok(())
/// # }
/// ```
///
/// After `stop_integrated()` a new, independent session can be started with
/// `start_integrated()` without preparing again.
pub struct LufsMeter {
    state: State,
    prepared: Option<Prepared>,
    session: Session,
    /// Total number of frames the caller expects to feed, for progress reports.
    expected_frames: Option<u64>,
}

impl fmt::Debug for LufsMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LufsMeter")
            .field("state", &self.state)
            .field("rate", &self.rate())
            .field("channels", &self.channels())
            .field("channel_map", &self.channel_map())
            // Not the blocks themselves
            .field("blocks", &self.session.blocks.len())
            .field("frames_processed", &self.session.frames_processed)
            .field("expected_frames", &self.expected_frames)
            .finish()
    }
}

impl Default for LufsMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl LufsMeter {
    /// Create a new, idle meter.
    pub fn new() -> Self {
        LufsMeter {
            state: State::Idle,
            prepared: None,
            session: Session::default(),
            expected_frames: None,
        }
    }

    /// Create a meter and prepare it for the given configuration.
    pub fn with_params(rate: u32, channels: u32) -> Result<Self> {
        let mut meter = Self::new();
        meter.prepare(rate, channels)?;
        Ok(meter)
    }

    fn check_state(&self, operation: &'static str, allowed: &[State]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition {
                operation,
                state: self.state,
            })
        }
    }

    /// Derive the filter coefficients for `rate` and allocate state for `channels` channels.
    ///
    /// Can be called again after a session was stopped to switch to a different configuration.
    /// The channel map is kept if the number of channels does not change. An invalid sample
    /// rate or channel count leaves the meter idle.
    pub fn prepare(&mut self, rate: u32, channels: u32) -> Result<()> {
        self.check_state("prepare", &[State::Idle, State::Prepared, State::Stopped])?;

        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            self.reset();
            return Err(Error::InvalidSampleRate(rate));
        }

        if channels == 0 || channels > MAX_CHANNELS {
            self.reset();
            return Err(Error::InvalidChannelCount(channels));
        }

        let channel_map = match self.prepared.take() {
            Some(prepared) if prepared.channels == channels => prepared.channel_map,
            _ => default_channel_map(channels).into_boxed_slice(),
        };

        self.prepared = Some(Prepared {
            rate,
            channels,
            channel_map,
            filter: Filter::new(rate, channels),
            segmenter: Segmenter::new(rate, channels),
        });
        self.session = Session::default();
        self.state = State::Prepared;

        debug!(rate, channels, "Prepared loudness meter");

        Ok(())
    }

    /// Get the current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Get the prepared sample rate.
    pub fn rate(&self) -> Option<u32> {
        self.prepared.as_ref().map(|p| p.rate)
    }

    /// Get the prepared number of channels.
    pub fn channels(&self) -> Option<u32> {
        self.prepared.as_ref().map(|p| p.channels)
    }

    /// Get the configured channel types. Empty while idle.
    pub fn channel_map(&self) -> &[Channel] {
        self.prepared
            .as_ref()
            .map(|p| &*p.channel_map)
            .unwrap_or(&[])
    }

    /// Set channel type.
    ///
    /// Only possible while no session is integrating. See
    /// [`default_channel_map`](fn.default_channel_map.html) for the defaults.
    pub fn set_channel(&mut self, channel_number: u32, value: Channel) -> Result<()> {
        self.check_state("set a channel", &[State::Prepared, State::Stopped])?;
        let state = self.state;
        let prepared = self.prepared.as_mut().ok_or(Error::InvalidStateTransition {
            operation: "set a channel",
            state,
        })?;

        if !check_channel(prepared.channels, channel_number, value) {
            return Err(Error::InvalidChannelIndex);
        }

        prepared.channel_map[channel_number as usize] = value;
        Ok(())
    }

    /// Set channel types.
    ///
    /// Only possible while no session is integrating.
    pub fn set_channel_map(&mut self, channel_map: &[Channel]) -> Result<()> {
        self.check_state("set the channel map", &[State::Prepared, State::Stopped])?;
        let state = self.state;
        let prepared = self.prepared.as_mut().ok_or(Error::InvalidStateTransition {
            operation: "set the channel map",
            state,
        })?;

        if channel_map.len() != prepared.channels as usize {
            return Err(Error::ChannelCountMismatch {
                expected: prepared.channels,
                actual: channel_map.len() as u32,
            });
        }

        for (channel_number, value) in channel_map.iter().enumerate() {
            if !check_channel(prepared.channels, channel_number as u32, *value) {
                return Err(Error::InvalidChannelIndex);
            }
        }

        prepared.channel_map.copy_from_slice(channel_map);
        Ok(())
    }

    /// Set the number of frames the caller is going to feed in total.
    ///
    /// Used for the `fraction` of progress reports, which is `NaN` while this is `None`.
    pub fn set_expected_frames(&mut self, frames: Option<u64>) {
        self.expected_frames = frames;
    }

    /// Start a new measurement session.
    ///
    /// Resets the filter state and discards all blocks of a previous session.
    pub fn start_integrated(&mut self) -> Result<()> {
        self.check_state("start integrating", &[State::Prepared, State::Stopped])?;
        let state = self.state;
        let prepared = self.prepared.as_mut().ok_or(Error::InvalidStateTransition {
            operation: "start integrating",
            state,
        })?;

        prepared.filter.reset();
        prepared.segmenter.reset();
        self.session = Session::default();
        self.state = State::Integrating;

        debug!(
            rate = prepared.rate,
            channels = prepared.channels,
            "Started integration"
        );

        Ok(())
    }

    /// Process frames. This is the generic variant of the different public process_buffer()
    /// functions that are defined below.
    fn add_frames<'a, T: Sample + 'a, S: Samples<'a, T>>(&mut self, mut src: S) -> Result<()> {
        let state = self.state;
        let prepared = match self.prepared.as_mut() {
            Some(prepared) if state == State::Integrating => prepared,
            _ => {
                return Err(Error::InvalidStateTransition {
                    operation: "process a buffer",
                    state,
                })
            }
        };

        if src.channels() != prepared.channels as usize {
            warn!(
                expected = prepared.channels,
                actual = src.channels(),
                "Channel count changed, discarding session"
            );

            self.session = Session::default();
            self.state = State::Prepared;

            return Err(Error::ChannelCountMismatch {
                expected: prepared.channels,
                actual: src.channels() as u32,
            });
        }

        // Nothing may reach the filters, a single NaN would poison their state
        if let Some((channel, frame)) = src.find_non_finite() {
            return Err(Error::NonFiniteSample {
                channel: channel as u32,
                frame,
            });
        }

        let Prepared {
            ref mut filter,
            ref mut segmenter,
            ref channel_map,
            ..
        } = *prepared;
        let session = &mut self.session;

        session.frames_processed += src.frames() as u64;

        while src.frames() > 0 {
            let needed_frames = segmenter.needed_frames();
            let num_frames = std::cmp::min(src.frames(), needed_frames);
            let (current, next) = src.split_at(num_frames);

            filter.process(&current, segmenter.accumulator_mut());
            src = next;

            if num_frames == needed_frames {
                filter.flush_denormals();
            }

            if let Some(block) = segmenter.advance(num_frames) {
                let energy = block.weighted_energy(channel_map);
                trace!(index = block.index, energy, "Completed gating block");

                session.absolute_gate.add(energy);
                session.energies.push(energy);
                session.blocks.push(block);
            }
        }

        Ok(())
    }

    fn progress(&self) -> Progress {
        let fraction = match self.expected_frames {
            Some(0) => 1.0,
            Some(expected) => {
                f64::min(self.session.frames_processed as f64 / expected as f64, 1.0)
            }
            None => std::f64::NAN,
        };

        Progress {
            loudness: Gating::with_absolute_gate(
                &[&self.session.energies[..]],
                self.session.absolute_gate,
            )
            .loudness(),
            fraction,
            frames_processed: self.session.frames_processed,
        }
    }

    /// Add planar frames, one slice per channel, to the running session.
    pub fn process_buffer<T: Sample>(&mut self, frames: &[&[T]]) -> Result<()> {
        self.check_state("process a buffer", &[State::Integrating])?;
        self.add_frames(Planar::new(frames)?)
    }

    /// Add interleaved frames to the running session.
    pub fn process_buffer_interleaved<T: Sample>(&mut self, frames: &[T]) -> Result<()> {
        self.check_state("process a buffer", &[State::Integrating])?;
        let channels = self.channels().unwrap_or(0) as usize;
        self.add_frames(Interleaved::new(frames, channels)?)
    }

    /// Add planar frames and report progress afterwards.
    ///
    /// `progress` is called exactly once, after the whole buffer has been processed and all its
    /// blocks were recorded. It is not called if processing fails.
    pub fn process_buffer_with_progress<T: Sample, F: FnMut(Progress)>(
        &mut self,
        frames: &[&[T]],
        mut progress: F,
    ) -> Result<()> {
        self.process_buffer(frames)?;
        progress(self.progress());
        Ok(())
    }

    /// Add interleaved frames and report progress afterwards.
    ///
    /// See [`LufsMeter::process_buffer_with_progress`](#method.process_buffer_with_progress).
    pub fn process_buffer_interleaved_with_progress<T: Sample, F: FnMut(Progress)>(
        &mut self,
        frames: &[T],
        mut progress: F,
    ) -> Result<()> {
        self.process_buffer_interleaved(frames)?;
        progress(self.progress());
        Ok(())
    }

    /// Finish the running session.
    ///
    /// Audio of an incomplete trailing block is dropped. The gated result can then be read with
    /// [`LufsMeter::integrated_loudness`](#method.integrated_loudness).
    pub fn stop_integrated(&mut self) -> Result<()> {
        self.check_state("stop integrating", &[State::Integrating])?;

        let gating = Gating::new(&self.session.energies);
        self.session.gating = Some(gating);
        self.state = State::Stopped;

        debug!(
            frames = self.session.frames_processed,
            blocks = self.session.blocks.len(),
            gated_blocks = gating.above_relative,
            loudness = gating.loudness(),
            "Stopped integration"
        );

        Ok(())
    }

    fn gating(&self, operation: &'static str) -> Result<&Gating> {
        match self.session.gating {
            Some(ref gating) if self.state == State::Stopped => Ok(gating),
            _ => Err(Error::InvalidStateTransition {
                operation,
                state: self.state,
            }),
        }
    }

    /// Get integrated loudness of the last session in LUFS.
    ///
    /// Negative infinity if no block passed the gates, for example for silence or programmes
    /// shorter than 400ms.
    pub fn integrated_loudness(&self) -> Result<f64> {
        Ok(self.gating("read the integrated loudness")?.loudness())
    }

    /// Get integrated loudness in LUFS across the last sessions of multiple meters.
    ///
    /// The blocks of all meters are gated together, as if they were one programme. This gives
    /// the album loudness of a set of tracks, for example. All meters must be stopped.
    pub fn integrated_loudness_multiple<'a>(
        iter: impl IntoIterator<Item = &'a Self>,
    ) -> Result<f64> {
        let energies = iter
            .into_iter()
            .map(|m| {
                m.gating("read the integrated loudness")
                    .map(|_| &*m.session.energies)
            })
            .collect::<Result<SmallVec<[_; 16]>>>()?;

        Ok(gated_loudness_multiple(&energies))
    }

    /// Get the relative gating threshold of the last session in LUFS.
    ///
    /// -70 LUFS if no block passed the absolute gate.
    pub fn relative_threshold(&self) -> Result<f64> {
        Ok(self.gating("read the relative threshold")?.relative_threshold())
    }

    /// Get the number of blocks passing both gates and the sum of their energies.
    ///
    /// This allows pooling the measurements of several programmes, for example for the
    /// ReplayGain 2.0 album gain: `energy_to_loudness(Σ energy / Σ count)`.
    pub fn gating_block_count_and_energy(&self) -> Result<(u64, f64)> {
        let gating = self.gating("read the gating blocks")?;
        Ok((gating.above_relative, gating.energy))
    }

    /// Gating blocks completed in the current or last session.
    pub fn blocks(&self) -> &[BlockEnergy] {
        &self.session.blocks
    }

    /// Frames processed in the current or last session.
    pub fn frames_processed(&self) -> u64 {
        self.session.frames_processed
    }

    /// Drop all configuration and measurements and go back to idle.
    pub fn reset(&mut self) {
        self.prepared = None;
        self.session = Session::default();
        self.expected_frames = None;
        self.state = State::Idle;

        debug!("Reset loudness meter");
    }
}
