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

use thiserror::Error;

use crate::meter::State;

/// Result type of all [`LufsMeter`](struct.LufsMeter.html) operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error values for [`LufsMeter`](struct.LufsMeter.html) functions.
///
/// Every variant is a contract violation by the caller. Silence or programmes too short to
/// contain a single gating block are not errors, they measure as negative infinity.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Sample rate outside of the supported range.
    #[error("Invalid sample rate: {0} Hz (must be between 1000 and 400000)")]
    InvalidSampleRate(u32),

    /// Channel count outside of the supported range.
    #[error("Invalid channel count: {0} (must be between 1 and 64)")]
    InvalidChannelCount(u32),

    /// A buffer or channel map has a different number of channels than the meter was prepared
    /// with.
    #[error("Channel count mismatch: expected {expected}, got {actual}")]
    ChannelCountMismatch { expected: u32, actual: u32 },

    /// The channels of a planar buffer don't all have the same length.
    #[error("Channels of a planar buffer have different lengths")]
    MismatchedChannelLengths,

    /// An interleaved buffer does not contain a whole number of frames.
    #[error("Interleaved buffer of {len} samples is not a multiple of {channels} channels")]
    IncompleteFrame { len: usize, channels: u32 },

    /// A buffer contains a NaN or infinite sample.
    #[error("Non-finite sample in channel {channel} at frame {frame}")]
    NonFiniteSample { channel: u32, frame: usize },

    /// Invalid channel index or channel type for that index.
    #[error("Invalid channel index")]
    InvalidChannelIndex,

    /// An operation was called in a state that does not allow it.
    #[error("Can't {operation} while {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: State,
    },
}
