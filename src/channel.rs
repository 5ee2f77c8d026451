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

/// Channel position.
///
/// Use these values when setting the channel map with
/// [`LufsMeter::set_channel`](struct.LufsMeter.html#method.set_channel).
/// See definitions in ITU R-REC-BS 1770-4 and ITU R-REC-BS 2051-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Channel {
    /// unused channel (for example LFE channel)
    Unused,
    /// Left or ITU M+030
    Left,
    /// Right or ITU M-030
    Right,
    /// Center or ITU M+000
    Center,
    /// Left surround or ITU M+110
    LeftSurround,
    /// Right surround or ITU M-110
    RightSurround,
    /// a channel that is counted twice
    DualMono,
    /// ITU M+SC
    MpSC,
    /// ITU M-SC
    MmSC,
    /// ITU M+060
    Mp060,
    /// ITU M-060
    Mm060,
    /// ITU M+090
    Mp090,
    /// ITU M-090
    Mm090,
    /// ITU M+135
    Mp135,
    /// ITU M-135
    Mm135,
    /// ITU M+180
    Mp180,
    /// ITU U+000
    Up000,
    /// ITU U+030
    Up030,
    /// ITU U-030
    Um030,
    /// ITU U+045
    Up045,
    /// ITU U-045
    Um045,
    /// ITU U+090
    Up090,
    /// ITU U-090
    Um090,
    /// ITU U+110
    Up110,
    /// ITU U-110
    Um110,
    /// ITU U+135
    Up135,
    /// ITU U-135
    Um135,
    /// ITU U+180
    Up180,
    /// ITU T+000
    Tp000,
    /// ITU B+000
    Bp000,
    /// ITU B+045
    Bp045,
    /// ITU B-045
    Bm045,
}

impl Channel {
    /// Weighting coefficient `G` of this channel in the energy sum.
    ///
    /// Surround positions at ±110° (and the ±60°/±90° positions BS.1770-4 groups with them) are
    /// boosted by about 1.5 dB, `DualMono` counts a single channel twice and `Unused` channels do
    /// not contribute at all.
    pub fn weight(self) -> f64 {
        match self {
            Channel::Unused => 0.0,
            Channel::LeftSurround
            | Channel::RightSurround
            | Channel::Mp060
            | Channel::Mm060
            | Channel::Mp090
            | Channel::Mm090 => 1.41,
            Channel::DualMono => 2.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Default channel map for the given number of channels.
///
/// * 0 \-> `Left`
/// * 1 \-> `Right`
/// * 2 \-> `Center`
/// * 3 \-> `Unused` (LFE)
/// * 4 \-> `LeftSurround`
/// * 5 \-> `RightSurround`
/// * _ \-> `Unused`
///
/// Four channel streams are mapped to `Left`, `Right`, `LeftSurround`, `RightSurround` and five
/// channel streams to `Left`, `Right`, `Center`, `LeftSurround`, `RightSurround`.
pub fn default_channel_map(channels: u32) -> Vec<Channel> {
    match channels {
        4 => vec![
            Channel::Left,
            Channel::Right,
            Channel::LeftSurround,
            Channel::RightSurround,
        ],
        5 => vec![
            Channel::Left,
            Channel::Right,
            Channel::Center,
            Channel::LeftSurround,
            Channel::RightSurround,
        ],
        _ => {
            let mut v = vec![Channel::Unused; channels as usize];

            let set_channels = std::cmp::min(channels as usize, 6);
            v[0..set_channels].copy_from_slice(
                &[
                    Channel::Left,
                    Channel::Right,
                    Channel::Center,
                    Channel::Unused,
                    Channel::LeftSurround,
                    Channel::RightSurround,
                ][..set_channels],
            );

            v
        }
    }
}

/// Checks that `value` may be placed at `channel_number` of a map with `channels` entries.
pub(crate) fn check_channel(channels: u32, channel_number: u32, value: Channel) -> bool {
    if channel_number >= channels {
        return false;
    }

    // Counting a channel twice only makes sense for mono
    !(value == Channel::DualMono && (channels != 1 || channel_number != 0))
}
