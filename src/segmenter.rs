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

use std::collections::VecDeque;
use std::fmt;

use smallvec::SmallVec;

use crate::channel::Channel;
use crate::utils::energy_to_loudness;

/// Number of 100ms hops in one 400ms gating block.
const HOPS_PER_BLOCK: usize = 4;

/// Mean square energy of one 400ms gating block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEnergy {
    /// Position of the block in the session, counting from 0. Block `n` starts `n * 100ms`
    /// after the start of the session.
    pub index: u64,
    /// Mean of the squared K-weighted samples over the block, one value per channel.
    pub mean_square: SmallVec<[f64; 8]>,
}

impl BlockEnergy {
    /// Channel-weighted energy `Σ G_c · meanSquare_c` of this block.
    pub fn weighted_energy(&self, channel_map: &[Channel]) -> f64 {
        debug_assert_eq!(channel_map.len(), self.mean_square.len());

        Iterator::zip(self.mean_square.iter(), channel_map.iter())
            .map(|(z, channel)| channel.weight() * *z)
            .sum()
    }

    /// Block loudness in LUFS.
    pub fn loudness(&self, channel_map: &[Channel]) -> f64 {
        energy_to_loudness(self.weighted_energy(channel_map))
    }
}

/// Cuts the K-weighted stream into 400ms blocks overlapping by 75%.
///
/// Every frame belongs to up to four blocks. Instead of four staggered 400ms accumulators the
/// segmenter keeps the squared sums of the current partial 100ms hop and of the last three
/// completed hops; each completed hop closes exactly one block. Hop boundaries are absolute
/// stream positions, so the emitted blocks don't depend on how the input was chunked.
pub struct Segmenter {
    channels: usize,
    /// How many frames fit in 100ms (rounded).
    samples_in_100ms: usize,
    /// Frames missing until the current hop is complete.
    needed_frames: usize,
    /// Squared sums of the current hop, one per channel.
    partial: Box<[f64]>,
    /// Squared sums of the most recent completed hops, oldest first.
    hops: VecDeque<Box<[f64]>>,
    /// Index of the next block to be emitted.
    next_index: u64,
}

impl fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segmenter")
            .field("channels", &self.channels)
            .field("samples_in_100ms", &self.samples_in_100ms)
            .field("needed_frames", &self.needed_frames)
            .field("completed_hops", &self.hops.len())
            .field("next_index", &self.next_index)
            .finish()
    }
}

/// Number of frames in 100ms at `rate`, rounded to the nearest frame.
pub fn samples_in_100ms(rate: u32) -> usize {
    (rate as usize + 5) / 10
}

impl Segmenter {
    pub fn new(rate: u32, channels: u32) -> Self {
        assert!(rate > 0);
        assert!(channels > 0);

        let samples_in_100ms = samples_in_100ms(rate);

        Segmenter {
            channels: channels as usize,
            samples_in_100ms,
            needed_frames: samples_in_100ms,
            partial: vec![0.0; channels as usize].into_boxed_slice(),
            hops: VecDeque::with_capacity(HOPS_PER_BLOCK),
            next_index: 0,
        }
    }

    /// Number of frames in one gating block.
    pub fn frames_per_block(&self) -> usize {
        self.samples_in_100ms * HOPS_PER_BLOCK
    }

    /// Frames that can be added before the current hop is complete.
    pub fn needed_frames(&self) -> usize {
        self.needed_frames
    }

    /// Per-channel squared sums of the current hop. The filter adds into these.
    pub fn accumulator_mut(&mut self) -> &mut [f64] {
        &mut self.partial
    }

    /// Number of blocks emitted so far.
    #[cfg(any(test, feature = "internal-tests"))]
    pub fn blocks_emitted(&self) -> u64 {
        self.next_index
    }

    /// Records that `frames` frames were added to the accumulator.
    ///
    /// Returns the block that ends at the current position if this completed a hop and enough
    /// audio for a whole block has been seen.
    pub fn advance(&mut self, frames: usize) -> Option<BlockEnergy> {
        assert!(frames <= self.needed_frames);

        self.needed_frames -= frames;
        if self.needed_frames > 0 {
            return None;
        }
        self.needed_frames = self.samples_in_100ms;

        let block = if self.hops.len() == HOPS_PER_BLOCK - 1 {
            let frames_per_block = self.frames_per_block() as f64;
            let mean_square = (0..self.channels)
                .map(|c| {
                    let sum = self.hops.iter().map(|h| h[c]).sum::<f64>() + self.partial[c];
                    sum / frames_per_block
                })
                .collect();

            let block = BlockEnergy {
                index: self.next_index,
                mean_square,
            };
            self.next_index += 1;

            Some(block)
        } else {
            None
        };

        // Recycle the oldest hop as the new partial accumulator
        let next = if self.hops.len() == HOPS_PER_BLOCK - 1 {
            self.hops.pop_front()
        } else {
            None
        };
        let mut next = next.unwrap_or_else(|| vec![0.0; self.channels].into_boxed_slice());
        next.fill(0.0);

        let completed = std::mem::replace(&mut self.partial, next);
        self.hops.push_back(completed);

        block
    }

    /// Drops all partial and completed hops and starts counting blocks from 0 again.
    pub fn reset(&mut self) {
        self.needed_frames = self.samples_in_100ms;
        self.partial.fill(0.0);
        self.hops.clear();
        self.next_index = 0;
    }
}
