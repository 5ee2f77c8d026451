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

//! Two stage BS.1770 gating of block energies.
//!
//! All functions work on channel-weighted block energies (`Σ G_c · meanSquare_c`), see
//! [`BlockEnergy::weighted_energy`](../segmenter/struct.BlockEnergy.html#method.weighted_energy).

use crate::utils::{energy_to_loudness, loudness_to_energy};

/// Absolute gating threshold in LUFS.
pub const ABSOLUTE_THRESHOLD: f64 = -70.0;

/// Relative gating threshold in LU below the absolute-gated loudness.
pub const RELATIVE_GATE: f64 = -10.0;

/// Linear energy of the absolute gating threshold.
pub fn absolute_threshold_energy() -> f64 {
    loudness_to_energy(ABSOLUTE_THRESHOLD)
}

/// Running count and sum of the block energies at or above the absolute threshold.
///
/// Kept up to date while blocks arrive, so the relative threshold of a running session is
/// known without another pass over all blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AbsoluteGate {
    /// Number of blocks at or above the absolute threshold.
    pub count: u64,
    /// Sum of their energies.
    pub sum: f64,
}

impl AbsoluteGate {
    /// Absolute gate over all energies of `s`.
    pub fn new(s: &[&[f64]]) -> Self {
        let threshold = absolute_threshold_energy();

        s.iter()
            .flat_map(|energies| energies.iter())
            .fold(AbsoluteGate::default(), |mut gate, e| {
                gate.add_above(*e, threshold);
                gate
            })
    }

    /// Records one more block energy.
    pub fn add(&mut self, energy: f64) {
        self.add_above(energy, absolute_threshold_energy());
    }

    #[inline]
    fn add_above(&mut self, energy: f64, threshold: f64) {
        if energy >= threshold {
            self.count += 1;
            self.sum += energy;
        }
    }

    /// Relative threshold as linear energy, `None` if no block passed the absolute gate.
    pub fn relative_threshold_energy(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }

        let relative_gate_factor = f64::powf(10.0, RELATIVE_GATE / 10.0);
        Some((self.sum / self.count as f64) * relative_gate_factor)
    }
}

/// Outcome of gating one or more programmes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gating {
    /// Number of blocks at or above the absolute threshold.
    pub above_absolute: u64,
    /// Relative threshold as linear energy, `None` if no block passed the absolute gate.
    pub relative_threshold_energy: Option<f64>,
    /// Number of blocks passing both gates.
    pub above_relative: u64,
    /// Sum of the energies of the blocks passing both gates.
    pub energy: f64,
}

impl Gating {
    /// Gates the block energies of a single programme.
    pub fn new(energies: &[f64]) -> Self {
        Self::new_multiple(&[energies])
    }

    /// Gates the block energies of several programmes as if they were one.
    pub fn new_multiple(s: &[&[f64]]) -> Self {
        Self::with_absolute_gate(s, AbsoluteGate::new(s))
    }

    /// Gates the block energies of `s` given their already accumulated absolute gate.
    ///
    /// `gate` must have been built from exactly the energies in `s`.
    pub fn with_absolute_gate(s: &[&[f64]], gate: AbsoluteGate) -> Self {
        let relative_threshold = match gate.relative_threshold_energy() {
            Some(relative_threshold) => relative_threshold,
            None => {
                return Gating {
                    above_absolute: 0,
                    relative_threshold_energy: None,
                    above_relative: 0,
                    energy: 0.0,
                }
            }
        };
        let absolute_threshold = absolute_threshold_energy();

        // The relative threshold is always above the absolute one, so this implies both gates
        let (above_relative, energy) = s
            .iter()
            .flat_map(|energies| energies.iter())
            .filter(|e| **e >= absolute_threshold && **e >= relative_threshold)
            .fold((0u64, 0.0), |acc, e| (acc.0 + 1, acc.1 + *e));

        Gating {
            above_absolute: gate.count,
            relative_threshold_energy: Some(relative_threshold),
            above_relative,
            energy,
        }
    }

    /// Integrated loudness in LUFS, negative infinity if no block survived gating.
    pub fn loudness(&self) -> f64 {
        if self.above_relative == 0 {
            return -std::f64::INFINITY;
        }

        energy_to_loudness(self.energy / self.above_relative as f64)
    }

    /// Relative threshold in LUFS, or the absolute threshold if no block passed it.
    pub fn relative_threshold(&self) -> f64 {
        match self.relative_threshold_energy {
            Some(energy) => energy_to_loudness(energy),
            None => ABSOLUTE_THRESHOLD,
        }
    }
}

/// Integrated loudness of the given block energies in LUFS.
#[cfg(any(test, feature = "internal-tests"))]
pub fn gated_loudness(energies: &[f64]) -> f64 {
    Gating::new(energies).loudness()
}

/// Integrated loudness of several programmes pooled together in LUFS.
pub fn gated_loudness_multiple(s: &[&[f64]]) -> f64 {
    Gating::new_multiple(s).loudness()
}
