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

use crate::utils::{Sample, Samples};

/// Coefficients of one second order IIR section, normalised so that `a0 == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    /// Numerator.
    pub b: [f64; 3],
    /// Denominator, `a[0]` is always 1.
    pub a: [f64; 3],
}

impl Biquad {
    /// Stage 1 of the K-weighting filter: high shelf of about +4 dB above ~1.7 kHz, modelling
    /// the acoustic effect of the head.
    #[allow(non_snake_case)]
    pub fn high_shelf(rate: f64) -> Self {
        let f0 = 1681.974450955533;
        let G = 3.999843853973347;
        let Q = 0.7071752369554196;

        let K = f64::tan(std::f64::consts::PI * f0 / rate);
        let Vh = f64::powf(10.0, G / 20.0);
        let Vb = f64::powf(Vh, 0.4996667741545416);

        let a0 = 1.0 + K / Q + K * K;

        Biquad {
            b: [
                (Vh + Vb * K / Q + K * K) / a0,
                2.0 * (K * K - Vh) / a0,
                (Vh - Vb * K / Q + K * K) / a0,
            ],
            a: [1.0, 2.0 * (K * K - 1.0) / a0, (1.0 - K / Q + K * K) / a0],
        }
    }

    /// Stage 2 of the K-weighting filter: the "RLB" high pass at ~38 Hz.
    #[allow(non_snake_case)]
    pub fn high_pass(rate: f64) -> Self {
        let f0 = 38.13547087602444;
        let Q = 0.5003270373238773;

        let K = f64::tan(std::f64::consts::PI * f0 / rate);
        let a0 = 1.0 + K / Q + K * K;

        Biquad {
            b: [1.0, -2.0, 1.0],
            a: [1.0, 2.0 * (K * K - 1.0) / a0, (1.0 - K / Q + K * K) / a0],
        }
    }

    /// Runs one sample through the section (direct form I).
    ///
    /// `state` holds `[x[n-1], x[n-2], y[n-1], y[n-2]]`.
    #[inline(always)]
    fn run(&self, state: &mut [f64; 4], x: f64) -> f64 {
        let y = self.b[0] * x + self.b[1] * state[0] + self.b[2] * state[1]
            - self.a[1] * state[2]
            - self.a[2] * state[3];

        state[1] = state[0];
        state[0] = x;
        state[3] = state[2];
        state[2] = y;

        y
    }
}

/// Delay lines of both K-weighting stages for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState {
    pub shelf: [f64; 4],
    pub high_pass: [f64; 4],
}

impl FilterState {
    fn flush_denormals(&mut self) {
        for v in self.shelf.iter_mut().chain(self.high_pass.iter_mut()) {
            if v.abs() < std::f64::EPSILON {
                *v = 0.0;
            }
        }
    }
}

/// BS.1770 K-weighting filter for all channels of a stream.
pub struct Filter {
    channels: u32,
    /// Stage 1 coefficients.
    shelf: Biquad,
    /// Stage 2 coefficients.
    high_pass: Biquad,
    /// One filter state per channel.
    filter_state: Box<[FilterState]>,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("channels", &self.channels)
            .field("shelf", &self.shelf)
            .field("high_pass", &self.high_pass)
            .field("filter_state", &self.filter_state)
            .finish()
    }
}

impl Filter {
    pub fn new(rate: u32, channels: u32) -> Self {
        assert!(rate > 0);
        assert!(channels > 0);

        Filter {
            channels,
            shelf: Biquad::high_shelf(rate as f64),
            high_pass: Biquad::high_pass(rate as f64),
            filter_state: vec![FilterState::default(); channels as usize].into_boxed_slice(),
        }
    }

    #[cfg(any(test, feature = "internal-tests"))]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    #[cfg(any(test, feature = "internal-tests"))]
    pub fn coefficients(&self) -> (&Biquad, &Biquad) {
        (&self.shelf, &self.high_pass)
    }

    #[cfg(any(test, feature = "internal-tests"))]
    pub fn state(&self) -> &[FilterState] {
        &self.filter_state
    }

    pub fn reset(&mut self) {
        self.filter_state.fill(FilterState::default());
    }

    /// K-weights a single sample of `channel`.
    #[cfg(any(test, feature = "internal-tests"))]
    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f64) -> f64 {
        let state = &mut self.filter_state[channel];
        let y = self.shelf.run(&mut state.shelf, x);
        self.high_pass.run(&mut state.high_pass, y)
    }

    /// K-weights all samples of `src` and adds the squared output of each channel to the
    /// corresponding entry of `sums`.
    pub fn process<'a, T: Sample + 'a, S: Samples<'a, T>>(&mut self, src: &S, sums: &mut [f64]) {
        assert!(src.channels() == self.channels as usize);
        assert!(sums.len() == self.channels as usize);
        assert!(self.filter_state.len() == self.channels as usize);

        ftz::with_ftz(|_ftz| {
            let Filter {
                ref mut filter_state,
                ref shelf,
                ref high_pass,
                ..
            } = *self;

            for (c, (state, sum)) in
                Iterator::zip(filter_state.iter_mut(), sums.iter_mut()).enumerate()
            {
                let mut channel_sum = 0.0;

                src.foreach_sample(c, |sample| {
                    let y = shelf.run(&mut state.shelf, sample.to_f64());
                    let y = high_pass.run(&mut state.high_pass, y);
                    channel_sum += y * y;
                });

                *sum += channel_sum;
            }
        });
    }

    /// Flushes tiny filter state values to zero on targets without hardware flush-to-zero.
    ///
    /// Must only be called at stream positions that do not depend on how the input was chunked,
    /// otherwise the result would differ between chunkings.
    pub fn flush_denormals(&mut self) {
        if ftz::AVAILABLE {
            return;
        }

        for state in &mut *self.filter_state {
            state.flush_denormals();
        }
    }
}

#[cfg(all(
    any(target_arch = "x86", target_arch = "x86_64"),
    target_feature = "sse2"
))]
mod ftz {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::{_mm_getcsr, _mm_setcsr, _MM_FLUSH_ZERO_ON};
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::{_mm_getcsr, _mm_setcsr, _MM_FLUSH_ZERO_ON};

    pub const AVAILABLE: bool = true;

    pub struct Ftz(u32);

    impl Ftz {
        unsafe fn new() -> Self {
            let csr = _mm_getcsr();
            _mm_setcsr(csr | _MM_FLUSH_ZERO_ON);
            Ftz(csr)
        }
    }

    impl Drop for Ftz {
        fn drop(&mut self) {
            unsafe {
                _mm_setcsr(self.0);
            }
        }
    }

    pub fn with_ftz<F: FnOnce(Option<&Ftz>) -> T, T>(func: F) -> T {
        // Safety: MXCSR is unset in any case when Ftz goes out of scope and the closure also can't
        // mem::forget() it to prevent running the Drop impl.
        unsafe {
            let ftz = Ftz::new();
            func(Some(&ftz))
        }
    }
}

#[cfg(not(any(all(
    any(target_arch = "x86", target_arch = "x86_64"),
    target_feature = "sse2"
)),))]
mod ftz {
    pub const AVAILABLE: bool = false;

    pub enum Ftz {}

    pub fn with_ftz<F: FnOnce(Option<&Ftz>) -> T, T>(func: F) -> T {
        func(None)
    }
}
