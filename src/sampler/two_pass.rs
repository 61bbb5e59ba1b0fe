// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Two-pass sinc resampler.
//!
//! Resampling straight from the ~1 MHz clock to an audio rate needs a very
//! long filter because the transition band is a tiny fraction of the input
//! bandwidth. Decimating in two stages through an intermediate frequency
//! keeps both filters short; the intermediate frequency that minimizes the
//! summed filter order is given by Laurent Ganier's formula.

use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use crate::math::F64Ext;

use super::fir::{i0, sqrt_compat};

/// Ring buffer length per pass. Each pass decimates far less than the
/// single-pass resampler, so 2048 samples of history suffice.
const RING_SIZE: usize = 2048;
const RING_MASK: usize = RING_SIZE - 1;

/// Fixed-point scale of the per-pass sample offsets (10 bits).
const FIXP_SHIFT: i32 = 10;
const FIXP_SCALE: i32 = 1 << FIXP_SHIFT;
const FIXP_MASK: i32 = FIXP_SCALE - 1;

/// Passband limit for high output rates (>44kHz).
const DEFAULT_PASSBAND: f64 = 20000.0;

/// FIR phase tables for one decimation pass.
#[derive(Clone)]
struct PassFir {
    data: Vec<i16>,
    n: i32,
    res: i32,
}

/// One decimation stage: ring buffer, fixpoint offset, and FIR tables.
#[derive(Clone)]
struct Pass {
    fir: PassFir,
    ring: Vec<i32>,
    index: usize,
    offset: i32,
    cycles_per_sample: i32,
    output: i32,
}

impl Pass {
    fn new(input_freq: f64, output_freq: f64, passband: f64) -> Self {
        Pass {
            fir: design_fir(input_freq, output_freq, passband),
            ring: alloc::vec![0i32; RING_SIZE * 2],
            index: 0,
            offset: 0,
            cycles_per_sample: (input_freq / output_freq * FIXP_SCALE as f64) as i32,
            output: 0,
        }
    }

    /// Push one input sample; returns true when a decimated output sample
    /// is ready in `self.output`.
    #[inline]
    fn input(&mut self, sample: i32) -> bool {
        // Samples are duplicated RING_SIZE apart so a convolution window
        // never has to wrap.
        self.ring[self.index] = sample;
        self.ring[self.index + RING_SIZE] = sample;
        self.index = (self.index + 1) & RING_MASK;

        let ready = self.offset < FIXP_SCALE;
        if ready {
            self.output = self.convolve(self.offset);
            self.offset += self.cycles_per_sample;
        }
        self.offset -= FIXP_SCALE;
        ready
    }

    fn reset(&mut self) {
        self.ring.iter_mut().for_each(|v| *v = 0);
        self.index = 0;
        self.offset = 0;
        self.output = 0;
    }

    /// Convolve the newest window against the two FIR phase tables
    /// bracketing the sub-cycle offset, interpolating linearly between
    /// them.
    fn convolve(&self, subcycle: i32) -> i32 {
        let taps = self.fir.n as usize;
        let mut table = (subcycle * self.fir.res) >> FIXP_SHIFT;
        let frac = (subcycle * self.fir.res) & FIXP_MASK;

        let mut window = self.index + RING_SIZE - taps;
        let v1 = dot_product(
            &self.ring[window..window + taps],
            &self.fir.data[(table * self.fir.n) as usize..],
        );

        // The next table wraps to phase zero one sample later.
        table += 1;
        if table == self.fir.res {
            table = 0;
            window += 1;
        }
        let v2 = dot_product(
            &self.ring[window..window + taps],
            &self.fir.data[(table * self.fir.n) as usize..],
        );

        v1 + ((frac * (v2 - v1)) >> FIXP_SHIFT)
    }
}

/// Two cascaded decimation passes.
#[derive(Clone)]
pub struct TwoPassResampler {
    pass1: Pass,
    pass2: Pass,
}

impl TwoPassResampler {
    pub fn new(clock_freq: f64, sample_freq: f64) -> Self {
        let passband = passband_freq(sample_freq);
        let intermediate = intermediate_freq(clock_freq, sample_freq, passband);
        TwoPassResampler {
            pass1: Pass::new(clock_freq, intermediate, passband),
            pass2: Pass::new(intermediate, sample_freq, passband),
        }
    }

    /// Feed one clock-rate sample; returns true when a final output sample
    /// is available from [`Self::output`].
    #[inline]
    pub fn input(&mut self, sample: i32) -> bool {
        self.pass1.input(sample) && self.pass2.input(self.pass1.output)
    }

    /// Latest resampled output value.
    #[inline]
    pub const fn output(&self) -> i32 {
        self.pass2.output
    }

    /// Clear both ring buffers and offsets.
    pub fn reset(&mut self) {
        self.pass1.reset();
        self.pass2.reset();
    }
}

/// Passband for the output rate: the full audible range at high rates,
/// 45% of the rate below 44kHz.
fn passband_freq(sample_freq: f64) -> f64 {
    if sample_freq > 44000.0 {
        DEFAULT_PASSBAND
    } else {
        sample_freq * 0.45
    }
}

/// Intermediate frequency minimizing the summed filter order of the two
/// stages (Laurent Ganier).
fn intermediate_freq(clock_freq: f64, sample_freq: f64, passband: f64) -> f64 {
    2.0 * passband
        + sqrt_compat(2.0 * passband * clock_freq * (sample_freq - 2.0 * passband) / sample_freq)
}

/// Kaiser-windowed sinc FIR for one pass, following the same kaiserord
/// sizing as the single-pass resampler but with a doubled transition band.
fn design_fir(input_freq: f64, output_freq: f64, passband: f64) -> PassFir {
    let pi = core::f64::consts::PI;
    let cycles_per_sample = input_freq / output_freq;
    let samples_per_cycle = output_freq / input_freq;

    // 16-bit target: -96dB stopband attenuation.
    let atten = -20.0_f64 * (1.0 / (1_i32 << 16) as f64).log10();
    let transition = (1.0 - 2.0 * passband / output_freq) * pi * 2.0;

    let beta = 0.1102_f64 * (atten - 8.7);
    let i0_beta = i0(beta);

    // Even order, odd length: sinc is symmetric about x = 0.
    let mut order = ((atten - 7.95) / (2.285 * transition) + 0.5) as i32;
    order += order & 1;
    let mut taps = (order as f64 * cycles_per_sample) as i32 + 1;
    taps |= 1;

    // Resolution bounded by the interpolated lookup error, err < 1.234/L^2.
    let res = (sqrt_compat(1.234_f64 * (1 << 16) as f64) * samples_per_cycle).ceil() as i32;

    let mut data = alloc::vec![0i16; (taps * res) as usize];
    let half_taps = taps / 2;
    // i16 range plus gain normalization for the decimation ratio.
    let scale = 32768.0 * samples_per_cycle;

    for phase in 0..res {
        let phase_offset = phase as f64 / res as f64 + half_taps as f64;
        for tap in 0..taps {
            let x = tap as f64 - phase_offset;
            let pos = x / half_taps as f64;
            let kaiser = if pos.abs() < 1.0 {
                i0(beta * sqrt_compat(1.0 - pos * pos)) / i0_beta
            } else {
                0.0
            };
            let sinc_arg = x * samples_per_cycle * pi;
            let sinc = if sinc_arg.abs() >= 1e-8 {
                sinc_arg.sin() / sinc_arg
            } else {
                1.0
            };
            data[(phase * taps + tap) as usize] = (scale * sinc * kaiser) as i16;
        }
    }

    PassFir {
        data,
        n: taps,
        res,
    }
}

/// Dot product of i32 samples with i16 coefficients, with rounding.
#[inline]
fn dot_product(samples: &[i32], coeffs: &[i16]) -> i32 {
    let mut acc: i64 = 0;
    for (&sample, &coeff) in samples.iter().zip(coeffs.iter()) {
        acc += sample as i64 * coeff as i64;
    }
    ((acc + (1 << 14)) >> 15) as i32
}
