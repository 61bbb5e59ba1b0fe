// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Kaiser-windowed sinc FIR design for the single-pass resamplers.
//!
//! One FIR table is computed per sub-sample phase so that a resampled
//! output sample is a single table-driven convolution over the ring buffer
//! of clock-rate samples.

use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use crate::math::F64Ext;

use super::{SamplingMethod, FIR_RES_FAST, FIR_RES_INTERPOLATE, FIR_SHIFT};

/// Default passband limit for resampling (Hz).
pub const DEFAULT_PASS_FREQ: f64 = 20000.0;

/// Per-phase FIR coefficient tables.
#[derive(Clone, Default)]
pub struct Fir {
    /// `res` tables of `n` taps each, laid out contiguously.
    pub data: Vec<i16>,
    /// Taps per table.
    pub n: i32,
    /// Number of phase tables.
    pub res: i32,
}

/// 0th order modified Bessel function of the first kind, by power series.
pub fn i0(x: f64) -> f64 {
    const TOLERANCE: f64 = 1e-6;
    let halfx = x / 2.0;
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut n = 1;
    loop {
        let factor = halfx / n as f64;
        n += 1;
        term *= factor * factor;
        sum += term;
        if term < TOLERANCE * sum {
            return sum;
        }
    }
}

/// Square root that works in both std and no_std builds.
#[cfg(feature = "std")]
pub fn sqrt_compat(value: f64) -> f64 {
    value.sqrt()
}

#[cfg(not(feature = "std"))]
pub fn sqrt_compat(value: f64) -> f64 {
    libm::sqrt(value)
}

/// Normalized sinc, sin(x)/x with the removable singularity filled in.
#[inline]
fn sinc(x: f64) -> f64 {
    if x.abs() >= 1e-6 {
        x.sin() / x
    } else {
        1.0
    }
}

/// Design the FIR tables for resampling `clock_freq` down to `sample_freq`.
///
/// A negative `pass_freq` selects the default passband: 0.9 of the Nyquist
/// frequency for sample rates below ~44.1kHz, 20kHz above.
pub fn init_fir(
    fir: &mut Fir,
    sampling_method: SamplingMethod,
    clock_freq: f64,
    sample_freq: f64,
    mut pass_freq: f64,
    filter_scale: f64,
) {
    let pi = core::f64::consts::PI;
    let samples_per_cycle = sample_freq / clock_freq;
    let cycles_per_sample = clock_freq / sample_freq;

    if pass_freq < 0.0 {
        pass_freq = DEFAULT_PASS_FREQ;
        if 2.0 * pass_freq / sample_freq >= 0.9 {
            pass_freq = 0.9 * sample_freq / 2.0;
        }
    }

    // 16-bit output requires -96dB stopband attenuation.
    let atten = -20.0_f64 * (1.0 / (1_i32 << 16) as f64).log10();
    // The remaining bandwidth is allocated to the transition band, with the
    // cutoff midway through it.
    let dw = (1.0_f64 - 2.0 * pass_freq / sample_freq) * pi;
    let wc = (2.0_f64 * pass_freq / sample_freq + 1.0) * pi / 2.0;

    // Kaiser window shape and filter order per the kaiserord estimate
    // (MATLAB Signal Processing Toolbox). The order is the number of zero
    // crossings and must be even; the filter length must be odd, both
    // because sinc is symmetric about x = 0.
    let beta = 0.1102_f64 * (atten - 8.7);
    let i0_beta = i0(beta);

    let mut order = ((atten - 7.95) / (2.285 * dw) + 0.5) as i32;
    order += order & 1;

    fir.n = (order as f64 * cycles_per_sample) as i32 + 1;
    fir.n |= 1;

    // Table resolution is clamped to a power of two so the fixpoint sample
    // offset maps onto whole tables.
    let res = match sampling_method {
        SamplingMethod::Resample => FIR_RES_INTERPOLATE,
        _ => FIR_RES_FAST,
    };
    let bits = ((res as f64 / cycles_per_sample).ln() / 2.0_f64.ln()).ceil() as i32;
    fir.res = 1 << bits;

    fir.data.clear();
    fir.data.resize((fir.n * fir.res) as usize, 0);

    // One sinc table per sub-sample phase, weighted by the Kaiser window.
    let half_taps = fir.n / 2;
    for phase in 0..fir.res {
        let table_center = phase * fir.n + half_taps;
        let phase_offset = phase as f64 / fir.res as f64;

        for tap in -half_taps..=half_taps {
            let jx = tap as f64 - phase_offset;
            let wt = wc * jx / cycles_per_sample;
            let pos = jx / half_taps as f64;
            let kaiser = if pos.abs() <= 1.0 {
                i0(beta * sqrt_compat(1.0 - pos * pos)) / i0_beta
            } else {
                0.0
            };
            let val = (1_i32 << FIR_SHIFT) as f64 * filter_scale * samples_per_cycle * wc / pi
                * sinc(wt)
                * kaiser;
            fir.data[(table_center + tap) as usize] = (val + 0.5) as i16;
        }
    }
}
