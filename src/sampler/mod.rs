// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Audio sampling and resampling for SID output.
//!
//! Converts the ~1 MHz emulation clock to a host sample rate, from fast
//! decimation up to Kaiser-windowed sinc resampling. The resampling
//! implementation follows "A Flexible Sampling-Rate Conversion Method" by
//! J.O. Smith and P. Gosset: shifted FIR tables are precomputed per
//! sub-sample phase, reducing each output sample to one or two dot products
//! over a ring buffer of clock-rate samples.

// Allow cast_lossless: intentional i16->i32 casts for audio sample processing
#![allow(clippy::cast_lossless)]

#[cfg(feature = "alloc")]
mod fir;
mod soft_clip;
#[cfg(feature = "alloc")]
mod two_pass;

pub use soft_clip::soft_clip;

use crate::synth::Synth;
use crate::SamplingError;

use wide::{i16x16, i32x8};

// FIR table resolutions for 16-bit accuracy. Interpolated lookup has an
// error bound of 1.234/L^2 and needs L >= 285 tables; direct lookup is
// bounded by 0.7854/L + 0.4113/L^2 and needs L >= 51473. See
// http://www-ccrma.stanford.edu/~jos/resample/Choice_Table_Size.html
const FIR_RES_FAST: i32 = 51473;
const FIR_RES_INTERPOLATE: i32 = 285;
const FIR_SHIFT: i32 = 15;
const RING_SIZE: usize = 16384;
const RING_MASK: usize = RING_SIZE - 1;

const FIXP_SHIFT: i32 = 16;
const FIXP_MASK: i32 = 0xffff;

/// Audio sampling/resampling method.
///
/// Controls how SID output is converted to the target sample rate.
/// Methods requiring heap allocation are gated behind the `alloc` feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SamplingMethod {
    /// Simple decimation - fastest but lowest quality.
    #[default]
    Fast,
    /// Linear interpolation between samples.
    Interpolate,
    /// High-quality Kaiser-windowed sinc resampling (requires `alloc`).
    #[cfg(feature = "alloc")]
    Resample,
    /// Faster sinc resampling with larger lookup tables (requires `alloc`).
    #[cfg(feature = "alloc")]
    ResampleFast,
    /// Two-pass sinc resampling for efficiency at high ratios (requires
    /// `alloc`).
    #[cfg(feature = "alloc")]
    ResampleTwoPass,
}

/// Audio sampler wrapping the SID synthesizer and resamplers.
#[derive(Clone)]
pub struct Sampler {
    // Dependencies
    /// Underlying SID synthesizer.
    pub synth: Synth,
    // Configuration
    cycles_per_sample: u32,
    #[cfg(feature = "alloc")]
    fir: fir::Fir,
    #[cfg(feature = "alloc")]
    two_pass: Option<two_pass::TwoPassResampler>,
    sampling_method: SamplingMethod,
    // Runtime State
    buffer: [i16; RING_SIZE * 2],
    index: usize,
    offset: i32,
    prev_sample: i16,
}

impl Sampler {
    /// Construct a sampler around a SID synthesizer.
    pub fn new(synth: Synth) -> Self {
        Self {
            synth,
            cycles_per_sample: 0,
            #[cfg(feature = "alloc")]
            fir: fir::Fir::default(),
            #[cfg(feature = "alloc")]
            two_pass: None,
            sampling_method: SamplingMethod::Fast,
            buffer: [0; RING_SIZE * 2],
            index: 0,
            offset: 0,
            prev_sample: 0,
        }
    }

    /// Set sampling method and clock/sample frequencies.
    ///
    /// # Errors
    /// Returns `SamplingError::ZeroClockFreq` if `clock_freq` is zero.
    /// Returns `SamplingError::ZeroSampleFreq` if `sample_freq` is zero.
    pub fn set_parameters(
        &mut self,
        method: SamplingMethod,
        clock_freq: u32,
        sample_freq: u32,
    ) -> Result<(), SamplingError> {
        if clock_freq == 0 {
            return Err(SamplingError::ZeroClockFreq);
        }
        if sample_freq == 0 {
            return Err(SamplingError::ZeroSampleFreq);
        }
        self.cycles_per_sample =
            (clock_freq as f64 / sample_freq as f64 * (1 << FIXP_SHIFT) as f64 + 0.5) as u32;
        self.sampling_method = method;

        #[cfg(feature = "alloc")]
        {
            self.two_pass = None;
            if matches!(method, SamplingMethod::Resample | SamplingMethod::ResampleFast) {
                fir::init_fir(
                    &mut self.fir,
                    method,
                    clock_freq as f64,
                    sample_freq as f64,
                    -1.0,
                    0.97,
                );
            }
            if method == SamplingMethod::ResampleTwoPass {
                self.two_pass = Some(two_pass::TwoPassResampler::new(
                    clock_freq as f64,
                    sample_freq as f64,
                ));
            }
        }

        self.buffer = [0; RING_SIZE * 2];
        self.index = 0;
        self.offset = 0;
        self.prev_sample = 0;
        Ok(())
    }

    /// Reset sampler and underlying synth state.
    pub fn reset(&mut self) {
        self.synth.reset();
        self.index = 0;
        self.offset = 0;
        self.prev_sample = 0;
        #[cfg(feature = "alloc")]
        if let Some(ref mut two_pass) = self.two_pass {
            two_pass.reset();
        }
    }

    /// Clock the sampler for `delta` SID cycles, writing interleaved audio
    /// samples. Returns `(samples_written, cycles_remaining)`.
    #[inline]
    pub fn clock(&mut self, delta: u32, buffer: &mut [i16], interleave: usize) -> (usize, u32) {
        match self.sampling_method {
            SamplingMethod::Fast => self.clock_fast(delta, buffer, interleave),
            SamplingMethod::Interpolate => self.clock_interpolate(delta, buffer, interleave),
            #[cfg(feature = "alloc")]
            SamplingMethod::Resample => self.clock_resample_interpolate(delta, buffer, interleave),
            #[cfg(feature = "alloc")]
            SamplingMethod::ResampleFast => self.clock_resample_fast(delta, buffer, interleave),
            #[cfg(feature = "alloc")]
            SamplingMethod::ResampleTwoPass => {
                self.clock_resample_two_pass(delta, buffer, interleave)
            }
        }
    }

    /// Nearest-neighbor (decimation) sampling.
    #[inline]
    fn clock_fast(
        &mut self,
        mut delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let frames = buffer.len() / interleave.max(1);
        let mut index = 0;
        loop {
            let next_sample_offset = self.get_next_sample_offset();
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > delta || index >= frames {
                break;
            }
            self.synth.clock_delta(delta_sample);
            delta -= delta_sample;
            buffer[index * interleave] = self.synth.output();
            index += 1;
            self.update_sample_offset(next_sample_offset);
        }
        if delta > 0 && index < frames {
            self.synth.clock_delta(delta);
            self.offset -= (delta as i32) << FIXP_SHIFT;
            (index, 0)
        } else {
            (index, delta)
        }
    }

    /// Linear interpolation sampling.
    #[inline]
    fn clock_interpolate(
        &mut self,
        mut delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let frames = buffer.len() / interleave.max(1);
        let mut index = 0;
        loop {
            let next_sample_offset = self.get_next_sample_offset();
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > delta || index >= frames {
                break;
            }
            for _ in 0..(delta_sample - 1) {
                self.prev_sample = self.synth.output();
                self.synth.clock();
            }
            delta -= delta_sample;
            let sample_now = self.synth.output();
            buffer[index * interleave] = self.prev_sample
                + ((self.offset * (sample_now - self.prev_sample) as i32) >> FIXP_SHIFT) as i16;
            index += 1;
            self.prev_sample = sample_now;
            self.update_sample_offset(next_sample_offset);
        }
        if delta > 0 && index < frames {
            for _ in 0..(delta - 1) {
                self.synth.clock();
            }
            self.offset -= (delta as i32) << FIXP_SHIFT;
            (index, 0)
        } else {
            (index, delta)
        }
    }

    /// High-quality sinc resampling with linear interpolation between
    /// adjacent FIR phase tables.
    #[cfg(feature = "alloc")]
    #[inline]
    fn clock_resample_interpolate(
        &mut self,
        mut delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let frames = buffer.len() / interleave.max(1);
        let mut index = 0;
        loop {
            let next_sample_offset = self.get_next_sample_offset2();
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > delta || index >= frames {
                break;
            }

            for _ in 0..delta_sample {
                self.clock_ring_buffer();
            }
            delta -= delta_sample;
            self.update_sample_offset2(next_sample_offset);

            let fir_offset_1 = (self.offset * self.fir.res) >> FIXP_SHIFT;
            let fir_offset_rmd = (self.offset * self.fir.res) & FIXP_MASK;
            let fir_start_1 = (fir_offset_1 * self.fir.n) as usize;
            let fir_end_1 = fir_start_1 + self.fir.n as usize;
            let sample_start_1 = (self.index as i32 - self.fir.n + RING_SIZE as i32) as usize;
            let sample_end_1 = sample_start_1 + self.fir.n as usize;

            // Convolve against the phase table at the current offset.
            let v1 = compute_convolution_fir(
                &self.buffer[sample_start_1..sample_end_1],
                &self.fir.data[fir_start_1..fir_end_1],
            );

            // The adjacent phase table; wrapping to phase zero shifts the
            // sample window by one.
            let mut fir_offset_2 = fir_offset_1 + 1;
            let mut sample_start_2 = sample_start_1;
            if fir_offset_2 == self.fir.res {
                fir_offset_2 = 0;
                sample_start_2 -= 1;
            }
            let fir_start_2 = (fir_offset_2 * self.fir.n) as usize;
            let fir_end_2 = fir_start_2 + self.fir.n as usize;
            let sample_end_2 = sample_start_2 + self.fir.n as usize;

            let v2 = compute_convolution_fir(
                &self.buffer[sample_start_2..sample_end_2],
                &self.fir.data[fir_start_2..fir_end_2],
            );

            // Interpolate between the two phase tables.
            let mut v = v1 + ((fir_offset_rmd * (v2 - v1)) >> FIXP_SHIFT);
            v >>= FIR_SHIFT;

            // Soft clip for smooth saturation near 16-bit boundaries.
            buffer[index * interleave] = soft_clip(v);
            index += 1;
        }
        if delta > 0 && index < frames {
            for _ in 0..delta {
                self.clock_ring_buffer();
            }
            self.offset -= (delta as i32) << FIXP_SHIFT;
            (index, 0)
        } else {
            (index, delta)
        }
    }

    /// Faster sinc resampling using larger precomputed tables (no
    /// inter-table interpolation).
    #[cfg(feature = "alloc")]
    #[inline]
    fn clock_resample_fast(
        &mut self,
        mut delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let frames = buffer.len() / interleave.max(1);
        let mut index = 0;
        loop {
            let next_sample_offset = self.get_next_sample_offset2();
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > delta || index >= frames {
                break;
            }

            for _ in 0..delta_sample {
                self.clock_ring_buffer();
            }
            delta -= delta_sample;
            self.update_sample_offset2(next_sample_offset);

            let fir_offset = (self.offset * self.fir.res) >> FIXP_SHIFT;
            let fir_start = (fir_offset * self.fir.n) as usize;
            let fir_end = fir_start + self.fir.n as usize;
            let sample_start = (self.index as i32 - self.fir.n + RING_SIZE as i32) as usize;
            let sample_end = sample_start + self.fir.n as usize;

            let mut v = compute_convolution_fir(
                &self.buffer[sample_start..sample_end],
                &self.fir.data[fir_start..fir_end],
            );
            v >>= FIR_SHIFT;

            buffer[index * interleave] = soft_clip(v);
            index += 1;
        }
        if delta > 0 && index < frames {
            for _ in 0..delta {
                self.clock_ring_buffer();
            }
            self.offset -= (delta as i32) << FIXP_SHIFT;
            (index, 0)
        } else {
            (index, delta)
        }
    }

    /// Two-pass sinc resampling for large rate ratios.
    #[cfg(feature = "alloc")]
    #[inline]
    fn clock_resample_two_pass(
        &mut self,
        delta: u32,
        buffer: &mut [i16],
        interleave: usize,
    ) -> (usize, u32) {
        let frames = buffer.len() / interleave.max(1);
        let mut index = 0;

        // Clock the SID and feed samples through the two-pass resampler.
        for cycle in 0..delta {
            if index >= frames {
                return (index, delta - cycle);
            }

            self.synth.clock();
            let sample = self.synth.output() as i32;

            if let Some(ref mut two_pass) = self.two_pass {
                if two_pass.input(sample) {
                    buffer[index * interleave] = soft_clip(two_pass.output());
                    index += 1;
                }
            }
        }

        (index, 0)
    }

    /// Clock the synth one cycle and record the output in the (duplicated)
    /// ring buffer.
    #[cfg(feature = "alloc")]
    #[inline]
    fn clock_ring_buffer(&mut self) {
        self.synth.clock();
        let output = self.synth.output();
        self.buffer[self.index] = output;
        self.buffer[self.index + RING_SIZE] = output;
        self.index = (self.index + 1) & RING_MASK;
    }

    #[inline]
    const fn get_next_sample_offset(&self) -> i32 {
        self.offset + self.cycles_per_sample as i32 + (1 << (FIXP_SHIFT - 1))
    }

    #[inline]
    const fn get_next_sample_offset2(&self) -> i32 {
        self.offset + self.cycles_per_sample as i32
    }

    #[inline]
    const fn update_sample_offset(&mut self, next_sample_offset: i32) {
        self.offset = (next_sample_offset & FIXP_MASK) - (1 << (FIXP_SHIFT - 1));
    }

    #[inline]
    const fn update_sample_offset2(&mut self, next_sample_offset: i32) {
        self.offset = next_sample_offset & FIXP_MASK;
    }
}

/// Convolution of a sample window with a FIR phase table.
///
/// Uses the `wide` crate for portable SIMD (emits vpmaddwd on AVX2); the
/// scalar remainder and short windows fall back to
/// [`compute_convolution_fir_fallback`].
#[inline]
pub fn compute_convolution_fir(sample: &[i16], fir: &[i16]) -> i32 {
    let len = sample.len().min(fir.len());
    let mut ss = &sample[..len];
    let mut fs = &fir[..len];

    // 4 accumulators hide instruction latency.
    let mut v1 = i32x8::ZERO;
    let mut v2 = i32x8::ZERO;
    let mut v3 = i32x8::ZERO;
    let mut v4 = i32x8::ZERO;

    while ss.len() >= 64 {
        let sv1 = load_lanes(&ss[0..16]);
        let sv2 = load_lanes(&ss[16..32]);
        let sv3 = load_lanes(&ss[32..48]);
        let sv4 = load_lanes(&ss[48..64]);
        let fv1 = load_lanes(&fs[0..16]);
        let fv2 = load_lanes(&fs[16..32]);
        let fv3 = load_lanes(&fs[32..48]);
        let fv4 = load_lanes(&fs[48..64]);

        v1 += sv1.dot(fv1);
        v2 += sv2.dot(fv2);
        v3 += sv3.dot(fv3);
        v4 += sv4.dot(fv4);

        ss = &ss[64..];
        fs = &fs[64..];
    }

    let combined = (v1 + v2 + v3 + v4).to_array();
    combined.iter().sum::<i32>() + compute_convolution_fir_fallback(ss, fs)
}

#[inline]
fn load_lanes(chunk: &[i16]) -> i16x16 {
    let mut lanes = [0i16; 16];
    lanes.copy_from_slice(&chunk[..16]);
    i16x16::from(lanes)
}

/// Scalar convolution; LLVM auto-vectorizes this well on SSE/NEON.
#[inline]
pub fn compute_convolution_fir_fallback(sample: &[i16], fir: &[i16]) -> i32 {
    let len = sample.len().min(fir.len());
    sample[..len]
        .iter()
        .zip(&fir[..len])
        .fold(0, |sum, (&s, &f)| sum + (s as i32 * f as i32))
}
