// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! C64 audio output stage.
//!
//! The output stage consists of two first-order RC networks: a low-pass
//! filter with a 3-dB frequency of ~16kHz followed by a DC-blocking
//! high-pass. A high-pass cutoff of the nominal 1.6Hz would require the
//! filter state to settle for a very long time, so a low but not entirely
//! unreasonable load of 1kOhm is assumed instead, yielding a 16Hz cutoff.
//! The BJT emitter follower between the stages is modeled as a unity-gain
//! buffer.
//!
//! The two cascaded poles are discretized with zero order hold,
//! vlp' = vlp + (1 - e^(-w0lp*T))*(vi - vlp), and likewise for the
//! high-pass state. The multiplier/shift pairs trade 4 bits of cutoff
//! accuracy for 27 bits of state accuracy, which matters because the two
//! cutoff frequencies are more than five orders of magnitude apart.
//! Coefficients are kept for a single-cycle step and for a MAX_CYCLES step
//! so long windows advance in large chunks.

#[cfg(not(feature = "std"))]
use super::math::F64Ext;
use super::ChipModel;

/// Maximum mixer DC output level, removed on the bypass path:
/// ((wave DC + voice DC)*voices + mixer DC)*volume.
const MIXER_DC_6581: i32 = ((((0x800 - 0x380) + 0x800) * 0xff * 3 - 0xfff * 0xff / 18) >> 7) * 0x0f;

/// Low-pass pole: R = 10kOhm, C = 1nF -> w0 = 100000 (≈15.9kHz).
const W0_LP: f64 = 1.0 / (10e3 * 1e-9);
/// High-pass pole: Rload = 1kOhm, C = 10uF -> w0 = 100 (≈16Hz).
const W0_HP: f64 = 1.0 / (1e3 * 10e-6);

/// Default clock frequency (PAL C64).
const DEFAULT_CLOCK_FREQ: f64 = 985_248.0;

/// Chunk size for multi-cycle stepping.
const MAX_CYCLES: u32 = 10;

/// ZOH step coefficients for one time step length.
#[derive(Clone, Copy, Default)]
struct Coefficients {
    mul_lp: i32,
    shift_lp: i32,
    mul_hp: i32,
    shift_hp: i32,
}

impl Coefficients {
    /// Coefficients for a step of `t` seconds.
    ///
    /// The shift is chosen so the multiplier uses 4 significant bits,
    /// leaving 27 bits of headroom in the state update.
    fn new(t: f64) -> Self {
        let alpha_lp = 1.0 - (-W0_LP * t).exp();
        let alpha_hp = 1.0 - (-W0_HP * t).exp();
        let shift_lp = (((1 << 4) - 1) as f64 / alpha_lp).log2() as i32;
        let shift_hp = (((1 << 4) - 1) as f64 / alpha_hp).log2() as i32;
        Coefficients {
            mul_lp: (alpha_lp * (1i64 << shift_lp) as f64 + 0.5) as i32,
            shift_lp,
            mul_hp: (alpha_hp * (1i64 << shift_hp) as f64 + 0.5) as i32,
            shift_hp,
        }
    }
}

/// C64 audio output stage filter.
#[derive(Clone, Copy)]
pub struct ExternalFilter {
    // Configuration
    enabled: bool,
    mixer_dc: i32,
    /// Coefficients for a single-cycle step.
    t1: Coefficients,
    /// Coefficients for a MAX_CYCLES step.
    tmax: Coefficients,
    // Runtime State (27 bits)
    vlp: i32,
    vhp: i32,
}

impl ExternalFilter {
    /// Construct the output stage model for the given chip.
    pub fn new(chip_model: ChipModel) -> Self {
        let mixer_dc = match chip_model {
            ChipModel::Mos6581 => MIXER_DC_6581,
            ChipModel::Mos8580 => 0,
        };
        let mut filter = Self {
            enabled: true,
            mixer_dc,
            t1: Coefficients::default(),
            tmax: Coefficients::default(),
            vlp: 0,
            vhp: 0,
        };
        filter.set_clock_frequency(DEFAULT_CLOCK_FREQ);
        filter.reset();
        filter
    }

    /// Reparameterize the bypass DC level for another chip model.
    pub const fn set_chip_model(&mut self, chip_model: ChipModel) {
        self.mixer_dc = match chip_model {
            ChipModel::Mos6581 => MIXER_DC_6581,
            ChipModel::Mos8580 => 0,
        };
    }

    /// Enable or disable the external audio filter stage.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Recompute both coefficient sets for a clock frequency in Hz.
    pub fn set_clock_frequency(&mut self, frequency: f64) {
        let dt = 1.0 / frequency;
        self.t1 = Coefficients::new(dt);
        self.tmax = Coefficients::new(MAX_CYCLES as f64 * dt);
    }

    /// Clock the filter for one cycle.
    ///
    /// The high-pass state is updated from the previous low-pass state, per
    /// the cascaded ZOH model.
    #[inline]
    pub const fn clock(&mut self, vi: i32) {
        if self.enabled {
            self.step(self.t1, vi);
        } else {
            self.bypass(vi);
        }
    }

    /// Clock the filter for `delta` cycles with constant input.
    #[inline]
    pub fn clock_delta(&mut self, mut delta: u32, vi: i32) {
        if !self.enabled {
            self.bypass(vi);
            return;
        }
        while delta >= MAX_CYCLES {
            self.step(self.tmax, vi);
            delta -= MAX_CYCLES;
        }
        for _ in 0..delta {
            self.step(self.t1, vi);
        }
    }

    #[inline]
    const fn step(&mut self, c: Coefficients, vi: i32) {
        // The input can exceed 16 bits (three 20-bit voices times volume),
        // so intermediates are widened and the states saturate instead of
        // wrapping.
        let vi_scaled = (vi as i64) << 11;
        let dvhp = (c.mul_hp as i64 * (self.vlp as i64 - self.vhp as i64)) >> c.shift_hp;
        let dvlp = (c.mul_lp as i64 * (vi_scaled - self.vlp as i64)) >> c.shift_lp;
        self.vhp = self.vhp.saturating_add(dvhp as i32);
        self.vlp = self.vlp.saturating_add(dvlp as i32);
    }

    #[inline]
    const fn bypass(&mut self, vi: i32) {
        self.vlp = ((vi as i64 - self.mixer_dc as i64) << 11) as i32;
        self.vhp = 0;
    }

    /// Filter output, scaled back from the 27-bit state precision.
    #[inline]
    pub const fn output(&self) -> i32 {
        ((self.vlp as i64 - self.vhp as i64) >> 11) as i32
    }

    /// Reset the filter state to zero.
    pub const fn reset(&mut self) {
        self.vlp = 0;
        self.vhp = 0;
    }
}
