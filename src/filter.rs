// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![allow(clippy::cast_lossless)]

use core::f64;

use super::spline::{interpolate, Point, PointPlotter};
use super::ChipModel;

// The 11-bit FC register maps to the filter cutoff frequency through an
// R-2R ladder DAC and the surrounding analog circuit. The mapping has been
// determined by measuring the bandpass output at full resonance on real
// chips; it is specified here as spline control points and evaluated into a
// 2048-entry lookup table at construction.
//
// NB! Cutoff frequency characteristics may vary; two particular Commodore
// 64s have been modeled.
const F0_POINTS_6581: [Point; 31] = [
    //          FC        f          FCHI FCLO
    // -----------------------------------------
    Point { x: 0.0, y: 220.0 },     // 0x00      - repeated end point
    Point { x: 0.0, y: 220.0 },     // 0x00
    Point { x: 128.0, y: 230.0 },   // 0x10
    Point { x: 256.0, y: 250.0 },   // 0x20
    Point { x: 384.0, y: 300.0 },   // 0x30
    Point { x: 512.0, y: 420.0 },   // 0x40
    Point { x: 640.0, y: 780.0 },   // 0x50
    Point { x: 768.0, y: 1600.0 },  // 0x60
    Point { x: 832.0, y: 2300.0 },  // 0x68
    Point { x: 896.0, y: 3200.0 },  // 0x70
    Point { x: 960.0, y: 4300.0 },  // 0x78
    Point { x: 992.0, y: 5000.0 },  // 0x7c
    Point { x: 1008.0, y: 5400.0 }, // 0x7e
    Point { x: 1016.0, y: 5700.0 }, // 0x7f
    Point { x: 1023.0, y: 6000.0 }, // 0x7f 0x07
    Point { x: 1023.0, y: 6000.0 }, // 0x7f 0x07 - discontinuity
    Point { x: 1024.0, y: 4600.0 }, // 0x80      -
    Point { x: 1024.0, y: 4600.0 }, // 0x80
    Point { x: 1032.0, y: 4800.0 }, // 0x81
    Point { x: 1056.0, y: 5300.0 }, // 0x84
    Point { x: 1088.0, y: 6000.0 }, // 0x88
    Point { x: 1120.0, y: 6600.0 }, // 0x8c
    Point { x: 1152.0, y: 7200.0 }, // 0x90
    Point { x: 1280.0, y: 9500.0 }, // 0xa0
    Point { x: 1408.0, y: 12000.0 }, // 0xb0
    Point { x: 1536.0, y: 14500.0 }, // 0xc0
    Point { x: 1664.0, y: 16000.0 }, // 0xd0
    Point { x: 1792.0, y: 17100.0 }, // 0xe0
    Point { x: 1920.0, y: 17700.0 }, // 0xf0
    Point { x: 2047.0, y: 18000.0 }, // 0xff 0x07
    Point { x: 2047.0, y: 18000.0 }, // 0xff 0x07 - repeated end point
];

const F0_POINTS_8580: [Point; 19] = [
    Point { x: 0.0, y: 0.0 },       // 0x00      - repeated end point
    Point { x: 0.0, y: 0.0 },       // 0x00
    Point { x: 128.0, y: 800.0 },   // 0x10
    Point { x: 256.0, y: 1600.0 },  // 0x20
    Point { x: 384.0, y: 2500.0 },  // 0x30
    Point { x: 512.0, y: 3300.0 },  // 0x40
    Point { x: 640.0, y: 4100.0 },  // 0x50
    Point { x: 768.0, y: 4800.0 },  // 0x60
    Point { x: 896.0, y: 5600.0 },  // 0x70
    Point { x: 1024.0, y: 6500.0 }, // 0x80
    Point { x: 1152.0, y: 7500.0 }, // 0x90
    Point { x: 1280.0, y: 8400.0 }, // 0xa0
    Point { x: 1408.0, y: 9200.0 }, // 0xb0
    Point { x: 1536.0, y: 9800.0 }, // 0xc0
    Point { x: 1664.0, y: 10500.0 }, // 0xd0
    Point { x: 1792.0, y: 11000.0 }, // 0xe0
    Point { x: 1920.0, y: 11700.0 }, // 0xf0
    Point { x: 2047.0, y: 12500.0 }, // 0xff 0x07
    Point { x: 2047.0, y: 12500.0 }, // 0xff 0x07 - repeated end point
];

/// Mixer DC offset at zero volume input, isolated to keep the unfiltered
/// path centered: -0xfff*0xff/18 scaled from 20 to 13 bits.
const MIXER_DC: i32 = (-0xfff * 0xff / 18) >> 7;

/// Minimum Q factor (~1/sqrt(2), critically damped).
const Q_MIN: f64 = 0.707;

/// Maximum cutoff frequency for 1-cycle filter stability (Hz).
const F0_MAX_1CYCLE: f64 = 16000.0;

/// Maximum cutoff frequency for delta-cycle filter stability (Hz).
const F0_MAX_DELTA: f64 = 4000.0;

/// Fixed-point multiplier for the 1MHz clock (2^20 / 1_000_000).
const FIXP_SCALE: f64 = 1.048_576;

/// Routes voices into or around the filter based on the filt register.
///
/// Returns `(filtered_input, non_filtered_output)`.
/// The 16-case match is expanded for performance (avoids bit testing
/// overhead).
#[inline]
pub const fn route_voices(filt: u8, v1: i32, v2: i32, v3: i32, ext: i32) -> (i32, i32) {
    match filt {
        0x0 => (0, v1 + v2 + v3 + ext),
        0x1 => (v1, v2 + v3 + ext),
        0x2 => (v2, v1 + v3 + ext),
        0x3 => (v1 + v2, v3 + ext),
        0x4 => (v3, v1 + v2 + ext),
        0x5 => (v1 + v3, v2 + ext),
        0x6 => (v2 + v3, v1 + ext),
        0x7 => (v1 + v2 + v3, ext),
        0x8 => (ext, v1 + v2 + v3),
        0x9 => (v1 + ext, v2 + v3),
        0xa => (v2 + ext, v1 + v3),
        0xb => (v1 + v2 + ext, v3),
        0xc => (v3 + ext, v1 + v2),
        0xd => (v1 + v3 + ext, v2),
        0xe => (v2 + v3 + ext, v1),
        0xf => (v1 + v2 + v3 + ext, 0),
        _ => (0, v1 + v2 + v3 + ext),
    }
}

/// Mixes filter taps based on the hp_bp_lp mode bits of MODE_VOL.
#[inline]
pub const fn mix_filter_output(vhp: i32, vbp: i32, vlp: i32, hp_bp_lp: u8) -> i32 {
    match hp_bp_lp {
        0x0 => 0,
        0x1 => vlp,
        0x2 => vbp,
        0x3 => vlp + vbp,
        0x4 => vhp,
        0x5 => vlp + vhp,
        0x6 => vbp + vhp,
        0x7 => vlp + vbp + vhp,
        _ => 0,
    }
}

/// SID multimode filter, modeled as a two-integrator-loop biquad - per Bob
/// Yannes the actual circuit in the chip, built from NMOS inverters biased
/// into quasi-linear operation rather than true op-amps.
///
/// Vhp is the summer output, Vbp the first integrator, Vlp the second; an
/// extra inverter in the bandpass feedback keeps output levels independent
/// of Q, matching measurements of real chips. Emulation accuracy is
/// excellent except when high resonance meets high sustain levels, where
/// the real chip's stages leave their linear region; the discrepancy shows
/// up mostly in amplitude, not timbre.
#[derive(Clone)]
pub struct Filter {
    // Configuration
    chip_model: ChipModel,
    enabled: bool,
    fc: u16,
    filt: u8,
    res: u8,
    /// Filter curve parameter: 0.0 = bright, 1.0 = dark, default = 0.5.
    curve: f64,
    // Mode
    voice3_off: bool,
    hp_bp_lp: u8,
    vol: u8,
    // Runtime State
    /// Highpass integrator state.
    pub vhp: i32,
    /// Bandpass integrator state.
    pub vbp: i32,
    /// Lowpass integrator state.
    pub vlp: i32,
    /// Non-filtered mixer input.
    pub vnf: i32,
    // Cutoff Freq/Res
    q_1024_div: i32,
    w0: i32,
    w0_ceil_1: i32,
    w0_ceil_dt: i32,
    // FC -> f0 mapping evaluated from the spline control points.
    f0: [i16; 2048],
}

impl Filter {
    /// Construct a filter for the given chip model.
    pub fn new(chip_model: ChipModel) -> Self {
        let mut filter = Self {
            chip_model,
            enabled: true,
            fc: 0,
            filt: 0,
            res: 0,
            curve: 0.5,
            voice3_off: false,
            hp_bp_lp: 0,
            vol: 0,
            vhp: 0,
            vbp: 0,
            vlp: 0,
            vnf: 0,
            q_1024_div: 0,
            w0: 0,
            w0_ceil_1: 0,
            w0_ceil_dt: 0,
            f0: [0; 2048],
        };
        filter.set_f0();
        filter.set_q();
        filter.set_w0();
        filter
    }

    /// Rebuild the cutoff mapping for another chip model.
    pub fn set_chip_model(&mut self, chip_model: ChipModel) {
        self.chip_model = chip_model;
        self.set_f0();
        self.set_w0();
    }

    /// Whether the filter is engaged.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable filtering; when disabled all voices bypass the filter.
    /// This is not really part of SID, but is useful for testing.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Set the filter curve parameter for tuning to a specific chip:
    /// 0.0 (bright) to 1.0 (dark), default 0.5.
    pub fn set_filter_curve(&mut self, curve: f64) {
        self.curve = curve.clamp(0.0, 1.0);
        self.set_w0();
    }

    /// Current filter curve parameter.
    pub const fn get_filter_curve(&self) -> f64 {
        self.curve
    }

    fn set_f0(&mut self) {
        let points: &[Point] = match self.chip_model {
            ChipModel::Mos6581 => &F0_POINTS_6581,
            ChipModel::Mos8580 => &F0_POINTS_8580,
        };
        let mut output = [0i32; 2048];
        let mut plotter = PointPlotter::new(&mut output);
        interpolate(points, &mut plotter, 1.0);
        for (f0, &value) in self.f0.iter_mut().zip(output.iter()) {
            *f0 = value as i16;
        }
    }

    fn set_q(&mut self) {
        // Q is controlled linearly by res with an approximate range
        // [0.707, 1.7]. As resonance increases the filter must be clocked
        // more often to stay stable.
        //
        // The coefficient 1024 is dispensed of later by right-shifting 10
        // times (2^10 = 1024).
        self.q_1024_div = (1024.0 / (Q_MIN + 1.0 * self.res as f64 / 15.0)) as i32;
    }

    fn set_w0(&mut self) {
        let base_freq = self.f0[self.fc as usize] as f64;

        // The curve parameter scales the measured cutoff mapping:
        // 0.0 = bright (higher frequencies), 1.0 = dark, 0.5 = neutral.
        let adjusted_freq = match self.chip_model {
            // ~±15% at the extremes on the 6581.
            ChipModel::Mos6581 => base_freq * (1.15 - 0.30 * self.curve),
            // ~±20% on the 8580, whose integrators respond more linearly.
            ChipModel::Mos8580 => base_freq * (1.2 - 0.4 * self.curve),
        };

        // Multiply with FIXP_SCALE to facilitate division by 1_000_000 by
        // right-shifting 20 times (2^20 = 1048576).
        self.w0 = (2.0 * f64::consts::PI * adjusted_freq * FIXP_SCALE) as i32;

        // Limit f0 to keep the 1-cycle filter stable.
        let w0_max_1 = (2.0 * f64::consts::PI * F0_MAX_1CYCLE * FIXP_SCALE) as i32;
        self.w0_ceil_1 = self.w0.min(w0_max_1);

        // Limit f0 to keep the delta-cycle filter stable.
        let w0_max_dt = (2.0 * f64::consts::PI * F0_MAX_DELTA * FIXP_SCALE) as i32;
        self.w0_ceil_dt = self.w0.min(w0_max_dt);
    }

    /// Prepare a voice 3 input value honoring the 3OFF bit.
    ///
    /// NB! Voice 3 is not silenced by 3OFF if it is routed through the
    /// filter.
    #[inline]
    const fn voice3_input(&self, voice3: i32) -> i32 {
        if self.voice3_off && self.filt & 0x04 == 0 {
            0
        } else {
            voice3 >> 7
        }
    }

    /// Clock the filter for one cycle.
    #[inline]
    pub fn clock(&mut self, voice1: i32, voice2: i32, voice3: i32, ext_in: i32) {
        // Scale each input down from 20 to 13 bits.
        let voice1 = voice1 >> 7;
        let voice2 = voice2 >> 7;
        let voice3 = self.voice3_input(voice3);
        let ext_in = ext_in >> 7;

        if !self.enabled {
            self.vnf = voice1 + voice2 + voice3 + ext_in;
            self.vhp = 0;
            self.vbp = 0;
            self.vlp = 0;
            return;
        }

        let (vi, vnf) = route_voices(self.filt, voice1, voice2, voice3, ext_in);
        self.vnf = vnf;

        // delta_t = 1 is converted to seconds given a 1MHz clock by
        // dividing with 1 000 000.
        //
        // Vhp = Vbp/Q - Vlp - Vi;
        // dVbp = -w0*Vhp*dt;
        // dVlp = -w0*Vbp*dt;
        let dvbp = (self.w0_ceil_1 * self.vhp) >> 20;
        let dvlp = (self.w0_ceil_1 * self.vbp) >> 20;
        self.vbp -= dvbp;
        self.vlp -= dvlp;
        self.vhp = ((self.vbp * self.q_1024_div) >> 10) - self.vlp - vi;
    }

    /// Clock the filter for `delta` cycles with the given inputs.
    ///
    /// The linearized step is stable for chunks of at most 8 cycles under
    /// the cutoff and resonance ceilings, so longer windows are subdivided.
    #[inline]
    pub fn clock_delta(&mut self, mut delta: u32, voice1: i32, voice2: i32, voice3: i32, ext_in: i32) {
        let voice1 = voice1 >> 7;
        let voice2 = voice2 >> 7;
        let voice3 = self.voice3_input(voice3);
        let ext_in = ext_in >> 7;

        if !self.enabled {
            self.vnf = voice1 + voice2 + voice3 + ext_in;
            self.vhp = 0;
            self.vbp = 0;
            self.vlp = 0;
            return;
        }

        let (vi, vnf) = route_voices(self.filt, voice1, voice2, voice3, ext_in);
        self.vnf = vnf;

        let mut delta_flt = 8;
        while delta != 0 {
            if delta < delta_flt {
                delta_flt = delta;
            }
            // delta_t is converted to seconds given a 1MHz clock by dividing
            // with 1 000 000. This is done in two operations to avoid
            // integer multiplication overflow.
            let w0_delta_t = (self.w0_ceil_dt * delta_flt as i32) >> 6;
            let dvbp = (w0_delta_t * self.vhp) >> 14;
            let dvlp = (w0_delta_t * self.vbp) >> 14;
            self.vbp -= dvbp;
            self.vlp -= dvlp;
            self.vhp = ((self.vbp * self.q_1024_div) >> 10) - self.vlp - vi;

            delta -= delta_flt;
        }
    }

    /// Mixed filter output scaled by master volume.
    #[inline]
    pub const fn output(&self) -> i32 {
        if !self.enabled {
            (self.vnf + MIXER_DC) * self.vol as i32
        } else {
            let vf = mix_filter_output(self.vhp, self.vbp, self.vlp, self.hp_bp_lp);
            (self.vnf + vf + MIXER_DC) * self.vol as i32
        }
    }

    /// Reset registers and integrator states.
    pub fn reset(&mut self) {
        self.fc = 0;
        self.filt = 0;
        self.res = 0;
        self.voice3_off = false;
        self.hp_bp_lp = 0;
        self.vol = 0;
        self.vhp = 0;
        self.vbp = 0;
        self.vlp = 0;
        self.vnf = 0;
        self.set_w0();
        self.set_q();
    }

    // -- Register access

    /// Cutoff register high byte.
    pub const fn get_fc_hi(&self) -> u8 {
        (self.fc >> 3) as u8
    }

    /// Cutoff register low byte (3 bits).
    pub const fn get_fc_lo(&self) -> u8 {
        (self.fc & 0x007) as u8
    }

    /// MODE_VOL register.
    pub const fn get_mode_vol(&self) -> u8 {
        let value = if self.voice3_off { 0x80 } else { 0 };
        value | (self.hp_bp_lp << 4) | (self.vol & 0x0f)
    }

    /// RES_FILT register.
    pub const fn get_res_filt(&self) -> u8 {
        (self.res << 4) | (self.filt & 0x0f)
    }

    /// Write the cutoff high byte.
    pub fn set_fc_hi(&mut self, value: u8) {
        self.fc = ((value as u16) << 3) & 0x7f8 | self.fc & 0x007;
        self.set_w0();
    }

    /// Write the cutoff low byte (3 bits used).
    pub fn set_fc_lo(&mut self, value: u8) {
        self.fc = self.fc & 0x7f8 | (value as u16) & 0x007;
        self.set_w0();
    }

    /// Write mode bits, 3OFF, and master volume.
    pub const fn set_mode_vol(&mut self, value: u8) {
        self.voice3_off = value & 0x80 != 0;
        self.hp_bp_lp = (value >> 4) & 0x07;
        self.vol = value & 0x0f;
    }

    /// Write resonance and routing bits.
    pub fn set_res_filt(&mut self, value: u8) {
        self.res = (value >> 4) & 0x0f;
        self.filt = value & 0x0f;
        self.set_q();
    }
}
