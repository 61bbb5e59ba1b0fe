// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! SID synthesizer: three voices, filter, external filter, and the cycle
//! scheduler that sequences them.

#![allow(clippy::cast_lossless)]

use super::dac;
use super::external_filter::ExternalFilter;
use super::filter::Filter;
use super::voice::Voice;
use super::wave::Syncable;
use super::ChipModel;

const ACC_MSB_MASK: u32 = 0x0080_0000;

const OUTPUT_RANGE: u32 = 1 << 16;
const OUTPUT_HALF: i32 = (OUTPUT_RANGE >> 1) as i32;
/// Fixed divisor scaling the full internal dynamic range
/// (4095 * 255 * 3 voices * 15 volume, peak-to-peak) to 16 bits.
const SAMPLES_PER_OUTPUT: i32 = ((4095 * 255 * 3 * 15 * 2) / OUTPUT_RANGE) as i32;

/// Core SID synthesizer.
///
/// Owns the three voices (which form the fixed sync ring v1 <- v3,
/// v2 <- v1, v3 <- v2), the multimode filter, the external output stage,
/// and the DAC tables shared by all voices.
#[derive(Clone)]
pub struct Synth {
    /// C64 output stage filter.
    pub ext_filter: ExternalFilter,
    /// Multimode filter.
    pub filter: Filter,
    /// The three voices, in register order.
    pub voices: [Voice; 3],
    /// EXT IN pin level (20-bit scale).
    pub ext_in: i32,
    wave_dac: [u16; 4096],
    env_dac: [u16; 256],
}

impl Synth {
    /// Construct a synthesizer for the given chip model.
    pub fn new(chip_model: ChipModel) -> Self {
        let voice = Voice::new(chip_model);
        let mut synth = Synth {
            ext_filter: ExternalFilter::new(chip_model),
            filter: Filter::new(chip_model),
            voices: [voice.clone(), voice.clone(), voice],
            ext_in: 0,
            wave_dac: [0; 4096],
            env_dac: [0; 256],
        };
        synth.build_dac_tables(chip_model);
        synth
    }

    /// Switch chip model in place, rebuilding every model-dependent table.
    pub fn set_chip_model(&mut self, chip_model: ChipModel) {
        for voice in &mut self.voices {
            voice.set_chip_model(chip_model);
        }
        self.filter.set_chip_model(chip_model);
        self.ext_filter.set_chip_model(chip_model);
        self.build_dac_tables(chip_model);
    }

    fn build_dac_tables(&mut self, chip_model: ChipModel) {
        dac::build_dac_table(&mut self.wave_dac, chip_model);
        dac::build_dac_table(&mut self.env_dac, chip_model);
    }

    /// View voice `i` together with its sync neighbors.
    pub fn syncable_voice(&self, i: usize) -> Syncable<&'_ Voice> {
        let [a, b, c] = &self.voices;
        let mut voices_ref = [a, b, c];
        voices_ref.rotate_left(i);
        let [main, sync_dest, sync_source] = voices_ref;
        Syncable {
            main,
            sync_dest,
            sync_source,
        }
    }

    /// Mutable view of voice `i` together with its sync neighbors.
    pub fn syncable_voice_mut(&mut self, i: usize) -> Syncable<&'_ mut Voice> {
        let [a, b, c] = &mut self.voices;
        let mut voices_mut = [a, b, c];
        voices_mut.rotate_left(i);
        let [main, sync_dest, sync_source] = voices_mut;
        Syncable {
            main,
            sync_dest,
            sync_source,
        }
    }

    #[inline]
    fn voice_output(&self, i: usize) -> i32 {
        self.syncable_voice(i).output(&self.wave_dac, &self.env_dac)
    }

    /// Advance the whole chip by one cycle.
    pub fn clock(&mut self) {
        // Clock amplitude modulators.
        for voice in &mut self.voices {
            voice.envelope.clock();
        }
        // Clock oscillators, then apply sync once all have advanced.
        for voice in &mut self.voices {
            voice.wave.clock();
        }
        for i in 0..3 {
            self.syncable_voice_mut(i).wave().synchronize();
        }
        // Clock filter and output stage.
        self.filter.clock(
            self.voice_output(0),
            self.voice_output(1),
            self.voice_output(2),
            self.ext_in,
        );
        self.ext_filter.clock(self.filter.output());
    }

    /// Advance the whole chip by `delta` cycles.
    ///
    /// The window is cut into filter-safe sub-windows of at most 8 cycles
    /// (the whole window when the filter is bypassed). Within a sub-window
    /// the envelopes advance in bulk, the oscillators advance in lock-step
    /// between accumulator MSB toggles of any sync/ring source, and the
    /// filter chain consumes the voice outputs sampled at the sub-window
    /// end.
    pub fn clock_delta(&mut self, mut delta: u32) {
        if delta == 0 {
            return;
        }

        let mut delta_flt = if self.filter.is_enabled() { 8 } else { delta };
        while delta > 0 {
            if delta < delta_flt {
                delta_flt = delta;
            }

            for voice in &mut self.voices {
                voice.envelope.clock_delta(delta_flt);
            }

            let mut delta_osc = delta_flt;
            while delta_osc > 0 {
                // Find the minimum number of cycles to an oscillator
                // accumulator MSB toggle. We have to clock on each MSB on /
                // MSB off for hard sync and ring modulation to operate
                // correctly.
                let mut delta_min = delta_osc;
                for i in 0..3 {
                    let wave = self.syncable_voice(i).wave();
                    // Only the MSB of an oscillator driving a sync or ring
                    // destination matters, and only with freq != 0.
                    let coupled = wave.sync_dest.get_sync() || wave.sync_dest.get_ring_mod();
                    let freq = wave.main.get_frequency() as u32;
                    if !coupled || freq == 0 {
                        continue;
                    }
                    let acc = wave.main.get_acc();
                    // Clock on MSB off if MSB is on, clock on MSB on if MSB
                    // is off.
                    let delta_acc = if acc & ACC_MSB_MASK != 0 {
                        0x0100_0000 - acc
                    } else {
                        0x0080_0000 - acc
                    };
                    let mut delta_next = delta_acc / freq;
                    if delta_acc % freq != 0 {
                        delta_next += 1;
                    }
                    if delta_next < delta_min {
                        delta_min = delta_next;
                    }
                }

                for voice in &mut self.voices {
                    voice.wave.clock_delta(delta_min);
                }
                for i in 0..3 {
                    self.syncable_voice_mut(i).wave().synchronize();
                }
                delta_osc -= delta_min;
            }

            self.filter.clock_delta(
                delta_flt,
                self.voice_output(0),
                self.voice_output(1),
                self.voice_output(2),
                self.ext_in,
            );
            self.ext_filter.clock_delta(delta_flt, self.filter.output());

            delta -= delta_flt;
        }
    }

    /// Current audio sample, scaled to 16 bits.
    ///
    /// The output is inverted just like on a Commodore 64; this should not
    /// make any audible difference.
    pub fn output(&self) -> i16 {
        let sample = -self.ext_filter.output() / SAMPLES_PER_OUTPUT;
        if sample >= OUTPUT_HALF {
            (OUTPUT_HALF - 1) as i16
        } else if sample < -OUTPUT_HALF {
            (-OUTPUT_HALF) as i16
        } else {
            sample as i16
        }
    }

    /// Reset all voices and filters to power-on state.
    pub fn reset(&mut self) {
        self.ext_filter.reset();
        self.filter.reset();
        for voice in &mut self.voices {
            voice.reset();
        }
        self.ext_in = 0;
    }

    // -- Register interface

    /// Read a SID register. Write-only registers return the decayed value
    /// left on the data bus.
    pub fn read(&self, reg: u8, bus_value: u8) -> u8 {
        match reg {
            // POT X/Y: no paddles attached.
            0x19 | 0x1a => 0xff,
            // OSC3: upper 8 bits of the voice 3 waveform output.
            0x1b => {
                let voice = self.syncable_voice(2);
                voice.main.wave.read_osc(Some(&voice.sync_source.wave))
            }
            // ENV3: voice 3 envelope counter.
            0x1c => self.voices[2].envelope.read_env(),
            _ => bus_value,
        }
    }

    /// Write a SID register. Writes above 0x18 are ignored.
    pub fn write(&mut self, reg: u8, value: u8) {
        match reg {
            0x00..=0x14 => {
                let voice = &mut self.voices[reg as usize / 7];
                match reg % 7 {
                    0 => voice.wave.set_frequency_lo(value),
                    1 => voice.wave.set_frequency_hi(value),
                    2 => voice.wave.set_pulse_width_lo(value),
                    3 => voice.wave.set_pulse_width_hi(value),
                    4 => voice.set_control(value),
                    5 => voice.envelope.set_attack_decay(value),
                    _ => voice.envelope.set_sustain_release(value),
                }
            }
            0x15 => self.filter.set_fc_lo(value),
            0x16 => self.filter.set_fc_hi(value),
            0x17 => self.filter.set_res_filt(value),
            0x18 => self.filter.set_mode_vol(value),
            _ => {}
        }
    }
}
