// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Waveform generation.
//!
//! A 24 bit accumulator is the basis for waveform generation. FREQ is added
//! to the lower 16 bits of the accumulator each cycle. The accumulator is set
//! to zero when TEST is set, and starts counting when TEST is cleared.
//! The noise waveform is taken from intermediate bits of a 23 bit shift
//! register clocked by bit 19 of the accumulator.

#![allow(clippy::cast_lossless)]

use bit_field::BitField;

use super::wavetable::WaveTables;
use super::ChipModel;

const ACC_MASK: u32 = 0x00ff_ffff;
const ACC_BIT19_MASK: u32 = 0x0008_0000;
const ACC_MSB_MASK: u32 = 0x0080_0000;
const SHIFT_MASK: u32 = 0x007f_ffff;
const SHIFT_RESET: u32 = 0x007f_fff8;
const OUTPUT_MASK: u16 = 0x0fff;

/// A main object together with its hard-sync neighbors.
///
/// The three oscillators form a fixed ring (each one is the sync source of
/// the next), so any view of one voice carries references to both neighbors.
/// All three generators are advanced to the same cycle before `msb_rising`
/// of any of them is inspected.
pub struct Syncable<T> {
    /// The object this view is centered on.
    pub main: T,
    /// Neighbor that `main` may hard-sync.
    pub sync_dest: T,
    /// Neighbor whose MSB drives `main`'s sync and ring modulation.
    pub sync_source: T,
}

/// SID waveform generator.
#[derive(Clone)]
pub struct WaveformGenerator {
    // Configuration
    frequency: u16,
    pulse_width: u16,
    // Control
    waveform: u8,
    ring: bool,
    sync: bool,
    test: bool,
    // Runtime State
    /// 24-bit phase accumulator.
    pub acc: u32,
    /// 23-bit noise shift register.
    pub shift: u32,
    msb_rising: bool,
    // Combined waveform lookup
    tables: WaveTables,
}

impl WaveformGenerator {
    /// Construct a generator with tables for the given chip model.
    pub fn new(chip_model: ChipModel) -> Self {
        let mut wave = WaveformGenerator {
            frequency: 0,
            pulse_width: 0,
            waveform: 0,
            ring: false,
            sync: false,
            test: false,
            acc: 0,
            shift: 0,
            msb_rising: false,
            tables: WaveTables::new(chip_model),
        };
        wave.reset();
        wave
    }

    /// Swap the combined waveform tables for another chip model.
    pub fn set_chip_model(&mut self, chip_model: ChipModel) {
        self.tables = WaveTables::new(chip_model);
    }

    /// Current accumulator value.
    pub const fn get_acc(&self) -> u32 {
        self.acc
    }

    /// Force the accumulator to a value (24 bits).
    pub const fn set_acc(&mut self, value: u32) {
        self.acc = value & ACC_MASK;
    }

    /// Current noise shift register value.
    pub const fn get_shift(&self) -> u32 {
        self.shift
    }

    /// 16-bit frequency register.
    pub const fn get_frequency(&self) -> u16 {
        self.frequency
    }

    /// High byte of the frequency register.
    pub const fn get_frequency_hi(&self) -> u8 {
        (self.frequency >> 8) as u8
    }

    /// Low byte of the frequency register.
    pub const fn get_frequency_lo(&self) -> u8 {
        (self.frequency & 0x00ff) as u8
    }

    /// High nibble of the pulse width register.
    pub const fn get_pulse_width_hi(&self) -> u8 {
        (self.pulse_width >> 8) as u8
    }

    /// Low byte of the pulse width register.
    pub const fn get_pulse_width_lo(&self) -> u8 {
        (self.pulse_width & 0x00ff) as u8
    }

    /// Control register bits owned by the waveform generator. The gate bit
    /// belongs to the envelope generator.
    pub fn get_control(&self) -> u8 {
        let mut value = self.waveform << 4;
        value.set_bit(1, self.sync);
        value.set_bit(2, self.ring);
        value.set_bit(3, self.test);
        value
    }

    /// Ring modulation flag.
    pub const fn get_ring_mod(&self) -> bool {
        self.ring
    }

    /// Hard sync flag.
    pub const fn get_sync(&self) -> bool {
        self.sync
    }

    /// Whether the accumulator MSB rose on the last advance.
    pub const fn is_msb_rising(&self) -> bool {
        self.msb_rising
    }

    /// Write the control register (waveform, test, ring mod, sync).
    pub fn set_control(&mut self, value: u8) {
        self.waveform = (value >> 4) & 0x0f;
        self.sync = value.get_bit(1);
        self.ring = value.get_bit(2);
        let test = value.get_bit(3);
        if test {
            // Test bit set: accumulator and shift register are cleared.
            // On real chips the shift register bits fade towards zero over
            // $2000-$4000 cycles rather than clearing at once; the fade is
            // not modeled.
            self.acc = 0;
            self.shift = 0;
        } else if self.test {
            // Test bit cleared: the accumulator starts counting and the
            // shift register is reset to its initial pattern.
            self.shift = SHIFT_RESET;
        }
        self.test = test;
    }

    /// Write the frequency high byte.
    pub const fn set_frequency_hi(&mut self, value: u8) {
        self.frequency = (self.frequency & 0x00ff) | ((value as u16) << 8);
    }

    /// Write the frequency low byte.
    pub const fn set_frequency_lo(&mut self, value: u8) {
        self.frequency = (self.frequency & 0xff00) | (value as u16);
    }

    /// High nibble of PW_HI is unused; the pulse width is 12 bits.
    pub const fn set_pulse_width_hi(&mut self, value: u8) {
        self.pulse_width = (self.pulse_width & 0x00ff) | (((value & 0x0f) as u16) << 8);
    }

    /// Write the pulse width low byte.
    pub const fn set_pulse_width_lo(&mut self, value: u8) {
        self.pulse_width = (self.pulse_width & 0xff00) | (value as u16);
    }

    /// Advance the accumulator by one cycle.
    #[inline]
    pub const fn clock(&mut self) {
        if !self.test {
            let acc_prev = self.acc;
            self.acc = (self.acc + self.frequency as u32) & ACC_MASK;
            // The MSB rising edge is used for hard sync and detected against
            // the pre-advance value.
            self.msb_rising = acc_prev & ACC_MSB_MASK == 0 && self.acc & ACC_MSB_MASK != 0;
            // Shift the noise register on each 0 -> 1 transition of bit 19.
            if acc_prev & ACC_BIT19_MASK == 0 && self.acc & ACC_BIT19_MASK != 0 {
                self.clock_shift_register();
            }
        }
    }

    /// Advance the accumulator by `delta` cycles in one step.
    ///
    /// The shift register is clocked once for each 0 -> 1 transition of
    /// accumulator bit 19 within the interval; bit 19 flips each time
    /// 2^20 is added to the accumulator, with the final partial period
    /// examined separately.
    pub fn clock_delta(&mut self, delta: u32) {
        if self.test {
            return;
        }

        let acc_prev = self.acc;
        // Very large windows alias mod 2^32; the accumulator is reduced
        // mod 2^24 below.
        let mut delta_acc = delta.wrapping_mul(self.frequency as u32);
        self.acc = self.acc.wrapping_add(delta_acc) & ACC_MASK;
        self.msb_rising = acc_prev & ACC_MSB_MASK == 0 && self.acc & ACC_MSB_MASK != 0;

        let mut shift_period = 0x0010_0000;
        while delta_acc != 0 {
            if delta_acc < shift_period {
                shift_period = delta_acc;
                // Determine whether bit 19 flipped on the last partial
                // period. Requires two's complement arithmetic.
                let acc_bit19_prev =
                    (self.acc.wrapping_sub(shift_period)) & ACC_BIT19_MASK != 0;
                let acc_bit19 = self.acc & ACC_BIT19_MASK != 0;
                if shift_period <= 0x0008_0000 {
                    // Check for a 0 -> 1 flip.
                    if acc_bit19_prev || !acc_bit19 {
                        break;
                    }
                } else {
                    // Check for a flip from 0 (to 1, or via 1 to 0) or
                    // from 1 via 0 to 1.
                    if acc_bit19_prev && !acc_bit19 {
                        break;
                    }
                }
            }
            self.clock_shift_register();
            delta_acc -= shift_period;
        }
    }

    #[inline]
    const fn clock_shift_register(&mut self) {
        let bit0 = ((self.shift >> 22) ^ (self.shift >> 17)) & 0x01;
        self.shift = ((self.shift << 1) & SHIFT_MASK) | bit0;
    }

    /// 12-bit waveform output.
    ///
    /// A pure function of the generator state and the sync source's
    /// accumulator; it never advances state. `sync_source` is only consulted
    /// for ring modulation.
    pub fn output(&self, sync_source: Option<&WaveformGenerator>) -> u16 {
        match self.waveform {
            0x0 => 0,
            0x1 => self.output_triangle(sync_source),
            0x2 => self.output_sawtooth(),
            0x3 => (self.tables.saw_tri[self.shifted_index()] as u16) << 4,
            0x4 => self.output_pulse(),
            0x5 => {
                ((self.tables.pulse_tri[self.shifted_index()] as u16) << 4) & self.output_pulse()
            }
            0x6 => {
                ((self.tables.pulse_saw[(self.acc >> 12) as usize] as u16) << 4)
                    & self.output_pulse()
            }
            0x7 => {
                ((self.tables.pulse_saw_tri[self.shifted_index()] as u16) << 4)
                    & self.output_pulse()
            }
            0x8 => self.output_noise(),
            // Waveform combinations including noise short the shift register
            // against the waveform bus and fall silent within a few cycles.
            _ => 0,
        }
    }

    /// OSC3 register view: upper 8 bits of the waveform output.
    pub fn read_osc(&self, sync_source: Option<&WaveformGenerator>) -> u8 {
        (self.output(sync_source) >> 4) as u8
    }

    /// Reset to power-on state.
    pub const fn reset(&mut self) {
        self.frequency = 0;
        self.pulse_width = 0;
        self.waveform = 0;
        self.ring = false;
        self.sync = false;
        self.test = false;
        self.acc = 0;
        self.shift = SHIFT_RESET;
        self.msb_rising = false;
    }

    /// Table index for combinations including triangle: the accumulator is
    /// left-shifted because the triangle stage shifts the MSB out.
    #[inline]
    const fn shifted_index(&self) -> usize {
        ((self.acc >> 11) & 0x0fff) as usize
    }

    // Triangle:
    // The upper 12 bits of the accumulator are used. The MSB creates the
    // falling edge by inverting the lower 11 bits, is then thrown away, and
    // the remaining bits are left-shifted (half the resolution, full
    // amplitude). Ring modulation substitutes the MSB with the XOR of the
    // own and sync source MSBs.
    fn output_triangle(&self, sync_source: Option<&WaveformGenerator>) -> u16 {
        let msb_acc = if self.ring {
            self.acc ^ sync_source.map_or(0, |source| source.acc)
        } else {
            self.acc
        };
        let output = if msb_acc & ACC_MSB_MASK != 0 {
            !self.acc
        } else {
            self.acc
        };
        (output >> 11) as u16 & OUTPUT_MASK
    }

    // Sawtooth: the upper 12 bits of the accumulator.
    const fn output_sawtooth(&self) -> u16 {
        (self.acc >> 12) as u16
    }

    // Pulse:
    // The upper 12 bits of the accumulator are compared against the pulse
    // width register; output is all ones or all zeros. The test bit holds
    // the pulse output at 0xfff regardless of the pulse width.
    const fn output_pulse(&self) -> u16 {
        if self.test || (self.acc >> 12) as u16 >= self.pulse_width {
            0x0fff
        } else {
            0x0000
        }
    }

    // Noise:
    // Taken from intermediate bits of the shift register:
    //
    //                        ----------------------->---------------------
    //                        |                                            |
    //                   ----EOR----                                       |
    //                   |         |                                       |
    //                   2 2 2 1 1 1 1 1 1 1 1 1 1                         |
    // Register bits:    2 1 0 9 8 7 6 5 4 3 2 1 0 9 8 7 6 5 4 3 2 1 0 <---
    //                   |   |       |     |   |       |     |   |
    // Output bits  :    7   6       5     4   3       2     1   0
    //
    // The 8 tapped bits fill the upper 8 of the 12-bit output.
    const fn output_noise(&self) -> u16 {
        (((self.shift & 0x0040_0000) >> 11)
            | ((self.shift & 0x0010_0000) >> 10)
            | ((self.shift & 0x0001_0000) >> 7)
            | ((self.shift & 0x0000_2000) >> 5)
            | ((self.shift & 0x0000_0800) >> 4)
            | ((self.shift & 0x0000_0080) >> 1)
            | ((self.shift & 0x0000_0010) << 1)
            | ((self.shift & 0x0000_0004) << 2)) as u16
    }
}

impl Syncable<&'_ mut WaveformGenerator> {
    /// Apply hard sync after all three oscillators have reached the same
    /// cycle.
    ///
    /// Must be called only once all generators have been clocked, since the
    /// oscillators operate in parallel and `msb_rising` refers to the cycle
    /// just completed. A sync source that is itself synced on the same cycle
    /// its MSB rises does not sync its destination; verified by sampling
    /// OSC3.
    pub fn synchronize(&mut self) {
        if self.main.msb_rising
            && self.sync_dest.sync
            && !(self.main.sync && self.sync_source.msb_rising)
        {
            self.sync_dest.acc = 0;
        }
    }
}
