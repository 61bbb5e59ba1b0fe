// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! ADSR envelope generation.
//!
//! The envelope counter is an 8-bit register stepped by a 15-bit rate
//! counter: the rate counter increments every cycle and steps the envelope
//! when it reaches the comparison value selected by the active ADSR nibble,
//! resetting to zero in the process. Decay and release are additionally
//! divided by an exponential counter whose period grows as the envelope
//! falls, producing the chip's piecewise-exponential discharge curve.

#![allow(clippy::cast_lossless)]

use bit_field::BitField;

const RATE_COUNTER_MASK: u16 = 0x7fff;
const RATE_COUNTER_MSB_MASK: u16 = 0x8000;

// Rate counter comparison values for each ADSR nibble, derived from the
// Envelope Rates table in the Programmer's Reference Guide and verified by
// sampling ENV3 (counting the cycles between envelope levels 1 and 129 with
// linked CIA timers). The measured periods are the calculated values plus
// one, which points to the designers feeding the calculated numbers
// straight into the comparator without accounting for the cycle spent
// zeroing the counter.
//
// Because the rate counter is never reset by register writes, a freshly
// selected comparison value below the current counter forces the counter to
// run all the way through the 15-bit wrap before it can match again - the
// "ADSR delay bug", audible as a stolen envelope step of up to ~32ms.
const RATE_COUNTER_PERIOD: [u16; 16] = [
    9,     // 2ms*1.0MHz/256 = 7.81
    32,    // 8ms*1.0MHz/256 = 31.25
    63,    // 16ms*1.0MHz/256 = 62.50
    95,    // 24ms*1.0MHz/256 = 93.75
    149,   // 38ms*1.0MHz/256 = 148.44
    220,   // 56ms*1.0MHz/256 = 218.75
    267,   // 68ms*1.0MHz/256 = 265.63
    313,   // 80ms*1.0MHz/256 = 312.50
    392,   // 100ms*1.0MHz/256 = 390.63
    977,   // 250ms*1.0MHz/256 = 976.56
    1954,  // 500ms*1.0MHz/256 = 1953.13
    3126,  // 800ms*1.0MHz/256 = 3125.00
    3907,  // 1 s*1.0MHz/256 =  3906.25
    11720, // 3 s*1.0MHz/256 = 11718.75
    19532, // 5 s*1.0MHz/256 = 19531.25
    31251, // 8 s*1.0MHz/256 = 31250.00
];

/// Sustain levels replicate the 4-bit register value into both nibbles of
/// the comparison byte; verified by sampling ENV3.
const SUSTAIN_LEVEL: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];

/// Envelope phase.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Ramping up toward 0xff.
    Attack,
    /// Falling toward the sustain level, then holding.
    DecaySustain,
    /// Falling toward zero after gate off.
    Release,
}

/// SID ADSR envelope generator.
///
/// Attack is linear; decay and release pass the rate clock through the
/// exponential divider, with periods 1, 2, 4, 8, 16, 30 switched at
/// envelope values 255, 93, 54, 26, 14 and 6.
#[derive(Clone, Copy)]
pub struct EnvelopeGenerator {
    // Configuration
    attack: u8,
    decay: u8,
    sustain: u8,
    release: u8,
    // Control
    gate: bool,
    // Runtime State
    /// Current ADSR phase.
    pub state: State,
    /// Current envelope output level (0-255).
    pub envelope_counter: u8,
    /// Exponential divider position.
    pub exponential_counter: u8,
    /// Exponential divider period for the current envelope level.
    pub exponential_counter_period: u8,
    /// Frozen at zero until the next gate-on.
    pub hold_zero: bool,
    /// 15-bit rate counter.
    pub rate_counter: u16,
    /// Active rate comparison value.
    pub rate_counter_period: u16,
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        let mut envelope = Self {
            attack: 0,
            decay: 0,
            sustain: 0,
            release: 0,
            gate: false,
            state: State::Release,
            envelope_counter: 0,
            exponential_counter: 0,
            exponential_counter_period: 0,
            hold_zero: false,
            rate_counter: 0,
            rate_counter_period: 0,
        };
        envelope.reset();
        envelope
    }
}

impl EnvelopeGenerator {
    /// Packed attack/decay nibble register.
    pub const fn get_attack_decay(&self) -> u8 {
        self.attack << 4 | self.decay
    }

    /// Control register contribution (gate bit only).
    pub fn get_control(&self) -> u8 {
        let mut value = 0u8;
        value.set_bit(0, self.gate);
        value
    }

    /// Packed sustain/release nibble register.
    pub const fn get_sustain_release(&self) -> u8 {
        self.sustain << 4 | self.release
    }

    /// The ADSR nibble driving the rate counter in the current phase.
    const fn rate_nibble(&self) -> u8 {
        match self.state {
            State::Attack => self.attack,
            State::DecaySustain => self.decay,
            State::Release => self.release,
        }
    }

    /// Refresh the rate comparison value after a phase change or a write
    /// to the nibble selected by the current phase. The rate counter
    /// itself is never touched here: a new comparison value below the
    /// running counter leaves the counter to wrap through 0x8000 before
    /// matching (the ADSR delay bug).
    const fn reload_rate_period(&mut self) {
        self.rate_counter_period = RATE_COUNTER_PERIOD[self.rate_nibble() as usize];
    }

    /// Write the attack/decay register.
    pub const fn set_attack_decay(&mut self, value: u8) {
        self.attack = (value >> 4) & 0x0f;
        self.decay = value & 0x0f;
        self.reload_rate_period();
    }

    /// Write the sustain/release register.
    pub const fn set_sustain_release(&mut self, value: u8) {
        self.sustain = (value >> 4) & 0x0f;
        self.release = value & 0x0f;
        self.reload_rate_period();
    }

    /// Write the control register (gate bit).
    ///
    /// A gate edge switches phase and clears the exponential divider, but
    /// deliberately leaves the rate counter running.
    pub fn set_control(&mut self, value: u8) {
        let gate = value.get_bit(0);
        if gate != self.gate {
            if gate {
                // Rising edge: attack, and release the zero freeze.
                self.state = State::Attack;
                self.hold_zero = false;
            } else {
                // Falling edge: release.
                self.state = State::Release;
            }
            self.exponential_counter = 0;
            self.reload_rate_period();
        }
        self.gate = gate;
    }

    /// Cycles until the rate counter reaches its comparison value,
    /// following the hardware's 15-bit wrap when the counter has already
    /// passed it.
    const fn cycles_until_match(&self) -> u32 {
        let period = self.rate_counter_period as u32;
        let counter = self.rate_counter as u32;
        if counter < period {
            period - counter
        } else {
            // Counting up to 0x7fff, skipping bit 15, then up to the
            // comparison value.
            0x7fff - (counter - period)
        }
    }

    /// Move the rate counter by `cycles`, skipping over bit 15 so the
    /// counter stays 15 bits wide.
    const fn advance_rate_counter(&mut self, cycles: u16) {
        self.rate_counter += cycles;
        if self.rate_counter & RATE_COUNTER_MSB_MASK != 0 {
            self.rate_counter += 1;
            self.rate_counter &= RATE_COUNTER_MASK;
        }
    }

    /// A rate counter match: feed the exponential divider and, when it
    /// rolls over, step the envelope. Attack bypasses the divider.
    #[inline]
    fn fire_rate_match(&mut self) {
        self.exponential_counter += 1;
        if self.state != State::Attack
            && self.exponential_counter != self.exponential_counter_period
        {
            return;
        }
        self.exponential_counter = 0;

        if !self.hold_zero {
            self.step_envelope();
        }
    }

    /// One envelope counter step in the current phase, tracking the
    /// exponential divider period across the discharge curve breakpoints.
    #[inline]
    const fn step_envelope(&mut self) {
        match self.state {
            State::Attack => {
                // A release->attack edge can carry the counter past 0xff,
                // wrapping it to 0x00 where it freezes until the next edge.
                self.envelope_counter = self.envelope_counter.wrapping_add(1);
                if self.envelope_counter == 0xff {
                    self.state = State::DecaySustain;
                    self.reload_rate_period();
                }
            }
            State::DecaySustain => {
                // Holding happens by comparison, so lowering sustain while
                // holding resumes the decay; raising it does not push the
                // counter back up.
                if self.envelope_counter != SUSTAIN_LEVEL[self.sustain as usize] {
                    self.envelope_counter = self.envelope_counter.wrapping_sub(1);
                }
            }
            State::Release => {
                // The mirror wrap: an attack->release edge at zero takes
                // the counter to 0xff and it keeps counting down from
                // there.
                self.envelope_counter = self.envelope_counter.wrapping_sub(1);
            }
        }

        match self.envelope_counter {
            0xff => self.exponential_counter_period = 1,
            0x5d => self.exponential_counter_period = 2,
            0x36 => self.exponential_counter_period = 4,
            0x1a => self.exponential_counter_period = 8,
            0x0e => self.exponential_counter_period = 16,
            0x06 => self.exponential_counter_period = 30,
            0x00 => {
                self.exponential_counter_period = 1;
                self.hold_zero = true;
            }
            _ => {}
        }
    }

    /// Advance one cycle.
    #[inline]
    pub fn clock(&mut self) {
        self.advance_rate_counter(1);
        if self.rate_counter != self.rate_counter_period {
            return;
        }
        self.rate_counter = 0;
        self.fire_rate_match();
    }

    /// Advance `delta` cycles in bulk by jumping from rate match to rate
    /// match instead of iterating cycles.
    #[inline]
    pub fn clock_delta(&mut self, mut delta: u32) {
        let mut distance = self.cycles_until_match();
        while delta >= distance {
            delta -= distance;
            self.rate_counter = 0;
            self.fire_rate_match();
            distance = self.rate_counter_period as u32;
        }
        // The window ends before the next match; just move the counter.
        self.advance_rate_counter(delta as u16);
    }

    /// Current envelope level (0-255).
    #[inline]
    pub const fn output(&self) -> u8 {
        self.envelope_counter
    }

    /// ENV3 register view of the envelope level.
    pub const fn read_env(&self) -> u8 {
        self.envelope_counter
    }

    /// Power-on state: release phase, held at zero.
    pub const fn reset(&mut self) {
        self.attack = 0;
        self.decay = 0;
        self.sustain = 0;
        self.release = 0;
        self.gate = false;
        self.state = State::Release;
        self.envelope_counter = 0;
        self.exponential_counter = 0;
        self.exponential_counter_period = 1;
        self.hold_zero = true;
        self.rate_counter = 0;
        self.reload_rate_period();
    }
}
