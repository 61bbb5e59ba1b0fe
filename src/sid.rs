// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use super::envelope::State as EnvState;
use super::sampler::{Sampler, SamplingMethod};
use super::synth::Synth;
use super::{clock, ChipModel, SamplingError};

/// Default clock frequency: PAL C64 (~985 kHz).
const DEFAULT_CLOCK_FREQ: u32 = clock::PAL;
/// Default sample rate: CD quality (44.1 kHz).
const DEFAULT_SAMPLE_FREQ: u32 = 44100;
/// Bus value time-to-live in clock cycles (~8ms decay).
const BUS_VALUE_TTL: u32 = 0x2000;

/// SID register offsets ($D400 base).
pub mod reg {
    /// Voice 1 frequency low byte.
    pub const FREQLO1: u8 = 0x00;
    /// Voice 1 frequency high byte.
    pub const FREQHI1: u8 = 0x01;
    /// Voice 1 pulse width low byte.
    pub const PWLO1: u8 = 0x02;
    /// Voice 1 pulse width high nibble.
    pub const PWHI1: u8 = 0x03;
    /// Voice 1 control register.
    pub const CR1: u8 = 0x04;
    /// Voice 1 attack/decay.
    pub const AD1: u8 = 0x05;
    /// Voice 1 sustain/release.
    pub const SR1: u8 = 0x06;
    /// Voice 2 frequency low byte.
    pub const FREQLO2: u8 = 0x07;
    /// Voice 2 frequency high byte.
    pub const FREQHI2: u8 = 0x08;
    /// Voice 2 pulse width low byte.
    pub const PWLO2: u8 = 0x09;
    /// Voice 2 pulse width high nibble.
    pub const PWHI2: u8 = 0x0a;
    /// Voice 2 control register.
    pub const CR2: u8 = 0x0b;
    /// Voice 2 attack/decay.
    pub const AD2: u8 = 0x0c;
    /// Voice 2 sustain/release.
    pub const SR2: u8 = 0x0d;
    /// Voice 3 frequency low byte.
    pub const FREQLO3: u8 = 0x0e;
    /// Voice 3 frequency high byte.
    pub const FREQHI3: u8 = 0x0f;
    /// Voice 3 pulse width low byte.
    pub const PWLO3: u8 = 0x10;
    /// Voice 3 pulse width high nibble.
    pub const PWHI3: u8 = 0x11;
    /// Voice 3 control register.
    pub const CR3: u8 = 0x12;
    /// Voice 3 attack/decay.
    pub const AD3: u8 = 0x13;
    /// Voice 3 sustain/release.
    pub const SR3: u8 = 0x14;
    /// Filter cutoff low bits.
    pub const FCLO: u8 = 0x15;
    /// Filter cutoff high byte.
    pub const FCHI: u8 = 0x16;
    /// Filter resonance and routing.
    pub const RESFILT: u8 = 0x17;
    /// Filter mode and master volume.
    pub const MODVOL: u8 = 0x18;
    /// Paddle X position (read-only).
    pub const POTX: u8 = 0x19;
    /// Paddle Y position (read-only).
    pub const POTY: u8 = 0x1a;
    /// Voice 3 waveform output (read-only).
    pub const OSC3: u8 = 0x1b;
    /// Voice 3 envelope output (read-only).
    pub const ENV3: u8 = 0x1c;
}

/// Snapshot of the complete chip state.
///
/// Carries the register file plus every internal counter needed to resume
/// emulation bit-exactly from the captured cycle; used for host
/// save-states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// Register file as visible at $D400-$D41F.
    pub sid_register: [u8; 32],
    /// Byte left on the data bus by the last write.
    pub bus_value: u8,
    /// Remaining cycles before the bus byte decays to zero.
    pub bus_value_ttl: u32,
    /// EXT IN pin level.
    pub ext_in: i32,
    /// 24-bit phase accumulators, one per voice.
    pub accumulator: [u32; 3],
    /// 23-bit noise shift registers, one per voice.
    pub shift_register: [u32; 3],
    /// Envelope phases (0 = attack, 1 = decay/sustain, 2 = release).
    pub envelope_state: [u8; 3],
    /// Envelope counter values.
    pub envelope_counter: [u8; 3],
    /// Exponential divider positions.
    pub exponential_counter: [u8; 3],
    /// Exponential divider periods at the captured envelope levels.
    pub exponential_counter_period: [u8; 3],
    /// Envelope frozen-at-zero flags.
    pub hold_zero: [u8; 3],
    /// Envelope rate counters.
    pub rate_counter: [u16; 3],
    /// Active envelope rate comparison values.
    pub rate_counter_period: [u16; 3],
}

/// MOS 6581/8580 SID chip emulator.
///
/// The SID (Sound Interface Device) is the sound chip of the Commodore 64.
/// This emulator reproduces its three voices with waveform and envelope
/// generators, the multimode analog filter, and the C64 output stage, cycle
/// by cycle.
///
/// # Example
/// ```ignore
/// use mos_sid::{ChipModel, Sid};
///
/// let mut sid = Sid::new(ChipModel::Mos6581);
///
/// // Voice 1: 1kHz-ish sawtooth with a snappy envelope.
/// sid.write(0x00, 0x00); // FREQ LO
/// sid.write(0x01, 0x10); // FREQ HI
/// sid.write(0x05, 0x09); // attack/decay
/// sid.write(0x18, 0x0f); // volume
/// sid.write(0x04, 0x21); // gate + sawtooth
///
/// let mut buffer = [0i16; 1024];
/// let (samples, _remaining) = sid.sample(20_000, &mut buffer, 1);
/// ```
#[derive(Clone)]
pub struct Sid {
    // Functional Units
    sampler: Sampler,
    // Runtime State
    bus_value: u8,
    bus_value_ttl: u32,
}

/// Configuration for constructing a [`Sid`].
#[cfg(all(feature = "alloc", feature = "std"))]
#[derive(Clone, Debug)]
pub struct SidConfig {
    /// SID chip model to emulate (default: MOS 6581).
    pub chip_model: ChipModel,
    /// Audio sampling method (default: `SamplingMethod::Fast`).
    pub sampling_method: SamplingMethod,
    /// SID clock frequency in Hz (default: PAL C64 clock).
    pub clock_freq: u32,
    /// Output sample rate in Hz (default: 44.1kHz).
    pub sample_freq: u32,
}

#[cfg(all(feature = "alloc", feature = "std"))]
impl Default for SidConfig {
    fn default() -> Self {
        SidConfig {
            chip_model: ChipModel::default(),
            sampling_method: SamplingMethod::Fast,
            clock_freq: DEFAULT_CLOCK_FREQ,
            sample_freq: DEFAULT_SAMPLE_FREQ,
        }
    }
}

impl Sid {
    /// Construct a SID with default PAL clock, 44.1kHz sample rate, and
    /// fast sampling.
    pub fn new(chip_model: ChipModel) -> Self {
        Self::from_parts(
            chip_model,
            SamplingMethod::Fast,
            DEFAULT_CLOCK_FREQ,
            DEFAULT_SAMPLE_FREQ,
        )
    }

    /// Construct a SID from a full configuration.
    #[cfg(all(feature = "alloc", feature = "std"))]
    pub fn from_config(config: SidConfig) -> Self {
        Self::from_parts(
            config.chip_model,
            config.sampling_method,
            config.clock_freq,
            config.sample_freq,
        )
    }

    fn from_parts(
        chip_model: ChipModel,
        sampling_method: SamplingMethod,
        clock_freq: u32,
        sample_freq: u32,
    ) -> Self {
        let synth = Synth::new(chip_model);
        let mut sid = Sid {
            sampler: Sampler::new(synth),
            bus_value: 0,
            bus_value_ttl: 0,
        };
        sid.set_sampling_parameters(sampling_method, clock_freq, sample_freq)
            .expect("default sampling parameters are valid");
        sid
    }

    /// Switch the emulated chip model, rebuilding the DAC, combined
    /// waveform, and cutoff tables. Chip state is preserved.
    pub fn set_chip_model(&mut self, chip_model: ChipModel) {
        self.sampler.synth.set_chip_model(chip_model);
    }

    /// Set sampling parameters for audio output.
    ///
    /// # Errors
    /// Returns `SamplingError::ZeroClockFreq` if `clock_freq` is zero.
    /// Returns `SamplingError::ZeroSampleFreq` if `sample_freq` is zero.
    pub fn set_sampling_parameters(
        &mut self,
        method: SamplingMethod,
        clock_freq: u32,
        sample_freq: u32,
    ) -> Result<(), SamplingError> {
        self.sampler
            .set_parameters(method, clock_freq, sample_freq)?;
        // The external filter poles are fixed analog values; their digital
        // coefficients depend on the emulated clock.
        self.sampler
            .synth
            .ext_filter
            .set_clock_frequency(clock_freq as f64);
        Ok(())
    }

    /// Advance the chip by one clock cycle.
    pub fn clock(&mut self) {
        // Let the bus byte decay.
        if self.bus_value_ttl > 0 {
            self.bus_value_ttl -= 1;
            if self.bus_value_ttl == 0 {
                self.bus_value = 0;
            }
        }
        self.sampler.synth.clock();
    }

    /// Advance the chip by `delta` cycles.
    pub fn clock_delta(&mut self, delta: u32) {
        // Let the bus byte decay.
        if self.bus_value_ttl >= delta {
            self.bus_value_ttl -= delta;
        } else {
            self.bus_value_ttl = 0;
        }
        if self.bus_value_ttl == 0 {
            self.bus_value = 0;
        }
        self.sampler.synth.clock_delta(delta);
    }

    /// Enable or disable the external output filter (C64 audio stage).
    ///
    /// The external filter models the C64's audio output circuitry: a
    /// low-pass (~16kHz) followed by a DC-blocking high-pass. Enabled by
    /// default.
    pub fn set_external_filter_enabled(&mut self, enabled: bool) {
        self.sampler.synth.ext_filter.set_enabled(enabled);
    }

    /// Enable or disable the internal SID filter.
    ///
    /// Disabling bypasses all filter processing; the voices then mix
    /// directly. Enabled by default.
    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.sampler.synth.filter.set_enabled(enabled);
    }

    /// Set the filter curve parameter for tuning to match specific SID
    /// chips: 0.0 (bright) to 1.0 (dark), default 0.5.
    pub fn set_filter_curve(&mut self, curve: f64) {
        self.sampler.synth.filter.set_filter_curve(curve);
    }

    /// Current filter curve parameter.
    pub fn get_filter_curve(&self) -> f64 {
        self.sampler.synth.filter.get_filter_curve()
    }

    /// Mute or unmute a voice (0-2). Not a SID register; host mixer
    /// feature.
    pub fn set_voice_mute(&mut self, voice: usize, muted: bool) {
        if voice < 3 {
            self.sampler.synth.voices[voice].set_mute(muted);
        }
    }

    /// Feed an external audio input sample (EXT IN pin).
    pub fn input(&mut self, sample: i32) {
        // Voice outputs are 20 bits. Scale up to match three voices in
        // order to facilitate simulation of the MOS8580 "digi boost"
        // hardware hack.
        self.sampler.synth.ext_in = (sample << 4) * 3;
    }

    /// Current audio sample, scaled to 16 bits.
    pub fn output(&self) -> i16 {
        self.sampler.synth.output()
    }

    /// Reset all internal SID state to power-on values.
    pub fn reset(&mut self) {
        self.sampler.reset();
        self.bus_value = 0;
        self.bus_value_ttl = 0;
    }

    /// SID clocking with audio sampling; fixpoint arithmetic is used.
    ///
    /// The example below shows how to clock the SID a specified amount of
    /// cycles while producing audio output:
    /// ```ignore
    /// let mut buffer = [0i16; 8192];
    /// while delta > 0 {
    ///     let (samples, next_delta) = sid.sample(delta, &mut buffer[..], 1);
    ///     for i in 0..samples {
    ///         output.write(buffer[i]);
    ///     }
    ///     delta = next_delta;
    /// }
    /// ```
    pub fn sample(&mut self, delta: u32, buffer: &mut [i16], interleave: usize) -> (usize, u32) {
        self.sampler.clock(delta, buffer, interleave)
    }

    /// Fill the provided buffer with up to `buffer.len() / interleave`
    /// samples, advancing the chip as needed, and return the number of
    /// frames written.
    ///
    /// Internally uses a large delta, so callers should interleave regular
    /// calls (e.g. once per audio callback) instead of relying on one huge
    /// invocation.
    pub fn sample_frames(&mut self, buffer: &mut [i16], interleave: usize) -> usize {
        let frames = buffer.len() / interleave.max(1);
        if frames == 0 {
            return 0;
        }
        let (written, _remaining) = self.sample(u32::MAX, buffer, interleave);
        written
    }

    // -- Device I/O

    /// Read a SID register (write-only registers return the decayed bus
    /// value).
    pub fn read(&self, reg: u8) -> u8 {
        self.sampler.synth.read(reg, self.bus_value)
    }

    /// Write a SID register.
    pub fn write(&mut self, reg: u8, value: u8) {
        self.bus_value = value;
        self.bus_value_ttl = BUS_VALUE_TTL;
        self.sampler.synth.write(reg, value);
    }

    // -- State

    /// Snapshot full SID state (registers and internals).
    pub fn read_state(&self) -> State {
        let mut state = State::default();
        for i in 0..3 {
            let j = i * 7;
            let wave = &self.sampler.synth.voices[i].wave;
            let envelope = &self.sampler.synth.voices[i].envelope;
            state.sid_register[j] = wave.get_frequency_lo();
            state.sid_register[j + 1] = wave.get_frequency_hi();
            state.sid_register[j + 2] = wave.get_pulse_width_lo();
            state.sid_register[j + 3] = wave.get_pulse_width_hi();
            state.sid_register[j + 4] = wave.get_control() | envelope.get_control();
            state.sid_register[j + 5] = envelope.get_attack_decay();
            state.sid_register[j + 6] = envelope.get_sustain_release();
        }
        let filter = &self.sampler.synth.filter;
        state.sid_register[0x15] = filter.get_fc_lo();
        state.sid_register[0x16] = filter.get_fc_hi();
        state.sid_register[0x17] = filter.get_res_filt();
        state.sid_register[0x18] = filter.get_mode_vol();
        for i in 0x19..0x1d {
            state.sid_register[i] = self.read(i as u8);
        }
        state.bus_value = self.bus_value;
        state.bus_value_ttl = self.bus_value_ttl;
        state.ext_in = self.sampler.synth.ext_in;
        for i in 0..3 {
            let wave = &self.sampler.synth.voices[i].wave;
            let envelope = &self.sampler.synth.voices[i].envelope;
            state.accumulator[i] = wave.get_acc();
            state.shift_register[i] = wave.get_shift();
            state.envelope_state[i] = envelope.state as u8;
            state.envelope_counter[i] = envelope.envelope_counter;
            state.exponential_counter[i] = envelope.exponential_counter;
            state.exponential_counter_period[i] = envelope.exponential_counter_period;
            state.hold_zero[i] = envelope.hold_zero as u8;
            state.rate_counter[i] = envelope.rate_counter;
            state.rate_counter_period[i] = envelope.rate_counter_period;
        }
        state
    }

    /// Restore full SID state (registers and internals).
    pub fn write_state(&mut self, state: &State) {
        for i in 0..0x19 {
            self.write(i, state.sid_register[i as usize]);
        }
        self.bus_value = state.bus_value;
        self.bus_value_ttl = state.bus_value_ttl;
        self.sampler.synth.ext_in = state.ext_in;
        for i in 0..3 {
            let voice = &mut self.sampler.synth.voices[i];
            voice.wave.acc = state.accumulator[i];
            voice.wave.shift = state.shift_register[i];
            let envelope = &mut voice.envelope;
            envelope.state = match state.envelope_state[i] {
                0 => EnvState::Attack,
                1 => EnvState::DecaySustain,
                _ => EnvState::Release,
            };
            envelope.envelope_counter = state.envelope_counter[i];
            envelope.exponential_counter = state.exponential_counter[i];
            envelope.exponential_counter_period = state.exponential_counter_period[i];
            envelope.hold_zero = state.hold_zero[i] != 0;
            envelope.rate_counter = state.rate_counter[i];
            envelope.rate_counter_period = state.rate_counter_period[i];
        }
    }
}
