// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Combined waveform tables.
//!
//! Selecting several waveforms at once short-circuits their output bits on
//! the waveform bus. A zero bit in one waveform drags the corresponding bit
//! in the others towards zero, and because each bit is also connected to its
//! neighbors through the register holding the upper accumulator bits, zero
//! bits bleed into adjacent positions as well. The result is close to, but
//! not exactly, an AND of the selected waveforms.
//!
//! The tables here are synthesized from a bit-coupling model of that bus:
//! each of the 12 output bits starts at the level driven by the selected
//! waveforms, is averaged with its neighbors using distance-decayed weights
//! (and with the common pulse rail when pulse is selected), and is then
//! compared against a switching threshold. Model parameters are fitted per
//! chip model; the 8580's stronger bus drive makes it behave closer to a
//! plain AND than the 6581.
//!
//! Tables store the upper 8 bits of the 12-bit output, losing the 4 LSBs of
//! waveform resolution. Combinations including triangle are indexed by the
//! left-shifted accumulator (the triangle XOR stage shifts the MSB out), so
//! at table index `i` the triangle contributes the bits of `i` and the
//! sawtooth the bits of `i >> 1`.

#[cfg(not(feature = "std"))]
use super::math::F64Ext;
use super::ChipModel;

/// Entries per combined waveform table (12-bit accumulator index).
const TABLE_SIZE: usize = 4096;

/// Output bits driven onto the waveform bus.
const BUS_BITS: usize = 12;

/// Waveform combinations resolved by table lookup.
#[derive(Clone, Copy)]
enum Combination {
    /// Sawtooth + triangle.
    SawTri,
    /// Pulse + triangle.
    PulseTri,
    /// Pulse + sawtooth.
    PulseSaw,
    /// Pulse + sawtooth + triangle.
    PulseSawTri,
}

/// Bus model parameters for one combination on one chip model.
struct BusModel {
    /// Switching threshold of the bus readout.
    bias: f64,
    /// Pull of the common pulse rail, zero when pulse is not selected.
    pulse_strength: f64,
    /// Base of the exponential decay of inter-bit coupling.
    distance: f64,
    /// Triangle weight where triangle and sawtooth drive the same bit.
    saw_tri_mix: f64,
}

impl BusModel {
    const fn for_combination(combination: Combination, chip_model: ChipModel) -> Self {
        match chip_model {
            ChipModel::Mos6581 => match combination {
                Combination::SawTri => BusModel {
                    bias: 0.70,
                    pulse_strength: 0.0,
                    distance: 4.0,
                    saw_tri_mix: 0.58,
                },
                Combination::PulseTri => BusModel {
                    bias: 0.93,
                    pulse_strength: 2.0,
                    distance: 6.0,
                    saw_tri_mix: 1.0,
                },
                Combination::PulseSaw => BusModel {
                    bias: 0.88,
                    pulse_strength: 2.4,
                    distance: 8.0,
                    saw_tri_mix: 0.0,
                },
                Combination::PulseSawTri => BusModel {
                    bias: 0.92,
                    pulse_strength: 1.6,
                    distance: 6.0,
                    saw_tri_mix: 0.40,
                },
            },
            ChipModel::Mos8580 => match combination {
                Combination::SawTri => BusModel {
                    bias: 0.68,
                    pulse_strength: 0.0,
                    distance: 9.0,
                    saw_tri_mix: 0.50,
                },
                Combination::PulseTri => BusModel {
                    bias: 0.94,
                    pulse_strength: 1.8,
                    distance: 10.0,
                    saw_tri_mix: 1.0,
                },
                Combination::PulseSaw => BusModel {
                    bias: 0.94,
                    pulse_strength: 1.8,
                    distance: 12.0,
                    saw_tri_mix: 0.0,
                },
                Combination::PulseSawTri => BusModel {
                    bias: 0.95,
                    pulse_strength: 1.6,
                    distance: 10.0,
                    saw_tri_mix: 0.50,
                },
            },
        }
    }
}

/// Combined waveform lookup tables for one chip model.
#[derive(Clone)]
pub struct WaveTables {
    /// Sawtooth + triangle.
    pub saw_tri: [u8; TABLE_SIZE],
    /// Pulse + triangle.
    pub pulse_tri: [u8; TABLE_SIZE],
    /// Pulse + sawtooth.
    pub pulse_saw: [u8; TABLE_SIZE],
    /// Pulse + sawtooth + triangle.
    pub pulse_saw_tri: [u8; TABLE_SIZE],
}

impl WaveTables {
    /// Synthesize all four tables for the given chip model.
    pub fn new(chip_model: ChipModel) -> Self {
        let mut tables = WaveTables {
            saw_tri: [0; TABLE_SIZE],
            pulse_tri: [0; TABLE_SIZE],
            pulse_saw: [0; TABLE_SIZE],
            pulse_saw_tri: [0; TABLE_SIZE],
        };
        build_table(&mut tables.saw_tri, Combination::SawTri, chip_model);
        build_table(&mut tables.pulse_tri, Combination::PulseTri, chip_model);
        build_table(&mut tables.pulse_saw, Combination::PulseSaw, chip_model);
        build_table(&mut tables.pulse_saw_tri, Combination::PulseSawTri, chip_model);
        tables
    }
}

/// Bit levels driven by the selected waveforms at the given table index.
fn drive_levels(index: usize, combination: Combination, model: &BusModel) -> [f64; BUS_BITS] {
    // Shifted-index tables: triangle bits come straight from the index,
    // sawtooth bits from index >> 1. The pulse+sawtooth table is indexed by
    // the unshifted upper accumulator bits instead.
    let (tri, saw) = match combination {
        Combination::PulseSaw => (0, index),
        _ => (index, index >> 1),
    };

    let mut levels = [0.0; BUS_BITS];
    for (bit, level) in levels.iter_mut().enumerate() {
        let t = ((tri >> bit) & 1) as f64;
        let s = ((saw >> bit) & 1) as f64;
        *level = (1.0 - model.saw_tri_mix) * s + model.saw_tri_mix * t;
    }
    levels
}

fn build_table(table: &mut [u8; TABLE_SIZE], combination: Combination, chip_model: ChipModel) {
    let model = BusModel::for_combination(combination, chip_model);

    // Coupling weight by bit distance, 1/distance^d.
    let mut weight = [0.0; BUS_BITS];
    for (d, w) in weight.iter_mut().enumerate() {
        *w = model.distance.powi(-(d as i32));
    }

    for (index, out) in table.iter_mut().enumerate() {
        let levels = drive_levels(index, combination, &model);

        let mut value = 0u16;
        for bit in 0..BUS_BITS {
            let mut drive = levels[bit];
            let mut norm = 1.0;
            for other in 0..BUS_BITS {
                if other == bit {
                    continue;
                }
                let w = weight[(bit as i32 - other as i32).unsigned_abs() as usize];
                drive += w * levels[other];
                norm += w;
            }
            // The pulse rail is high whenever these table entries are
            // visible; the lookup is masked with the pulse output anyway.
            drive += model.pulse_strength;
            norm += model.pulse_strength;

            if drive / norm > model.bias {
                value |= 1 << bit;
            }
        }

        *out = (value >> 4) as u8;
    }
}
