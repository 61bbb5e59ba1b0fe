// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! R-2R ladder DAC tables.
//!
//! The SID DACs are R-2R ladders. On the 6581 the termination resistor at
//! bit 0 is missing and the resistor matching is poor (2R/R ~ 2.20), which
//! makes the transfer function non-monotonic. The 8580 ladder is terminated
//! and accurately matched (2R/R = 2.00), giving a linear response. Tables are
//! generated once per chip model; the audio path only performs lookups.

use super::ChipModel;

/// Models the open circuit left by a missing termination resistor.
const R_INFINITY: f64 = 1e6;

/// Maximum number of ladder bits used by any SID DAC (waveform DAC).
pub const MAX_DAC_BITS: usize = 12;

impl ChipModel {
    /// MOSFET leakage keeps "off" bits from contributing exactly zero.
    const fn leakage(self) -> f64 {
        match self {
            ChipModel::Mos6581 => 0.0075,
            ChipModel::Mos8580 => 0.0035,
        }
    }

    /// Measured 2R/R resistor ratio of the ladder.
    const fn r2r_ratio(self) -> f64 {
        match self {
            ChipModel::Mos6581 => 2.20,
            ChipModel::Mos8580 => 2.00,
        }
    }

    /// Only the 8580 ladder has the bit 0 termination resistor.
    const fn has_termination(self) -> bool {
        matches!(self, ChipModel::Mos8580)
    }
}

/// Parallel resistance r1 || r2.
fn parallel(r1: f64, r2: f64) -> f64 {
    (r1 * r2) / (r1 + r2)
}

/// Voltage contribution of a single set bit in the ladder.
///
/// The tail resistance below the set bit is found by repeated parallel
/// substitution, then the bit voltage is propagated towards the output by
/// repeated source transformation.
fn bit_voltage(set_bit: usize, bits: usize, r2: f64, terminated: bool) -> f64 {
    let r = 1.0;
    let mut vn = 1.0;
    let mut rn = if terminated { r2 } else { R_INFINITY };

    for _ in 0..set_bit {
        rn = if rn >= R_INFINITY {
            r + r2
        } else {
            r + parallel(r2, rn)
        };
    }

    if rn >= R_INFINITY {
        rn = r2;
    } else {
        let rn_par = parallel(r2, rn);
        vn *= rn_par / r2;
        rn = rn_par;
    }

    for _ in (set_bit + 1)..bits {
        rn += r;
        let i = vn / rn;
        rn = parallel(r2, rn);
        vn = rn * i;
    }

    vn
}

/// Normalized per-bit voltage contributions for the given ladder width.
fn build_dac_bits(bits: usize, chip_model: ChipModel) -> [f64; MAX_DAC_BITS] {
    let r2 = chip_model.r2r_ratio();
    let terminated = chip_model.has_termination();

    let mut dac_bits = [0.0; MAX_DAC_BITS];
    let mut v_sum = 0.0;
    for (bit, v) in dac_bits[..bits].iter_mut().enumerate() {
        *v = bit_voltage(bit, bits, r2, terminated);
        v_sum += *v;
    }
    for v in &mut dac_bits[..bits] {
        *v /= v_sum;
    }

    dac_bits
}

/// Fill `table` with the integer DAC output for every ladder input.
///
/// `table.len()` must be a power of two no larger than 2^12; the bit count is
/// derived from the length. Outputs are scaled so that the all-ones input
/// maps to `table.len() - 1`.
pub fn build_dac_table(table: &mut [u16], chip_model: ChipModel) {
    let bits = table.len().trailing_zeros() as usize;
    debug_assert!(bits <= MAX_DAC_BITS && table.len() == 1 << bits);

    let dac_bits = build_dac_bits(bits, chip_model);
    let leakage = chip_model.leakage();
    let scale = (table.len() - 1) as f64;

    for (input, out) in table.iter_mut().enumerate() {
        let mut value = 0.0;
        for (bit, &bit_value) in dac_bits[..bits].iter().enumerate() {
            value += if input & (1 << bit) != 0 {
                bit_value
            } else {
                bit_value * leakage
            };
        }
        *out = (value * scale + 0.5) as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 6581 DAC is non-monotonic due to missing termination and R mismatch.
    #[test]
    fn dac_6581_nonlinear() {
        let mut table = [0u16; 256];
        build_dac_table(&mut table, ChipModel::Mos6581);

        let monotonic = table.windows(2).all(|w| w[1] > w[0]);
        assert!(!monotonic, "6581 DAC should be non-monotonic");
    }

    /// 8580 DAC is linear over the full input range.
    #[test]
    fn dac_8580_linear() {
        let mut table = [0u16; 256];
        build_dac_table(&mut table, ChipModel::Mos8580);

        for (i, w) in table.windows(2).enumerate() {
            assert!(
                w[1] > w[0],
                "8580 DAC should be monotonic: table[{}]={} <= table[{}]={}",
                i + 1,
                w[1],
                i,
                w[0]
            );
        }
    }

    /// MOSFET leakage produces a non-zero floor at input 0.
    #[test]
    fn dac_leakage() {
        let mut table = [0u16; 256];
        build_dac_table(&mut table, ChipModel::Mos6581);
        assert!(table[0] > 0, "leakage should lift the zero-input output");
    }

    /// All-ones input maps to the full-scale output value.
    #[test]
    fn dac_full_scale() {
        for chip_model in [ChipModel::Mos6581, ChipModel::Mos8580] {
            let mut table = [0u16; 4096];
            build_dac_table(&mut table, chip_model);
            assert_eq!(table[4095], 4095);
        }
    }
}
