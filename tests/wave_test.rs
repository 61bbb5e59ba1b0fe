// Oscillator behavior: accumulator, noise LFSR, TEST bit, waveform
// outputs, hard sync and ring modulation.

use mos_sid::wave::{Syncable, WaveformGenerator};
use mos_sid::ChipModel;

fn new_wave() -> WaveformGenerator {
    let mut gen = WaveformGenerator::new(ChipModel::Mos6581);
    gen.reset();
    gen
}

fn clock_n(gen: &mut WaveformGenerator, n: u32) {
    for _ in 0..n {
        gen.clock();
    }
}

/// LFSR initializes to 0x7ffff8.
#[test]
fn shift_register_init_value() {
    let gen = new_wave();
    assert_eq!(gen.get_shift(), 0x007f_fff8);
}

/// Noise is extracted from LFSR bits 22,20,16,13,11,7,4,2 into output
/// bits 11-4.
#[test]
fn noise_output() {
    let mut gen = new_wave();
    gen.shift = 0x0035_555f;
    gen.set_control(0x80); // noise waveform

    let out = gen.output(None);
    assert!(out > 0, "noise should produce non-zero output");
    assert_eq!(out & 0x000f, 0, "noise only drives the upper 8 output bits");
}

/// The noise output is a pure function of the shift register.
#[test]
fn noise_output_reference() {
    let mut gen = new_wave();
    gen.set_control(0x80);
    for shift in [0x007f_fff8u32, 0x0035_555f, 0x0040_0000, 0x0000_0004] {
        gen.shift = shift;
        let expected = (((shift >> 22) & 1) << 11)
            | (((shift >> 20) & 1) << 10)
            | (((shift >> 16) & 1) << 9)
            | (((shift >> 13) & 1) << 8)
            | (((shift >> 11) & 1) << 7)
            | (((shift >> 7) & 1) << 6)
            | (((shift >> 4) & 1) << 5)
            | (((shift >> 2) & 1) << 4);
        assert_eq!(gen.output(None), expected as u16);
    }
}

/// TEST bit clears accumulator and LFSR; releasing it restores the initial
/// LFSR pattern. This allows deterministic noise restart in music routines.
#[test]
fn test_bit_clears_and_restores() {
    let mut gen = new_wave();
    gen.set_frequency_lo(0xff);
    gen.set_frequency_hi(0xff);
    clock_n(&mut gen, 1000);
    assert!(gen.get_acc() != 0);

    gen.set_control(0x08);
    assert_eq!(gen.get_acc(), 0);
    assert_eq!(gen.get_shift(), 0);

    // The accumulator stays frozen while TEST is held.
    clock_n(&mut gen, 100);
    assert_eq!(gen.get_acc(), 0);

    gen.set_control(0x00);
    assert_eq!(gen.get_shift(), 0x007f_fff8);
}

/// Accumulator adds the frequency value each cycle.
#[test]
fn accumulator_increment() {
    let mut gen = new_wave();
    gen.set_frequency_lo(0x01);

    gen.clock();
    assert_eq!(gen.get_acc(), 1);
    gen.clock();
    assert_eq!(gen.get_acc(), 2);

    gen.set_frequency_lo(0x00);
    gen.set_frequency_hi(0x01); // freq = 256
    let before = gen.get_acc();
    gen.clock();
    assert_eq!(gen.get_acc(), before + 256);
}

/// With frequency zero the accumulator does not move.
#[test]
fn accumulator_holds_at_zero_frequency() {
    let mut gen = new_wave();
    gen.set_acc(0x0012_3456);
    gen.clock();
    gen.clock_delta(1000);
    assert_eq!(gen.get_acc(), 0x0012_3456);
}

/// 24-bit accumulator wraps at 2^24.
#[test]
fn accumulator_wrap() {
    let mut gen = new_wave();
    gen.set_acc(0x00ff_fffe);
    gen.set_frequency_lo(0x10);
    gen.clock();

    assert_eq!(gen.get_acc(), 0x0000_000e);
}

/// LFSR clocks when accumulator bit 19 transitions 0 -> 1.
#[test]
fn shift_register_clocks_on_bit19() {
    let mut gen = new_wave();
    let initial = gen.get_shift();

    gen.set_acc(0x0007_fff0);
    gen.set_frequency_lo(0x20);
    gen.clock(); // 0x7fff0 + 0x20 = 0x80010, bit 19 rises

    assert_ne!(gen.get_shift(), initial, "LFSR should clock on bit 19 rise");

    // A falling bit 19 does not clock the LFSR.
    let shifted = gen.get_shift();
    gen.set_acc(0x000f_fff0);
    gen.clock(); // 0xffff0 + 0x20 = 0x100010, bit 19 falls
    assert_eq!(gen.get_shift(), shifted);
}

/// Bulk clocking advances accumulator and LFSR exactly like single cycles.
#[test]
fn clock_delta_matches_single_stepping() {
    for freq in [0x0001u16, 0x0800, 0x1234, 0x8000, 0xffff] {
        let mut single = new_wave();
        let mut bulk = new_wave();
        for gen in [&mut single, &mut bulk] {
            gen.set_frequency_lo(freq as u8);
            gen.set_frequency_hi((freq >> 8) as u8);
        }

        for step in [1u32, 7, 63, 1000, 4096] {
            clock_n(&mut single, step);
            bulk.clock_delta(step);
            assert_eq!(single.get_acc(), bulk.get_acc(), "freq {:#06x}", freq);
            assert_eq!(single.get_shift(), bulk.get_shift(), "freq {:#06x}", freq);
        }
    }
}

/// The LFSR never reaches zero in normal operation.
#[test]
fn shift_register_never_zero() {
    let mut gen = new_wave();
    gen.set_frequency_lo(0xff);
    gen.set_frequency_hi(0xff);
    for _ in 0..10_000 {
        gen.clock();
        assert_ne!(gen.get_shift(), 0);
    }
}

/// MSB rising edge detection, used to trigger hard sync.
#[test]
fn msb_rising() {
    let mut gen = new_wave();
    gen.set_acc(0x007f_fff0);
    gen.set_frequency_lo(0x20);
    gen.clock();

    assert!(gen.is_msb_rising(), "should detect bit 23 transition 0 -> 1");

    gen.clock();
    assert!(!gen.is_msb_rising(), "flag clears after one cycle");
}

/// Sawtooth output is the upper 12 accumulator bits.
#[test]
fn sawtooth_reference() {
    let mut gen = new_wave();
    gen.set_control(0x20);
    for acc in [0u32, 0x0001_2345, 0x0080_0000, 0x00ff_ffff] {
        gen.set_acc(acc);
        assert_eq!(gen.output(None), (acc >> 12) as u16);
    }
}

/// Triangle folds on the MSB and doubles the remaining resolution.
#[test]
fn triangle_reference() {
    let mut gen = new_wave();
    gen.set_control(0x10);

    gen.set_acc(0x0012_3456);
    assert_eq!(gen.output(None), ((0x0012_3456u32 >> 11) & 0x0fff) as u16);

    gen.set_acc(0x00c0_0000);
    assert_eq!(
        gen.output(None),
        ((!0x00c0_0000u32 >> 11) & 0x0fff) as u16,
        "falling edge inverts the lower bits"
    );
}

/// Pulse compares the upper 12 accumulator bits against the pulse width.
#[test]
fn pulse_reference() {
    let mut gen = new_wave();
    gen.set_control(0x40);
    gen.set_pulse_width_lo(0x00);
    gen.set_pulse_width_hi(0x08);

    gen.set_acc(0x007f_f000);
    assert_eq!(gen.output(None), 0x0000);
    gen.set_acc(0x0080_0000);
    assert_eq!(gen.output(None), 0x0fff);
}

/// The TEST bit holds the pulse output high regardless of pulse width.
#[test]
fn pulse_high_under_test() {
    let mut gen = new_wave();
    gen.set_pulse_width_hi(0x0f);
    gen.set_pulse_width_lo(0xff);
    gen.set_control(0x48);
    assert_eq!(gen.output(None), 0x0fff);
}

/// Waveform combinations including noise are silenced.
#[test]
fn noise_combinations_are_silent() {
    let mut gen = new_wave();
    gen.set_acc(0x00ab_cdef);
    for waveform in 0x9u8..=0xf {
        gen.set_control(waveform << 4);
        assert_eq!(gen.output(None), 0, "waveform {:#x}", waveform);
    }
}

/// Hard sync: the destination accumulator resets when the source MSB rises.
#[test]
fn hard_sync_resets_destination() {
    let mut source = new_wave();
    let mut dest = new_wave();
    let mut third = new_wave();

    source.set_frequency_hi(0x20);
    dest.set_frequency_hi(0x08);
    dest.set_control(0x22); // sawtooth + sync

    // Source MSB rises after 0x800000 / 0x2000 = 1024 cycles.
    for cycle in 1..=1024u32 {
        source.clock();
        dest.clock();
        third.clock();
        let mut syncable = Syncable {
            main: &mut source,
            sync_dest: &mut dest,
            sync_source: &mut third,
        };
        syncable.synchronize();

        if cycle < 1024 {
            assert_eq!(dest.get_acc(), cycle * 0x0800);
        }
    }

    assert!(source.is_msb_rising());
    assert_eq!(dest.get_acc(), 0, "destination must reset on the sync cycle");
}

/// Ring modulation with a static source MSB leaves the triangle unchanged.
#[test]
fn ring_mod_with_idle_source_is_transparent() {
    let mut modulated = new_wave();
    let mut plain = new_wave();
    let source = new_wave(); // freq = 0, accumulator stays at zero

    modulated.set_frequency_hi(0x11);
    plain.set_frequency_hi(0x11);
    modulated.set_control(0x14); // triangle + ring mod
    plain.set_control(0x10); // triangle

    for _ in 0..5000 {
        modulated.clock();
        plain.clock();
        assert_eq!(modulated.output(Some(&source)), plain.output(None));
    }
}

/// Ring modulation inverts the triangle while the source MSB is high.
#[test]
fn ring_mod_follows_source_msb() {
    let mut gen = new_wave();
    let mut source = new_wave();
    gen.set_control(0x14);
    gen.set_acc(0x0012_3456);

    source.set_acc(0x0080_0000); // MSB high
    let inverted = gen.output(Some(&source));
    source.set_acc(0x0000_0000); // MSB low
    let plain = gen.output(Some(&source));

    assert_eq!(plain, ((0x0012_3456u32 >> 11) & 0x0fff) as u16);
    assert_eq!(inverted, ((!0x0012_3456u32 >> 11) & 0x0fff) as u16);
    assert_ne!(plain, inverted);
}

/// Combined waveforms come from the lookup tables and are masked by pulse.
#[test]
fn combined_waveforms_masked_by_pulse() {
    let mut gen = new_wave();
    gen.set_pulse_width_hi(0x0f);
    gen.set_pulse_width_lo(0xff);
    gen.set_acc(0x00ab_c000);

    // Pulse output is zero (acc >> 12 < pw), so pulse combinations mask
    // to zero.
    for waveform in [0x5u8, 0x6, 0x7] {
        gen.set_control(waveform << 4);
        assert_eq!(gen.output(None), 0, "waveform {:#x}", waveform);
    }

    // Sawtooth+triangle has no pulse mask and only drives the upper 8 bits.
    gen.set_control(0x30);
    assert_eq!(gen.output(None) & 0x000f, 0);
}
