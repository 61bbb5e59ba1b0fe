// Multimode filter: voice routing, tap mixing, register access, and
// numerical stability at the 8-cycle window limit.

use mos_sid::filter::{mix_filter_output, route_voices, Filter};
use mos_sid::ChipModel;

/// Every filt mask splits the four inputs into disjoint filtered and
/// bypassed sums.
#[test]
fn routing_is_a_partition() {
    let (v1, v2, v3, ext) = (1, 10, 100, 1000);
    for filt in 0u8..=0x0f {
        let (vi, vnf) = route_voices(filt, v1, v2, v3, ext);
        assert_eq!(vi + vnf, v1 + v2 + v3 + ext, "filt {:#x}", filt);

        let mut expected_vi = 0;
        for (bit, v) in [v1, v2, v3, ext].iter().enumerate() {
            if filt & (1 << bit) != 0 {
                expected_vi += v;
            }
        }
        assert_eq!(vi, expected_vi, "filt {:#x}", filt);
    }
}

/// Tap mixing follows the LP/BP/HP mode bits.
#[test]
fn tap_mixing() {
    let (vhp, vbp, vlp) = (1, 10, 100);
    assert_eq!(mix_filter_output(vhp, vbp, vlp, 0x0), 0);
    assert_eq!(mix_filter_output(vhp, vbp, vlp, 0x1), vlp);
    assert_eq!(mix_filter_output(vhp, vbp, vlp, 0x2), vbp);
    assert_eq!(mix_filter_output(vhp, vbp, vlp, 0x4), vhp);
    assert_eq!(mix_filter_output(vhp, vbp, vlp, 0x7), vhp + vbp + vlp);
}

/// Register bytes read back as written.
#[test]
fn register_roundtrip() {
    let mut filter = Filter::new(ChipModel::Mos6581);

    filter.set_fc_lo(0xff); // only the low 3 bits stick
    filter.set_fc_hi(0xa5);
    assert_eq!(filter.get_fc_lo(), 0x07);
    assert_eq!(filter.get_fc_hi(), 0xa5);

    filter.set_res_filt(0x9c);
    assert_eq!(filter.get_res_filt(), 0x9c);

    filter.set_mode_vol(0xd7);
    assert_eq!(filter.get_mode_vol(), 0xd7);
}

/// 3OFF silences voice 3 only when it is not routed through the filter.
#[test]
fn voice3_off() {
    let mut filter = Filter::new(ChipModel::Mos6581);
    filter.set_mode_vol(0x8f); // 3OFF + full volume

    filter.clock(0, 0, 1 << 18, 0);
    assert_eq!(filter.vnf, 0, "unfiltered voice 3 must be cut by 3OFF");

    filter.reset();
    filter.set_mode_vol(0x8f);
    filter.set_res_filt(0x04); // route voice 3 through the filter
    filter.clock(0, 0, 1 << 18, 0);
    assert_ne!(filter.vhp, 0, "filtered voice 3 is not affected by 3OFF");
}

/// Master volume scales the mixed output.
#[test]
fn volume_scales_output() {
    let mut filter = Filter::new(ChipModel::Mos6581);
    filter.set_mode_vol(0x0f);
    filter.clock(1 << 18, 0, 0, 0);
    let loud = filter.output();

    filter.reset();
    filter.set_mode_vol(0x05);
    filter.clock(1 << 18, 0, 0, 0);
    let quiet = filter.output();

    assert!(loud != 0 && quiet != 0);
    assert_eq!(loud / 3, quiet, "output scales linearly with volume");
}

/// Maximum resonance and cutoff stay bounded when clocked in 8-cycle
/// windows with a full-scale square input.
#[test]
fn stable_at_max_resonance() {
    let mut filter = Filter::new(ChipModel::Mos6581);
    filter.set_fc_lo(0x07);
    filter.set_fc_hi(0xff);
    filter.set_res_filt(0xf1); // max resonance, filter voice 1
    filter.set_mode_vol(0x7f); // all taps, full volume

    let amplitude = (0xfff >> 1) * 0xff; // half-scale 20-bit voice output
    for i in 0..250_000 {
        let vi = if (i / 64) % 2 == 0 { amplitude } else { -amplitude };
        filter.clock_delta(8, vi, 0, 0, 0);
        for v in [filter.vhp, filter.vbp, filter.vlp] {
            assert!(
                v.abs() < 1 << 24,
                "state escaped at iteration {}: vhp={} vbp={} vlp={}",
                i,
                filter.vhp,
                filter.vbp,
                filter.vlp
            );
        }
    }
}

/// Disabling the filter routes everything to the bypass sum and clears the
/// integrators.
#[test]
fn disabled_filter_bypasses() {
    let mut filter = Filter::new(ChipModel::Mos6581);
    filter.set_res_filt(0x0f);
    filter.set_mode_vol(0x1f);
    for _ in 0..8 {
        filter.clock_delta(8, 1 << 18, 1 << 18, 0, 0);
    }
    assert_ne!(filter.vbp, 0);

    filter.set_enabled(false);
    filter.clock(1 << 18, 1 << 18, 0, 0);
    assert_eq!(filter.vhp, 0);
    assert_eq!(filter.vbp, 0);
    assert_eq!(filter.vlp, 0);
    assert_eq!(filter.vnf, 2 * ((1 << 18) >> 7));
}

/// The filter curve shifts the cutoff mapping without destabilizing the
/// states.
#[test]
fn filter_curve_affects_response() {
    let mut bright = Filter::new(ChipModel::Mos6581);
    let mut dark = Filter::new(ChipModel::Mos6581);
    bright.set_filter_curve(0.0);
    dark.set_filter_curve(1.0);

    for filter in [&mut bright, &mut dark] {
        filter.set_fc_hi(0x80);
        filter.set_res_filt(0x01);
        filter.set_mode_vol(0x1f);
        for _ in 0..64 {
            filter.clock_delta(8, 1 << 18, 0, 0, 0);
        }
    }

    assert_ne!(
        bright.vlp, dark.vlp,
        "curve tuning should change the integrator trajectory"
    );
}
