// Two-pass sinc resampling through an intermediate frequency.

use mos_sid::{ChipModel, SamplingMethod, Sid};

/// PAL C64 clock frequency.
const CLOCK_FREQ: u32 = 985_248;

/// Output sample rate.
const SAMPLE_FREQ: u32 = 48_000;

fn two_pass_sid(clock_freq: u32, sample_freq: u32) -> Sid {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.set_sampling_parameters(SamplingMethod::ResampleTwoPass, clock_freq, sample_freq)
        .expect("sampling parameters are valid");
    sid
}

/// Configure voice 1 with a simple test tone (sawtooth, fast envelope).
fn setup_test_tone(sid: &mut Sid) {
    sid.write(0x18, 0x0f); // volume = 15
    sid.write(0x05, 0x00); // attack = 0, decay = 0
    sid.write(0x06, 0xf0); // sustain = 15, release = 0
    sid.write(0x00, 0x00); // freq lo
    sid.write(0x01, 0x20); // freq hi
    sid.write(0x04, 0x21); // gate on, sawtooth
}

macro_rules! assert_resampler_works {
    ($clock:expr, $sample:expr, $msg:expr) => {{
        let mut sid = Sid::new(ChipModel::Mos6581);
        let result = sid.set_sampling_parameters(SamplingMethod::ResampleTwoPass, $clock, $sample);
        assert!(result.is_ok(), "{}: init failed", $msg);

        sid.write(0x04, 0x11);
        let mut buffer = [0i16; 256];
        let (n, _) = sid.sample(100_000, &mut buffer, 1);
        assert!(n > 0, "{}: no output", $msg);
    }};
}

#[test]
fn initializes() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    let result =
        sid.set_sampling_parameters(SamplingMethod::ResampleTwoPass, CLOCK_FREQ, SAMPLE_FREQ);
    assert!(result.is_ok());
}

#[test]
fn produces_output() {
    let mut sid = two_pass_sid(CLOCK_FREQ, SAMPLE_FREQ);
    setup_test_tone(&mut sid);

    let mut buffer = [0i16; 8192];
    let mut total_samples = 0;
    let mut non_zero_samples = 0;

    for _ in 0..2_000 {
        let (n, _) = sid.sample(CLOCK_FREQ / SAMPLE_FREQ, &mut buffer, 1);
        total_samples += n;
        non_zero_samples += buffer[..n].iter().filter(|&&s| s != 0).count();
    }

    assert!(total_samples > 0, "should produce samples");
    assert!(non_zero_samples > 0, "should produce non-zero output");
}

/// The two-pass path carries roughly the same signal power as the
/// single-pass resampler.
#[test]
fn matches_single_pass_approximately() {
    fn generate_samples(method: SamplingMethod) -> Vec<i16> {
        let mut sid = Sid::new(ChipModel::Mos6581);
        sid.set_sampling_parameters(method, CLOCK_FREQ, SAMPLE_FREQ)
            .expect("sampling parameters are valid");

        sid.write(0x05, 0x00);
        sid.write(0x06, 0xf0);
        sid.write(0x00, 0x00);
        sid.write(0x01, 0x08);
        sid.write(0x04, 0x11); // gate on, triangle
        sid.write(0x18, 0x0f);

        let mut all_samples = Vec::new();
        let mut buffer = [0i16; 1024];
        let cycles_per_sample = CLOCK_FREQ / SAMPLE_FREQ;
        for _ in 0..1_000 {
            let (n, _) = sid.sample(cycles_per_sample, &mut buffer, 1);
            all_samples.extend_from_slice(&buffer[..n]);
        }
        all_samples
    }

    let single_pass = generate_samples(SamplingMethod::Resample);
    let two_pass = generate_samples(SamplingMethod::ResampleTwoPass);

    let len_diff = (single_pass.len() as i32 - two_pass.len() as i32).abs();
    assert!(
        len_diff < 10,
        "sample counts should be similar: single={}, two_pass={}",
        single_pass.len(),
        two_pass.len()
    );

    let single_power: f64 = single_pass.iter().map(|&s| (s as f64).powi(2)).sum();
    let two_power: f64 = two_pass.iter().map(|&s| (s as f64).powi(2)).sum();
    if single_power > 0.0 && two_power > 0.0 {
        let power_ratio_db = 10.0 * (two_power / single_power).log10();
        assert!(
            power_ratio_db.abs() < 3.0,
            "power difference should be within 3dB, got {:.2}dB",
            power_ratio_db
        );
    }
}

/// Reset clears the resampler pipeline.
#[test]
fn reset_clears_state() {
    let mut sid = two_pass_sid(CLOCK_FREQ, SAMPLE_FREQ);
    let mut buffer = [0i16; 1024];

    setup_test_tone(&mut sid);
    for _ in 0..50 {
        let _ = sid.sample(100, &mut buffer, 1);
    }
    sid.reset();

    let (n, _) = sid.sample(100, &mut buffer, 1);
    for (i, &sample) in buffer[..n].iter().enumerate() {
        assert!(
            sample.abs() < 100,
            "sample {} after reset should be near zero, got {}",
            i,
            sample
        );
    }
}

#[test]
fn various_sample_rates() {
    assert_resampler_works!(CLOCK_FREQ, 22_050, "22050 Hz");
    assert_resampler_works!(CLOCK_FREQ, 44_100, "44100 Hz");
    assert_resampler_works!(CLOCK_FREQ, 48_000, "48000 Hz");
    assert_resampler_works!(CLOCK_FREQ, 96_000, "96000 Hz");
}

#[test]
fn ntsc_clock() {
    const NTSC_CLOCK: u32 = 1_022_727;
    assert_resampler_works!(NTSC_CLOCK, SAMPLE_FREQ, "NTSC clock");
}
