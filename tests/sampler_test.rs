// Output-rate adapter: soft clipping and cycle-to-sample bookkeeping.

use mos_sid::sampler::{compute_convolution_fir, compute_convolution_fir_fallback, soft_clip};
use mos_sid::{ChipModel, SamplingMethod, Sid};

/// Soft clipping threshold - values below pass unchanged.
const THRESHOLD: i32 = 28000;

/// Peak value for testing the compression region.
const PEAK: i32 = 38000;

/// Values within the threshold pass unchanged (linear region).
#[test]
fn soft_clip_linear_region() {
    for i in -THRESHOLD..=THRESHOLD {
        let clipped = soft_clip(i);
        assert_eq!(
            clipped, i as i16,
            "value {} in linear region should pass unchanged, got {}",
            i, clipped
        );
    }
}

/// Positive values above the threshold are compressed but stay <= i16::MAX.
#[test]
fn soft_clip_positive_compression() {
    for i in THRESHOLD..=PEAK {
        let clipped = soft_clip(i) as i32;
        assert!(
            clipped <= i && clipped <= i16::MAX as i32,
            "positive {} should compress: got {}",
            i,
            clipped
        );
    }
}

/// Negative values below -threshold are compressed but stay >= i16::MIN.
#[test]
fn soft_clip_negative_compression() {
    for i in (-PEAK..=-THRESHOLD).rev() {
        let clipped = soft_clip(i) as i32;
        assert!(
            clipped >= i && clipped >= i16::MIN as i32,
            "negative {} should compress: got {}",
            i,
            clipped
        );
    }
}

/// Extreme values stay within the i16 range.
#[test]
fn soft_clip_extremes() {
    assert!(soft_clip(i32::MAX) <= i16::MAX);
    assert!(soft_clip(i32::MIN) >= i16::MIN);
    assert!(soft_clip(i32::MIN + 1) >= i16::MIN);
}

/// Soft clipping is monotonic.
#[test]
fn soft_clip_monotonic() {
    let mut prev = soft_clip(-100_000);
    for i in (-100_000..=100_000).step_by(7) {
        let curr = soft_clip(i);
        assert!(
            curr >= prev,
            "soft clip should be monotonic: f({}) = {} < previous {}",
            i,
            curr,
            prev
        );
        prev = curr;
    }
}

/// The SIMD convolution matches the scalar fallback, including ragged
/// lengths.
#[test]
fn convolution_matches_fallback() {
    let samples: Vec<i16> = (0..1000).map(|i| ((i * 37) % 4093) as i16 - 2048).collect();
    let coefficients: Vec<i16> = (0..1000).map(|i| ((i * 57) % 997) as i16 - 499).collect();

    for len in [1usize, 15, 64, 65, 500, 1000] {
        assert_eq!(
            compute_convolution_fir(&samples[..len], &coefficients[..len]),
            compute_convolution_fir_fallback(&samples[..len], &coefficients[..len]),
            "length {}",
            len
        );
    }
}

/// Fast decimation produces one sample per cycles_per_sample on average.
#[test]
fn fast_sampling_rate() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.set_sampling_parameters(SamplingMethod::Fast, 1_000_000, 50_000)
        .unwrap();

    let mut buffer = [0i16; 8192];
    let mut produced = 0;
    for _ in 0..100 {
        let (n, remaining) = sid.sample(10_000, &mut buffer, 1);
        assert_eq!(remaining, 0, "buffer is large enough for the window");
        produced += n;
    }

    // 10^6 cycles at 20 cycles/sample.
    assert_eq!(produced, 50_000);
}

/// Interleaved output leaves the gaps untouched.
#[test]
fn interleaved_sampling() {
    let mut sid = Sid::new(ChipModel::Mos6581);
    sid.set_sampling_parameters(SamplingMethod::Fast, 1_000_000, 50_000)
        .unwrap();
    sid.write(0x01, 0x40);
    sid.write(0x04, 0x21);
    sid.write(0x06, 0xf0);
    sid.write(0x18, 0x0f);

    let mut buffer = [i16::MIN; 64];
    let (n, _) = sid.sample(400, &mut buffer, 2);
    assert_eq!(n, 20);
    for (i, &sample) in buffer.iter().enumerate() {
        if i % 2 == 1 {
            assert_eq!(sample, i16::MIN, "odd slots must stay untouched");
        } else if i / 2 < n {
            assert_ne!(sample, i16::MIN, "even slots carry samples");
        }
    }
}

/// Invalid sampling parameters are rejected.
#[test]
fn invalid_sampling_parameters() {
    use mos_sid::SamplingError;

    let mut sid = Sid::new(ChipModel::Mos6581);
    assert_eq!(
        sid.set_sampling_parameters(SamplingMethod::Fast, 0, 44_100),
        Err(SamplingError::ZeroClockFreq)
    );
    assert_eq!(
        sid.set_sampling_parameters(SamplingMethod::Fast, 985_248, 0),
        Err(SamplingError::ZeroSampleFreq)
    );
}
