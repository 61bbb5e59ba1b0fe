use criterion::Criterion;
use mos_sid::sampler::{compute_convolution_fir, compute_convolution_fir_fallback};

pub fn bench_convolution_fir(c: &mut Criterion) {
    let samples = [2i16; 1024];
    let fir = [5i16; 1024];
    c.bench_function("convolution_fir", |b| {
        b.iter(|| compute_convolution_fir(&samples[..], &fir[..]))
    });
    c.bench_function("convolution_fir_fallback", |b| {
        b.iter(|| compute_convolution_fir_fallback(&samples[..], &fir[..]))
    });
}
