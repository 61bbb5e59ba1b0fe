use criterion::{criterion_group, criterion_main};

mod sampler_bench;

criterion_group!(
    benches,
    sid_bench::bench_clock_delta,
    sid_bench::bench_sample,
    sampler_bench::bench_convolution_fir
);

criterion_main!(benches);
