use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use changeblind_color::{calibrate_hue_delta, ciede2000, hue_to_lab, PerceptualHueCdf};

pub fn bench_delta_e(c: &mut Criterion) {
    let mut group = c.benchmark_group("delta_e");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));

    let a = hue_to_lab(0.1, 0.8, 0.8);
    let b = hue_to_lab(0.12, 0.8, 0.8);
    group.bench_function("ciede2000", |bench| {
        bench.iter(|| ciede2000(black_box(a), black_box(b)));
    });

    group.bench_function("calibrate_hue_delta", |bench| {
        bench.iter(|| calibrate_hue_delta(black_box(0.6), 0.8, 0.8, 4.0, 0.05));
    });

    group.finish();
}

pub fn bench_cdf_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("perceptual_cdf");
    group.sample_size(20);
    group.bench_function("build", |bench| {
        bench.iter(|| PerceptualHueCdf::build(black_box(0.8), black_box(0.8)));
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .confidence_level(0.95)
        .noise_threshold(0.02);
    targets = bench_delta_e, bench_cdf_build
}

criterion_main!(benches);
