use criterion::{black_box, criterion_group, criterion_main, Criterion};
use render_ssim::{compute_ssim, FloatImage, SsimConfig, SsimReference};

fn gradient(width: usize, height: usize) -> FloatImage {
    let planes = vec![
        (0..width * height)
            .map(|i| (i % width) as f32 / width as f32)
            .collect(),
        (0..width * height)
            .map(|i| (i / width) as f32 / height as f32)
            .collect(),
        (0..width * height)
            .map(|i| ((i % width) + (i / width)) as f32 / (width + height) as f32)
            .collect(),
    ];
    FloatImage::from_planes(planes, width, height).unwrap()
}

fn perturbed(base: &FloatImage) -> FloatImage {
    let planes = base
        .planes()
        .iter()
        .map(|plane| plane.iter().map(|&v| (v * 0.95 + 0.02).min(1.0)).collect())
        .collect();
    FloatImage::from_planes(planes, base.width(), base.height()).unwrap()
}

fn bench_ssim(c: &mut Criterion) {
    let reference = gradient(512, 512);
    let candidate = perturbed(&reference);
    let config = SsimConfig::new(1.0);

    c.bench_function("compute_ssim_512", |b| {
        b.iter(|| compute_ssim(black_box(&reference), black_box(&candidate), config).unwrap())
    });

    let prepared = SsimReference::new(&reference, config).unwrap();
    c.bench_function("reference_compare_512", |b| {
        b.iter(|| prepared.compare(black_box(&candidate)).unwrap())
    });

    c.bench_function("compute_ssim_gaussian_512", |b| {
        b.iter(|| {
            compute_ssim(
                black_box(&reference),
                black_box(&candidate),
                SsimConfig::gaussian(1.0),
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_ssim);
criterion_main!(benches);
