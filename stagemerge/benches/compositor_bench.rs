//! Benchmarks for side-by-side composition.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use stagemerge::compositor::Compositor;

fn compositor_benchmark(c: &mut Criterion) {
    let compositor = Compositor::new();
    let mut group = c.benchmark_group("compose_images");

    for (name, left, right) in [
        ("same_height", (640, 480), (360, 480)),
        ("rescale_left", (1024, 576), (512, 768)),
        ("rescale_both", (1280, 720), (300, 1000)),
    ] {
        let left = RgbImage::from_pixel(left.0, left.1, Rgb([30, 90, 30]));
        let right = RgbImage::from_pixel(right.0, right.1, Rgb([200, 60, 60]));
        group.bench_with_input(BenchmarkId::from_parameter(name), &(left, right), |b, (l, r)| {
            b.iter(|| black_box(compositor.compose_images(l, r)));
        });
    }

    group.finish();
}

criterion_group!(benches, compositor_benchmark);
criterion_main!(benches);
