// Preprocessing benchmark - measure the CPU-side cost around the ONNX sessions
//
// Run with: cargo bench --bench preprocessing_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use retina_cascade_classification::preprocess_for_classification;
use retina_vessel_segmentation::overlay::{render_binary_map, render_vessel_overlay};
use retina_vessel_segmentation::VesselMask;
use std::io::Cursor;

fn test_image(size: u32) -> RgbImage {
    ImageBuffer::from_fn(size, size, |x, y| {
        Rgb([
            ((x + y) % 256) as u8,
            ((x * 2) % 256) as u8,
            ((y * 2) % 256) as u8,
        ])
    })
}

fn test_mask(size: u32) -> VesselMask {
    let gray = GrayImage::from_fn(size, size, |x, y| image::Luma([u8::from((x + y) % 9 == 0)]));
    VesselMask::from_binary(gray).expect("mask is binary")
}

/// Benchmark classifier tensor building at different source resolutions
fn bench_classifier_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier_preprocessing");

    // Fundus photographs arrive anywhere from camera-native 4K down to
    // already-small clinical exports
    let resolutions = vec![(512, "512x512"), (1024, "1024x1024"), (2048, "2048x2048")];

    for (resolution, name) in resolutions {
        let image = test_image(resolution);
        let mask = test_mask(resolution);

        group.bench_with_input(
            BenchmarkId::new("tensor_pair", name),
            &(image, mask),
            |b, (image, mask)| {
                b.iter(|| {
                    let inputs = preprocess_for_classification(black_box(image), black_box(mask));
                    black_box(inputs);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the visualization builders
fn bench_visualizations(c: &mut Criterion) {
    let mut group = c.benchmark_group("visualizations");

    let image = test_image(1024);
    let mask = test_mask(1024);

    group.bench_function("overlay_1024x1024", |b| {
        b.iter(|| {
            let overlay = render_vessel_overlay(black_box(&image), black_box(&mask))
                .expect("dimensions match");
            black_box(overlay);
        });
    });

    group.bench_function("binary_map_1024x1024", |b| {
        b.iter(|| {
            let map = render_binary_map(black_box(&mask));
            black_box(map);
        });
    });

    group.finish();
}

/// Benchmark PNG re-encoding, the dominant cost of building responses
fn bench_png_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encoding");

    let resolutions = vec![(512, "512x512"), (1024, "1024x1024")];

    for (resolution, name) in resolutions {
        let image = test_image(resolution);

        group.bench_with_input(BenchmarkId::new("encode", name), &image, |b, image| {
            b.iter(|| {
                let mut buffer = Cursor::new(Vec::new());
                black_box(image)
                    .write_to(&mut buffer, image::ImageFormat::Png)
                    .expect("PNG encoding succeeds");
                black_box(buffer.into_inner());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_classifier_preprocessing,
    bench_visualizations,
    bench_png_encoding
);
criterion_main!(benches);
