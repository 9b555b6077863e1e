use criterion::{criterion_group, criterion_main, Criterion};
use image::{ImageBuffer, Rgba};
use std::path::PathBuf;

use web_vision::inspect::diff::compare_images;

fn write_image(dir: &std::path::Path, name: &str, seed: u8) -> PathBuf {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(1280, 720, |x, y| {
        let v = ((x ^ y) as u8).wrapping_add(seed);
        Rgba([v, v.wrapping_mul(3), v.wrapping_mul(7), 255])
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

fn bench_pixel_diff(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let identical_a = write_image(dir.path(), "a.png", 0);
    let identical_b = write_image(dir.path(), "b.png", 0);
    let drifted = write_image(dir.path(), "c.png", 64);

    c.bench_function("diff_identical_1280x720", |b| {
        b.iter(|| compare_images(&identical_a, &identical_b).unwrap())
    });

    c.bench_function("diff_divergent_1280x720", |b| {
        b.iter(|| compare_images(&identical_a, &drifted).unwrap())
    });
}

criterion_group!(benches, bench_pixel_diff);
criterion_main!(benches);
