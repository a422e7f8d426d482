//! Criterion benchmarks for LZ4 frame encoding.
//!
//! Measures the cost of compressing typical damage rectangles: a cursor-sized
//! update, a window-sized update and a full 1080p frame.
//!
//! Run with:
//! ```bash
//! cargo bench --package xwebview-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use xwebview_core::FrameEncoder;

/// Builds a 32-bit pixel buffer with desktop-like structure (flat areas with
/// some gradients) so compression ratios are realistic.
fn desktop_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let band = (y / 32) as u8;
            let shade = if x % 200 < 150 { 0xEE } else { (x % 256) as u8 };
            buf.extend_from_slice(&[shade, band.wrapping_mul(17), 0x30, 0]);
        }
    }
    buf
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("lz4_frame_encode");
    let encoder = FrameEncoder::new();

    for (label, w, h) in [("cursor_32x32", 32, 32), ("window_800x600", 800, 600), ("full_1920x1080", 1920, 1080)] {
        let pixels = desktop_pixels(w, h);
        group.throughput(Throughput::Bytes(pixels.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", label), &pixels, |b, px| {
            b.iter(|| encoder.encode(black_box(px)))
        });
    }

    group.finish();
}

fn bench_compress_bound(c: &mut Criterion) {
    let encoder = FrameEncoder::new();
    c.bench_function("lz4_compress_bound_1080p", |b| {
        b.iter(|| encoder.compress_bound(black_box(1920 * 1080 * 4)))
    });
}

criterion_group!(benches, bench_encode, bench_compress_bound);
criterion_main!(benches);
