use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use image::RgbImage;
use imscan::{MatchMode, ScanConfig, scan};
use tempfile::TempDir;

/// 生成一批尺寸各异的测试图片
fn dataset(count: u32) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..count {
        let (width, height) = (100 + i * 7 % 500, 100 + i * 13 % 500);
        let sub = dir.path().join(format!("part{}", i % 4));
        std::fs::create_dir_all(&sub).unwrap();
        RgbImage::new(width, height).save(sub.join(format!("{i}.png"))).unwrap();
    }
    dir
}

fn benchmark_scan(c: &mut Criterion) {
    let dir = dataset(200);

    let mut group = c.benchmark_group("扫描");
    for workers in [1, 4, 8] {
        let config = ScanConfig { workers, mode: MatchMode::Lte, ..Default::default() };
        group.bench_with_input(BenchmarkId::new("workers", workers), &config, |b, config| {
            b.iter(|| scan(black_box(dir.path()), config, &()).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_scan);
criterion_main!(benches);
