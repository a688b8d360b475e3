use criterion::{criterion_group, criterion_main, Criterion};
use image::{ImageFormat, Rgb, RgbImage};
use oceanwatch_core::{
    config::VerifierConfig,
    fingerprint::{self, NativeDecoder},
    HazardCategory, MediaCandidate, Orchestrator,
};
use std::io::Cursor;

// 合成一张带噪声的海景图，省得依赖磁盘上的样本文件
fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x2545_F491;
    let img = RgbImage::from_fn(width, height, |_, y| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let n = (state % 13) as i32 - 6;
        let base: [i32; 3] = if y < height / 2 { [150, 180, 200] } else { [40, 120, 170] };
        Rgb(base.map(|c| (c + n) as u8))
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

fn bench_statistics(c: &mut Criterion) {
    let small = sample_png(512, 384);
    let large = sample_png(2048, 1536);

    c.bench_function("statistics_512", |b| {
        b.iter(|| fingerprint::extract_statistics(&NativeDecoder, &small, 512).unwrap())
    });

    // 大图的成本主要在解码和缩放
    c.bench_function("statistics_2048_downscaled", |b| {
        b.iter(|| fingerprint::extract_statistics(&NativeDecoder, &large, 512).unwrap())
    });
}

fn bench_local_verify(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let orchestrator = Orchestrator::new(VerifierConfig::default());
    let candidate = MediaCandidate::new("IMG_0001.png", "image/png", sample_png(512, 384));

    // 第一次之后走统计缓存，测的是评分 + 组装记录的开销
    c.bench_function("local_verify_cached", |b| {
        b.to_async(&runtime).iter(|| {
            orchestrator.verify(&candidate, HazardCategory::Tsunami, "tsunami reached the harbour")
        })
    });

    c.bench_function("sha256_512_png", |b| {
        b.iter(|| fingerprint::sha256_hex(candidate.raw_bytes()))
    });
}

criterion_group!(benches, bench_statistics, bench_local_verify);
criterion_main!(benches);
