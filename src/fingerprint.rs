use image::{imageops::FilterType, RgbImage};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::VerifyError;
use crate::evidence::PixelStatistics;

/// 默认分析分辨率上限：长边不超过 512 像素
pub const DEFAULT_MAX_SIDE: u32 = 512;

// ==========================================
// 1. 解码能力
// ==========================================

/// 把字节解成有界分辨率的 RGB 像素网格。
///
/// 浏览器端用 canvas，服务端/CLI 用原生图像库；流水线剩下的部分只认 `RgbImage`，
/// 不关心它是怎么来的。
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], max_side: u32) -> Result<RgbImage, VerifyError>;
}

/// 基于 `image` crate 的解码器
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDecoder;

impl ImageDecoder for NativeDecoder {
    fn decode(&self, bytes: &[u8], max_side: u32) -> Result<RgbImage, VerifyError> {
        // 格式由魔数猜，不信任上传方声明的 MIME
        let img = image::load_from_memory(bytes)?;
        Ok(downscale(img.to_rgb8(), max_side))
    }
}

/// 等比缩放到长边 ≤ `max_side`。已经够小就原样返回，不放大。
///
/// 用 Triangle 滤波：确定性的，同一输入永远同一输出。具体核函数不影响正确性。
pub fn downscale(img: RgbImage, max_side: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if max_side == 0 || longest <= max_side {
        return img;
    }
    let scale = max_side as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).clamp(1, max_side);
    let nh = ((h as f64 * scale).round() as u32).clamp(1, max_side);
    image::imageops::resize(&img, nw, nh, FilterType::Triangle)
}

// ==========================================
// 2. 像素统计
// ==========================================

/// 解码 + 统计，一步到位
pub fn extract_statistics(
    decoder: &dyn ImageDecoder,
    bytes: &[u8],
    max_side: u32,
) -> Result<PixelStatistics, VerifyError> {
    let grid = decoder.decode(bytes, max_side)?;
    if grid.width() == 0 || grid.height() == 0 {
        return Err(VerifyError::ExtractionFailed("image has no pixels".into()));
    }
    Ok(compute_statistics(&grid))
}

/// 在像素网格上计算边缘方差和饱和度分布。
///
/// - 亮度：`Y = 0.299R + 0.587G + 0.114B`
/// - 拉普拉斯：四邻域核（中心 -4，上下左右 +1），只在内部像素上取值，边框不参与
/// - 饱和度：HSV 的 S = (max - min) / max，全部像素（含边框）参与
pub fn compute_statistics(grid: &RgbImage) -> PixelStatistics {
    let (width, height) = grid.dimensions();
    let w = width as usize;
    let h = height as usize;

    let luma: Vec<f64> = grid
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .collect();

    let mut response = Vec::with_capacity(w.saturating_sub(2) * h.saturating_sub(2));
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let idx = y * w + x;
            let v = luma[idx - w] + luma[idx + w] + luma[idx - 1] + luma[idx + 1] - 4.0 * luma[idx];
            response.push(v);
        }
    }
    let (_, edge_variance) = mean_and_variance(&response);

    let saturation: Vec<f64> = grid
        .pixels()
        .map(|p| {
            let max = p[0].max(p[1]).max(p[2]) as f64;
            let min = p[0].min(p[1]).min(p[2]) as f64;
            if max == 0.0 {
                0.0
            } else {
                (max - min) / max
            }
        })
        .collect();
    let (mean_saturation, sat_variance) = mean_and_variance(&saturation);

    PixelStatistics {
        edge_variance,
        mean_saturation,
        saturation_std_dev: sat_variance.sqrt(),
        width,
        height,
    }
}

/// 总体均值和方差（两遍扫描，数值上比 E[x²]-E[x]² 稳）。空输入返回 (0, 0)。
fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.max(0.0))
}

// ==========================================
// 3. 内容摘要 & 统计缓存
// ==========================================

/// 原始字节的 SHA-256（小写 hex），写进核验记录
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// 缓存键：BLAKE3 比 SHA-256 快得多，每次核验都要算一遍
pub fn content_key(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

/// 按内容缓存的像素统计。解码失败也缓存（`None`），省得反复解一张坏图。
///
/// 容量到顶就整表清空。重新核验的典型场景是同一张图连续点几次，不需要 LRU。
pub struct StatsCache {
    entries: Mutex<HashMap<[u8; 32], Option<PixelStatistics>>>,
    capacity: usize,
}

impl StatsCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_compute<F>(&self, bytes: &[u8], compute: F) -> Option<PixelStatistics>
    where
        F: FnOnce() -> Result<PixelStatistics, VerifyError>,
    {
        let key = content_key(bytes);
        if let Some(hit) = self.lock().get(&key) {
            return *hit;
        }

        // 计算不持锁：同一张图并发算两次没关系，结果一样
        let computed = match compute() {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::debug!(error = %e, "像素统计不可用");
                None
            }
        };

        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.clear();
        }
        entries.insert(key, computed);
        computed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<[u8; 32], Option<PixelStatistics>>> {
        // 缓存内容不会因为别的线程 panic 而变坏，直接拿回来继续用
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StatsCache {
    fn default() -> Self {
        Self::new(256)
    }
}
