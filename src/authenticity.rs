use regex::Regex;
use std::sync::LazyLock;

use crate::evidence::{AuthenticityVerdict, PixelStatistics};

/// 判定阈值：分数 ≤ 0.25 视为真实照片
pub const DEFAULT_THRESHOLD: f64 = 0.25;

pub const DETECTION_METHOD: &str = "Enhanced Content Analysis";

// 相机/手机默认命名：IMG_1234、DSC_0001、PHOTO_x、P1234_、20240101_123456
static CAMERA_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(img_|dsc_|photo_|p\d+_|\d{8}_\d{6})").ok());

/// 一条规则的贡献：分数增量 + 可选的理由
type Contribution = (f64, Option<&'static str>);

/// 边缘方差的贡献。三段：过平滑罚分、正常区间奖励、过锐化罚分，中间地带不加不减。
pub fn edge_variance_contribution(edge_variance: f64) -> Contribution {
    if edge_variance < 5.0 {
        (0.15, Some("Very low edge variance (over-smooth)"))
    } else if edge_variance > 1200.0 {
        (0.08, Some("Very high edge variance (over-sharpened)"))
    } else if edge_variance > 50.0 && edge_variance < 500.0 {
        (-0.10, None)
    } else {
        (0.0, None)
    }
}

fn saturation_contribution(std_dev: f64) -> Contribution {
    if std_dev < 0.03 {
        (0.08, Some("Low saturation diversity"))
    } else if std_dev > 0.15 {
        (-0.05, None)
    } else {
        (0.0, None)
    }
}

fn is_camera_aspect(width: u32, height: u32) -> bool {
    if height == 0 {
        return false;
    }
    let ratio = width as f64 / height as f64;
    (ratio > 1.2 && ratio < 1.8) || (ratio > 0.55 && ratio < 0.85)
}

/// 像素统计相关的所有规则
fn statistics_contributions(stats: &PixelStatistics) -> Vec<Contribution> {
    let mut out = vec![
        edge_variance_contribution(stats.edge_variance),
        saturation_contribution(stats.saturation_std_dev),
    ];
    if stats.width.min(stats.height) < 256 {
        out.push((0.05, Some("Very small dimensions")));
    }
    if stats.width == stats.height && stats.width % 64 == 0 {
        out.push((0.03, Some("Perfect square with power-of-64 dimensions")));
    }
    if is_camera_aspect(stats.width, stats.height) {
        out.push((-0.05, None));
    }
    out
}

fn filename_contributions(filename: &str) -> Vec<Contribution> {
    let name = filename.trim().to_lowercase();
    let mut out = Vec::new();
    if CAMERA_NAME.as_ref().is_some_and(|re| re.is_match(&name)) {
        out.push((-0.15, None));
    }
    if name.ends_with(".jpg") || name.ends_with(".jpeg") {
        out.push((-0.05, None));
    }
    out
}

/// 真实性打分。
///
/// 从 0 开始累加；正数是“像生成图”的证据，负数是“像相机原图”的奖励。
/// 拿不到像素统计时只记一个很小的罚分，不当作硬失败。
pub fn score_authenticity(
    stats: Option<&PixelStatistics>,
    has_embedded_metadata: bool,
    filename: &str,
    threshold: f64,
) -> AuthenticityVerdict {
    let mut contributions: Vec<Contribution> = Vec::new();

    contributions.push(if has_embedded_metadata {
        (-0.20, None)
    } else {
        (0.15, Some("Missing EXIF metadata"))
    });

    match stats {
        Some(stats) => contributions.extend(statistics_contributions(stats)),
        None => contributions.push((0.02, Some("Content metrics unavailable"))),
    }

    contributions.extend(filename_contributions(filename));

    let score: f64 = contributions.iter().map(|(delta, _)| delta).sum();
    let indicators = contributions
        .iter()
        .filter_map(|(_, reason)| reason.map(str::to_string))
        .collect();

    verdict_from_score(score, indicators, threshold)
}

/// 分数 → 判定。阈值是闭区间：恰好等于阈值仍算真实。
pub fn verdict_from_score(score: f64, indicators: Vec<String>, threshold: f64) -> AuthenticityVerdict {
    AuthenticityVerdict {
        is_likely_real: score <= threshold,
        confidence: (0.6 + score.abs()).clamp(0.3, 0.9),
        score,
        ai_score: score.max(0.0),
        indicators,
        detection_method: DETECTION_METHOD.to_string(),
    }
}
