use anyhow::Context;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::{authenticity, fingerprint, relevance, store};

/// 启发式的标定参数。默认值都是经验值，没有在标注数据集上校准过。
#[derive(Debug, Clone, PartialEq)]
pub struct VerifierConfig {
    /// 像素分析的长边上限
    pub max_side: u32,
    pub authenticity_threshold: f64,
    pub relevance_threshold: f64,
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
    /// 每份草稿最多几个媒体
    pub max_candidates: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_side: fingerprint::DEFAULT_MAX_SIDE,
            authenticity_threshold: authenticity::DEFAULT_THRESHOLD,
            relevance_threshold: relevance::DEFAULT_THRESHOLD,
            max_image_bytes: 10 * 1024 * 1024,
            max_video_bytes: 50 * 1024 * 1024,
            max_candidates: store::DEFAULT_MAX_CANDIDATES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// 远端图片核验地址；不配就只跑本地启发式
    pub verify_image_url: Option<String>,
    pub verify_video_url: Option<String>,
    pub remote_timeout: Duration,
    pub verifier: VerifierConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // .env 不存在不算错
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置，测试里用闭包喂假环境
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = VerifierConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000u16)?,
            verify_image_url: non_empty("VERIFY_IMAGE_URL"),
            verify_video_url: non_empty("VERIFY_VIDEO_URL"),
            remote_timeout: Duration::from_secs(parse_or(&lookup, "REMOTE_TIMEOUT_SECS", 15u64)?),
            verifier: VerifierConfig {
                max_side: parse_or(&lookup, "MAX_ANALYSIS_SIDE", defaults.max_side)?,
                authenticity_threshold: parse_or(
                    &lookup,
                    "AUTHENTICITY_THRESHOLD",
                    defaults.authenticity_threshold,
                )?,
                relevance_threshold: parse_or(&lookup, "RELEVANCE_THRESHOLD", defaults.relevance_threshold)?,
                max_image_bytes: parse_or(&lookup, "MAX_IMAGE_BYTES", defaults.max_image_bytes)?,
                max_video_bytes: parse_or(&lookup, "MAX_VIDEO_BYTES", defaults.max_video_bytes)?,
                max_candidates: parse_or(&lookup, "MAX_MEDIA_PER_DRAFT", defaults.max_candidates)?,
            },
        };

        anyhow::ensure!(config.verifier.max_side > 0, "MAX_ANALYSIS_SIDE must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&config.verifier.relevance_threshold),
            "RELEVANCE_THRESHOLD must be within [0, 1]"
        );
        anyhow::ensure!(
            config.verifier.authenticity_threshold.is_finite(),
            "AUTHENTICITY_THRESHOLD must be a finite number"
        );
        anyhow::ensure!(config.verifier.max_candidates > 0, "MAX_MEDIA_PER_DRAFT must be positive");
        anyhow::ensure!(!config.remote_timeout.is_zero(), "REMOTE_TIMEOUT_SECS must be positive");

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_the_calibrated_values() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.remote_timeout, Duration::from_secs(15));
        assert!(config.verify_image_url.is_none());
        assert_eq!(config.verifier, VerifierConfig::default());
        assert_eq!(config.verifier.max_side, 512);
        assert_eq!(config.verifier.authenticity_threshold, 0.25);
        assert_eq!(config.verifier.relevance_threshold, 0.9);
        assert_eq!(config.verifier.max_candidates, 5);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("VERIFY_IMAGE_URL", "http://localhost:8000/api/verify-image/"),
            ("VERIFY_VIDEO_URL", "  "),
            ("AUTHENTICITY_THRESHOLD", "0.3"),
            ("REMOTE_TIMEOUT_SECS", "5"),
            ("MAX_MEDIA_PER_DRAFT", "3"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(
            config.verify_image_url.as_deref(),
            Some("http://localhost:8000/api/verify-image/")
        );
        assert!(config.verify_video_url.is_none());
        assert_eq!(config.verifier.authenticity_threshold, 0.3);
        assert_eq!(config.remote_timeout, Duration::from_secs(5));
        assert_eq!(config.verifier.max_candidates, 3);
    }

    #[test]
    fn bad_numbers_are_errors_not_panics() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        assert!(Config::from_lookup(lookup(&[("RELEVANCE_THRESHOLD", "1.5")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MAX_ANALYSIS_SIDE", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("REMOTE_TIMEOUT_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MAX_MEDIA_PER_DRAFT", "0")])).is_err());
    }
}
