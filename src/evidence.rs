use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hazard::HazardCategory;
use crate::media::CandidateId;

// ==========================================
// 第一层：像素特征
// ==========================================

/// 从缩放后的像素网格上算出来的统计量。同一份字节永远得到同一组数。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelStatistics {
    /// 拉普拉斯响应的总体方差，衡量高频细节（0 = 完全平滑）
    pub edge_variance: f64,
    /// HSV 饱和度均值，[0,1]
    pub mean_saturation: f64,
    pub saturation_std_dev: f64,
    /// 缩放后的尺寸，每边不超过分析上限
    pub width: u32,
    pub height: u32,
}

// ==========================================
// 第二层：两个独立的判定
// ==========================================

/// 真实性判定：相机原图 vs 生成图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticityVerdict {
    pub is_likely_real: bool,
    pub confidence: f64,
    /// 带符号的累计分数，越高越像生成图；判定用的就是它
    pub score: f64,
    /// 展示用分数，负值截到 0
    pub ai_score: f64,
    /// 按出现顺序排列的可读理由
    pub indicators: Vec<String>,
    pub detection_method: String,
}

/// 内容相关性判定：图像特征 + 描述 是否符合所选灾害类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevanceVerdict {
    pub matches: bool,
    /// 累计得分（0.0 ~ 1.0）
    pub score: f64,
    pub reasons: Vec<String>,
}

// ==========================================
// 第三层：核验记录
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
    Error,
}

impl VerificationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationStatus::Pending)
    }
}

/// 这条结论是谁给的
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerdictSource {
    /// 远端服务（权威）
    Remote,
    /// 远端不可用，本地启发式降级
    LocalFallback,
    /// 准入规则直接拒绝（类型不支持、文件过大、拍摄场景不符等），没跑分析
    Policy,
    /// 还在跑
    InFlight,
    /// 核验中途被放弃（请求被丢弃），没有结论
    Interrupted,
}

/// 远端响应里我们不解析、原样透传给前端的部分
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_detection: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazard_matching: Option<serde_json::Value>,
}

/// 每个候选一条。创建时是 pending，之后只会转一次到终态；重新核验会整条替换。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub candidate_id: CandidateId,
    pub status: VerificationStatus,
    pub source: VerdictSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticity: Option<AuthenticityVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<RelevanceVerdict>,
    pub confidence_score: f64,
    pub message: String,
    /// 拍摄来源的场景校验结果；视频和远端结论里没有
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_match: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_categories: Vec<HazardCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_detail: Option<RemoteDetail>,
    /// 原始字节的 SHA-256，供审计对账
    pub media_sha256: String,
    pub timestamp: DateTime<Utc>,
}

impl VerificationRecord {
    /// 核验开始时放进槽位的占位记录
    pub fn pending(candidate_id: CandidateId, media_sha256: String) -> Self {
        Self {
            candidate_id,
            status: VerificationStatus::Pending,
            source: VerdictSource::InFlight,
            authenticity: None,
            relevance: None,
            confidence_score: 0.0,
            message: "Verification in progress".to_string(),
            scenario_match: None,
            detected_categories: Vec::new(),
            remote_detail: None,
            media_sha256,
            timestamp: Utc::now(),
        }
    }

    /// 准入规则直接拒绝，不做任何分析
    pub fn rejected(candidate_id: CandidateId, media_sha256: String, message: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Failed,
            source: VerdictSource::Policy,
            message: message.into(),
            ..Self::pending(candidate_id, media_sha256)
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_in_camel_case() {
        let record = VerificationRecord::rejected(
            CandidateId::from("abc".to_string()),
            "00".repeat(32),
            "Unsupported file type",
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["candidateId"], "abc");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["source"], "policy");
        assert_eq!(json["confidenceScore"], 0.0);
        assert!(json.get("authenticity").is_none());
        assert!(json.get("detectedCategories").is_none());
        // ISO-8601
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!VerificationStatus::Pending.is_terminal());
        assert!(VerificationStatus::Verified.is_terminal());
        assert!(VerificationStatus::Failed.is_terminal());
        assert!(VerificationStatus::Error.is_terminal());
    }
}
