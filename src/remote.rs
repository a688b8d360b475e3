use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::VerifyError;
use crate::evidence::{RemoteDetail, VerificationStatus};
use crate::hazard::HazardCategory;
use crate::media::{MediaCandidate, MediaKind};

/// 远端核验服务给出的结论。只要求 `status`、`message`、`confidence` 三个字段。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVerdict {
    pub status: RemoteStatus,
    pub message: String,
    pub confidence: f64,
    #[serde(flatten)]
    pub detail: RemoteDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Verified,
    Failed,
}

impl From<RemoteStatus> for VerificationStatus {
    fn from(s: RemoteStatus) -> Self {
        match s {
            RemoteStatus::Verified => VerificationStatus::Verified,
            RemoteStatus::Failed => VerificationStatus::Failed,
        }
    }
}

/// 解析图片接口的响应体，结论字段直接在顶层
pub fn parse_verdict(body: Value) -> Result<RemoteVerdict, VerifyError> {
    let mut verdict: RemoteVerdict =
        serde_json::from_value(body).map_err(|e| VerifyError::MalformedResponse(e.to_string()))?;
    if !verdict.confidence.is_finite() {
        return Err(VerifyError::MalformedResponse("confidence is not a number".into()));
    }
    verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
    Ok(verdict)
}

/// 视频接口把结论包在 `{"success": .., "result": {..}}` 里
pub fn parse_video_verdict(body: Value) -> Result<RemoteVerdict, VerifyError> {
    match body {
        Value::Object(mut map) => match map.remove("result") {
            Some(result @ Value::Object(_)) => parse_verdict(result),
            _ => Err(VerifyError::MalformedResponse("video response has no `result` object".into())),
        },
        _ => Err(VerifyError::MalformedResponse("video response is not an object".into())),
    }
}

/// 远端核验能力。失败（网络、非 2xx、超时、响应不合法）统一以 `Err` 返回，由编排器决定降级。
#[async_trait]
pub trait RemoteVerifier: Send + Sync {
    async fn verify(
        &self,
        candidate: &MediaCandidate,
        category: HazardCategory,
        description: &str,
    ) -> Result<RemoteVerdict, VerifyError>;
}

/// 基于 HTTP multipart 的远端核验客户端
pub struct HttpRemoteVerifier {
    client: reqwest::Client,
    image_url: Option<String>,
    video_url: Option<String>,
}

impl HttpRemoteVerifier {
    /// `timeout` 是整次请求的硬上限，过了就当失败，不自动重试
    pub fn new(
        image_url: Option<String>,
        video_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| VerifyError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            image_url,
            video_url,
        })
    }

    /// 两个地址都没配时返回 None，编排器就只跑本地
    pub fn from_urls(
        image_url: Option<String>,
        video_url: Option<String>,
        timeout: Duration,
    ) -> Result<Option<Self>, VerifyError> {
        if image_url.is_none() && video_url.is_none() {
            return Ok(None);
        }
        Self::new(image_url, video_url, timeout).map(Some)
    }
}

#[async_trait]
impl RemoteVerifier for HttpRemoteVerifier {
    async fn verify(
        &self,
        candidate: &MediaCandidate,
        category: HazardCategory,
        description: &str,
    ) -> Result<RemoteVerdict, VerifyError> {
        let (field, url) = match candidate.kind() {
            MediaKind::Image => ("image", self.image_url.as_deref()),
            MediaKind::Video => ("video", self.video_url.as_deref()),
            MediaKind::Other => return Err(VerifyError::UnsupportedMedia(candidate.mime_type.clone())),
        };
        let url = url.ok_or_else(|| {
            VerifyError::RemoteUnavailable(format!("no {field} verification endpoint configured"))
        })?;

        let part = Part::bytes(candidate.raw_bytes().to_vec())
            .file_name(candidate.name.clone())
            .mime_str(&candidate.mime_type)?;
        let form = Form::new()
            .part(field, part)
            .text("hazard_type", category.as_str())
            .text("description", description.to_string());

        let body: Value = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match candidate.kind() {
            MediaKind::Video => parse_video_verdict(body),
            _ => parse_verdict(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_response() {
        let v = parse_verdict(json!({
            "status": "verified",
            "message": "Image verified",
            "confidence": 0.93
        }))
        .unwrap();
        assert_eq!(v.status, RemoteStatus::Verified);
        assert_eq!(v.message, "Image verified");
        assert!(v.detail.checks.is_none());
    }

    #[test]
    fn keeps_optional_sections() {
        let v = parse_verdict(json!({
            "status": "failed",
            "message": "AI-generated image detected",
            "confidence": 0.2,
            "checks": {"isRealImage": false},
            "aiDetection": {"aiScore": 0.7},
            "hazardMatching": {"matchesSelectedType": true},
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(v.status, RemoteStatus::Failed);
        assert_eq!(v.detail.checks, Some(json!({"isRealImage": false})));
        assert_eq!(v.detail.ai_detection, Some(json!({"aiScore": 0.7})));
        assert!(v.detail.hazard_matching.is_some());
    }

    #[test]
    fn unwraps_video_result_envelope() {
        let v = parse_video_verdict(json!({
            "success": true,
            "result": {"status": "verified", "message": "ok", "confidence": 0.8}
        }))
        .unwrap();
        assert_eq!(v.status, RemoteStatus::Verified);

        let err = parse_video_verdict(json!({"status": "verified", "message": "ok", "confidence": 0.8}))
            .unwrap_err();
        assert!(matches!(err, VerifyError::MalformedResponse(_)));
    }

    #[test]
    fn image_responses_are_not_unwrapped() {
        let enveloped = json!({
            "success": true,
            "result": {"status": "verified", "message": "ok", "confidence": 0.8}
        });
        let err = parse_verdict(enveloped).unwrap_err();
        assert!(matches!(err, VerifyError::MalformedResponse(_)));
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        for body in [
            json!({"message": "no status", "confidence": 1.0}),
            json!({"status": "maybe", "message": "x", "confidence": 0.5}),
            json!({"status": "verified", "confidence": 0.5}),
            json!("just a string"),
        ] {
            let err = parse_verdict(body).unwrap_err();
            assert!(matches!(err, VerifyError::MalformedResponse(_)));
        }
    }

    #[test]
    fn confidence_is_clamped() {
        let v = parse_verdict(json!({"status": "verified", "message": "x", "confidence": 7.0})).unwrap();
        assert_eq!(v.confidence, 1.0);
    }

    #[test]
    fn no_urls_means_no_client() {
        let client = HttpRemoteVerifier::from_urls(None, None, Duration::from_secs(15)).unwrap();
        assert!(client.is_none());
    }
}
