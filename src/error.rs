use thiserror::Error;

/// 核验流水线里所有可能出现的错误。
///
/// 注意：单次核验永远不会把这些错误抛给前端，最终都会落成一条终态的
/// `VerificationRecord`。这里的错误只会在查找候选、读取配置时真正向外冒泡。
#[derive(Debug, Error)]
pub enum VerifyError {
    /// 图片解码失败（字节损坏、格式不支持）
    #[error("pixel extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),
    /// 网络层错误（连接被拒、DNS 等）
    #[error("remote verification unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("remote verification returned HTTP {0}")]
    RemoteStatus(u16),
    #[error("remote verification timed out")]
    RemoteTimeout,
    /// 远端 2xx 但响应体不是我们认识的结构
    #[error("malformed remote response: {0}")]
    MalformedResponse(String),
    #[error("candidate not found: {0}")]
    CandidateNotFound(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("draft already holds the maximum of {0} media items")]
    DraftFull(usize),
}

impl VerifyError {
    /// 是否属于“远端不可用”一类，决定要不要走本地降级
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            VerifyError::RemoteUnavailable(_)
                | VerifyError::RemoteStatus(_)
                | VerifyError::RemoteTimeout
                | VerifyError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for VerifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VerifyError::RemoteTimeout
        } else if err.is_decode() {
            VerifyError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            VerifyError::RemoteStatus(status.as_u16())
        } else {
            VerifyError::RemoteUnavailable(err.to_string())
        }
    }
}

impl From<image::ImageError> for VerifyError {
    fn from(err: image::ImageError) -> Self {
        VerifyError::ExtractionFailed(err.to_string())
    }
}
