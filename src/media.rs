use bytes::Bytes;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 候选媒体的身份令牌。
///
/// 不用文件名做键：两张同名照片（比如相机都叫 `IMG_0001.JPG`）会互相覆盖。
/// 这里用 16 字节随机数的 hex 编码，核验开始时抓住它，结果回来时再按它对号入座。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn generate() -> Self {
        let mut raw = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut raw);
        Self(hex::encode(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CandidateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 由 MIME 类型粗分的媒体种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }
}

/// 媒体来源：相册上传 or 应用内拍摄。拍摄的照片多一道场景校验。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaOrigin {
    #[default]
    Upload,
    Capture,
}

impl MediaOrigin {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "capture" | "camera" | "captured" => MediaOrigin::Capture,
            _ => MediaOrigin::Upload,
        }
    }
}

/// 一个待核验的媒体文件。创建后不可变。
///
/// `raw_bytes` 用 `Bytes`，clone 只是引用计数 +1，方便把候选交给后台任务而不拷贝整张图。
#[derive(Debug, Clone)]
pub struct MediaCandidate {
    pub id: CandidateId,
    /// 原始文件名，只作为启发式信号，不当真
    pub name: String,
    pub mime_type: String,
    pub origin: MediaOrigin,
    raw_bytes: Bytes,
}

impl MediaCandidate {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        raw_bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: CandidateId::generate(),
            name: name.into(),
            mime_type: mime_type.into(),
            origin: MediaOrigin::Upload,
            raw_bytes: raw_bytes.into(),
        }
    }

    pub fn with_origin(mut self, origin: MediaOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn byte_size(&self) -> u64 {
        self.raw_bytes.len() as u64
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw_bytes
    }
}
