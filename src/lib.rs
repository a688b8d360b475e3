//! 海洋灾害上报的媒体核验核心。
//!
//! 流水线单向流动：原始字节 → 元数据探针 / 像素统计 → 真实性评分、内容相关性匹配（互相独立）
//! → 单个候选的核验记录 → 表单级放行闸门。

pub mod api;
pub mod authenticity;
pub mod config;
pub mod error;
pub mod evidence;
pub mod fingerprint;
pub mod hazard;
pub mod media;
pub mod orchestrator;
pub mod probe;
pub mod relevance;
pub mod remote;
pub mod store;

pub use error::VerifyError;
pub use evidence::{
    AuthenticityVerdict, PixelStatistics, RelevanceVerdict, VerdictSource, VerificationRecord,
    VerificationStatus,
};
pub use hazard::HazardCategory;
pub use media::{CandidateId, MediaCandidate, MediaOrigin};
pub use orchestrator::Orchestrator;
pub use store::{Draft, FormVerificationGate};
