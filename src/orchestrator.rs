use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::authenticity::score_authenticity;
use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::evidence::{
    AuthenticityVerdict, PixelStatistics, RelevanceVerdict, VerdictSource, VerificationRecord,
    VerificationStatus,
};
use crate::fingerprint::{self, ImageDecoder, NativeDecoder, StatsCache};
use crate::hazard::HazardCategory;
use crate::media::{CandidateId, MediaCandidate, MediaKind, MediaOrigin};
use crate::probe;
use crate::relevance::{detect_categories, match_content, scenario_match};
use crate::remote::{RemoteVerdict, RemoteVerifier};
use crate::store::{Draft, Ticket};

/// 本地降级结论在消息里统一带上这个标记，前端据此提示“可信度降低”
pub const FALLBACK_LABEL: &str = "(offline fallback mode)";

const VIDEO_OCEAN_TERMS: &[&str] = &["water", "ocean", "sea", "wave", "beach", "coast", "marine", "tide"];
const VIDEO_HAZARD_TERMS: &[&str] = &["storm", "flood", "tsunami", "surge", "high", "rough", "danger", "warning"];

/// 核验编排器。
///
/// 对每个候选：先过准入规则；再试远端；远端失败就跑本地两个评分器，两个都过才算 verified。
/// 自身不持有任何候选状态，状态都在调用方传进来的 `Draft` 里。
pub struct Orchestrator {
    config: VerifierConfig,
    decoder: Arc<dyn ImageDecoder>,
    remote: Option<Arc<dyn RemoteVerifier>>,
    cache: Arc<StatsCache>,
}

impl Orchestrator {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            decoder: Arc::new(NativeDecoder),
            remote: None,
            cache: Arc::new(StatsCache::default()),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteVerifier>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    // ==========================================
    // 1. 草稿内核验：发凭证 → 核验 → 凭证入库
    // ==========================================

    /// 在草稿里核验一个候选，结果写回它的槽位。
    ///
    /// 锁只在开始和结束时各拿一次，核验过程中不持锁，别的候选可以同时核验。
    /// 候选在核验期间被删掉或被新一轮顶替时返回 `Ok(None)`，结果丢弃。
    /// 这个 future 在入库前被丢弃时，槽位落成 `error`，不会停在 pending。
    pub async fn run(
        &self,
        draft: &Arc<Mutex<Draft>>,
        id: &CandidateId,
        category: HazardCategory,
        description: &str,
    ) -> Result<Option<VerificationRecord>, VerifyError> {
        let (ticket, candidate) = draft.lock().await.begin(id)?;
        let mut guard = AbandonGuard {
            draft: Arc::clone(draft),
            ticket: Some(ticket),
        };

        let record = self.verify(&candidate, category, description).await;

        let accepted = {
            let mut draft = draft.lock().await;
            let ticket = guard.disarm();
            ticket.is_some_and(|t| draft.complete(&t, record.clone()))
        };
        if accepted {
            Ok(Some(record))
        } else {
            debug!(candidate = %id, "结果已过期，丢弃");
            Ok(None)
        }
    }

    // ==========================================
    // 2. 单个候选的核验
    // ==========================================

    /// 核验一个候选，总会得到一条终态记录，不会返回错误。
    pub async fn verify(
        &self,
        candidate: &MediaCandidate,
        category: HazardCategory,
        description: &str,
    ) -> VerificationRecord {
        let start = Instant::now();
        let media_sha256 = fingerprint::sha256_hex(candidate.raw_bytes());

        let record = match self.admission(candidate, category, description, &media_sha256) {
            Some(rejected) => rejected,
            None => match self.verify_remote(candidate, category, description, &media_sha256).await {
                Ok(record) => record,
                Err(err) => {
                    if self.remote.is_some() {
                        warn!(candidate = %candidate.id, error = %err, "远端核验失败，改用本地降级");
                    }
                    self.verify_local(candidate, category, description, media_sha256).await
                }
            },
        };

        info!(
            candidate = %candidate.id,
            name = %candidate.name,
            category = %category,
            status = ?record.status,
            source = ?record.source,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "核验完成"
        );
        record
    }

    /// 准入规则：类型不支持、文件过大、拍摄场景不符，直接判失败，不做任何分析
    fn admission(
        &self,
        candidate: &MediaCandidate,
        category: HazardCategory,
        description: &str,
        media_sha256: &str,
    ) -> Option<VerificationRecord> {
        let reject = |message: String| {
            Some(VerificationRecord::rejected(
                candidate.id.clone(),
                media_sha256.to_string(),
                message,
            ))
        };
        let size = candidate.byte_size();

        match candidate.kind() {
            MediaKind::Other => reject(format!(
                "Unsupported file type \"{}\" - only images and videos can be verified",
                candidate.mime_type
            )),
            MediaKind::Image if size > self.config.max_image_bytes => reject(format!(
                "Image file too large (max {}MB)",
                self.config.max_image_bytes / (1024 * 1024)
            )),
            MediaKind::Video if size > self.config.max_video_bytes => reject(format!(
                "Video file too large (max {}MB)",
                self.config.max_video_bytes / (1024 * 1024)
            )),
            MediaKind::Image
                if candidate.origin == MediaOrigin::Capture
                    && !scenario_match(category, description, &candidate.name) =>
            {
                reject(format!(
                    "Captured photo does not show the \"{category}\" scenario - please take a photo that matches your report"
                ))
                .map(|record| VerificationRecord {
                    scenario_match: Some(false),
                    ..record
                })
            }
            _ => None,
        }
    }

    async fn verify_remote(
        &self,
        candidate: &MediaCandidate,
        category: HazardCategory,
        description: &str,
        media_sha256: &str,
    ) -> Result<VerificationRecord, VerifyError> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| VerifyError::RemoteUnavailable("no remote verifier configured".into()))?;
        let verdict = remote.verify(candidate, category, description).await?;
        Ok(adopt_remote(candidate, category, description, media_sha256.to_string(), verdict))
    }

    // ==========================================
    // 3. 本地降级
    // ==========================================

    async fn verify_local(
        &self,
        candidate: &MediaCandidate,
        category: HazardCategory,
        description: &str,
        media_sha256: String,
    ) -> VerificationRecord {
        match candidate.kind() {
            MediaKind::Video => self.verify_local_video(candidate, media_sha256),
            _ => self.verify_local_image(candidate, category, description, media_sha256).await,
        }
    }

    async fn verify_local_image(
        &self,
        candidate: &MediaCandidate,
        category: HazardCategory,
        description: &str,
        media_sha256: String,
    ) -> VerificationRecord {
        let stats = match self.pixel_statistics(candidate).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(candidate = %candidate.id, error = %e, "像素分析任务异常");
                return VerificationRecord {
                    status: VerificationStatus::Error,
                    source: VerdictSource::LocalFallback,
                    message: format!("Verification error - image analysis did not complete, please try again {FALLBACK_LABEL}"),
                    timestamp: Utc::now(),
                    ..VerificationRecord::pending(candidate.id.clone(), media_sha256)
                };
            }
        };

        let has_metadata = probe::has_embedded_metadata(candidate.raw_bytes());
        let authenticity = score_authenticity(
            stats.as_ref(),
            has_metadata,
            &candidate.name,
            self.config.authenticity_threshold,
        );
        let relevance = match_content(category, description, stats.as_ref(), self.config.relevance_threshold);

        let verified = authenticity.is_likely_real && relevance.matches;
        let message = local_message(category, &authenticity, &relevance);

        VerificationRecord {
            candidate_id: candidate.id.clone(),
            status: if verified {
                VerificationStatus::Verified
            } else {
                VerificationStatus::Failed
            },
            source: VerdictSource::LocalFallback,
            confidence_score: combined_confidence(verified, &authenticity, &relevance),
            message,
            scenario_match: Some(scenario_match(category, description, &candidate.name)),
            detected_categories: detect_categories(&candidate.name, description),
            authenticity: Some(authenticity),
            relevance: Some(relevance),
            remote_detail: None,
            media_sha256,
            timestamp: Utc::now(),
        }
    }

    /// 解码是 CPU 密集操作，挪到 blocking 线程池；同一份字节只算一次
    async fn pixel_statistics(
        &self,
        candidate: &MediaCandidate,
    ) -> Result<Option<PixelStatistics>, tokio::task::JoinError> {
        let bytes = candidate.raw_bytes().clone();
        let decoder = Arc::clone(&self.decoder);
        let cache = Arc::clone(&self.cache);
        let max_side = self.config.max_side;

        tokio::task::spawn_blocking(move || {
            cache.get_or_compute(&bytes, || {
                fingerprint::extract_statistics(decoder.as_ref(), &bytes, max_side)
            })
        })
        .await
    }

    /// 视频不做像素分析，只看文件名里有没有海洋/灾害相关的词
    fn verify_local_video(&self, candidate: &MediaCandidate, media_sha256: String) -> VerificationRecord {
        let name = candidate.name.to_lowercase();
        let relevant = VIDEO_OCEAN_TERMS
            .iter()
            .chain(VIDEO_HAZARD_TERMS)
            .any(|term| name.contains(term));

        let (status, confidence, message) = if relevant {
            (
                VerificationStatus::Verified,
                0.6,
                format!("Video verified (filename analysis) {FALLBACK_LABEL}"),
            )
        } else {
            (
                VerificationStatus::Failed,
                0.2,
                format!("Video verification service unavailable - please try again later {FALLBACK_LABEL}"),
            )
        };

        VerificationRecord {
            status,
            source: VerdictSource::LocalFallback,
            confidence_score: confidence,
            message,
            timestamp: Utc::now(),
            ..VerificationRecord::pending(candidate.id.clone(), media_sha256)
        }
    }
}

/// 入库前被丢弃时把占位记录落成 error
struct AbandonGuard {
    draft: Arc<Mutex<Draft>>,
    ticket: Option<Ticket>,
}

const ABANDONED_MESSAGE: &str = "Verification was interrupted before it finished - please verify again";

impl AbandonGuard {
    fn disarm(&mut self) -> Option<Ticket> {
        self.ticket.take()
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        warn!(candidate = %ticket.candidate_id, "核验在入库前被放弃");
        // 锁空闲就当场落库；被占用时交给运行时补一个任务
        if let Ok(mut draft) = self.draft.try_lock() {
            draft.abandon(&ticket, ABANDONED_MESSAGE);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let draft = Arc::clone(&self.draft);
                handle.spawn(async move {
                    draft.lock().await.abandon(&ticket, ABANDONED_MESSAGE);
                });
            }
            Err(_) => warn!(candidate = %ticket.candidate_id, "没有运行时，占位记录保持 pending"),
        }
    }
}

/// 远端结论原样采纳；图片另外补上本地的场景匹配结果
fn adopt_remote(
    candidate: &MediaCandidate,
    category: HazardCategory,
    description: &str,
    media_sha256: String,
    verdict: RemoteVerdict,
) -> VerificationRecord {
    let scenario = match candidate.kind() {
        MediaKind::Image => Some(scenario_match(category, description, &candidate.name)),
        _ => None,
    };
    VerificationRecord {
        status: verdict.status.into(),
        source: VerdictSource::Remote,
        confidence_score: verdict.confidence,
        message: verdict.message,
        scenario_match: scenario,
        remote_detail: Some(verdict.detail),
        timestamp: Utc::now(),
        ..VerificationRecord::pending(candidate.id.clone(), media_sha256)
    }
}

/// 两个都失败时，消息以真实性为准
fn local_message(
    category: HazardCategory,
    authenticity: &AuthenticityVerdict,
    relevance: &RelevanceVerdict,
) -> String {
    if !authenticity.is_likely_real {
        format!("AI-generated image suspected - only real photos are accepted {FALLBACK_LABEL}")
    } else if !relevance.matches {
        format!(
            "Image content does not match selected hazard type \"{category}\": {} {FALLBACK_LABEL}",
            relevance.reasons.join(". ")
        )
    } else {
        format!("Image verified successfully {FALLBACK_LABEL}")
    }
}

/// 通过时落在 [0.8, 1.0]，不通过时落在 [0.1, 0.4]，区间内按两个评分器的把握度线性插值
pub fn combined_confidence(
    verified: bool,
    authenticity: &AuthenticityVerdict,
    relevance: &RelevanceVerdict,
) -> f64 {
    let q = ((authenticity.confidence + relevance.score.clamp(0.0, 1.0)) / 2.0).clamp(0.0, 1.0);
    if verified {
        0.8 + 0.2 * q
    } else {
        0.1 + 0.3 * q
    }
}
