use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::VerifyError;
use crate::evidence::{VerdictSource, VerificationRecord, VerificationStatus};
use crate::fingerprint;
use crate::media::{CandidateId, MediaCandidate};

/// 一次核验的“取件凭证”。
///
/// 开始核验时发放，结果回来时凭它入库。候选在这期间被删掉、或者被新一轮核验顶替，
/// 凭证就作废，迟到的结果直接丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub candidate_id: CandidateId,
    generation: u64,
}

struct Slot {
    candidate: MediaCandidate,
    media_sha256: String,
    generation: u64,
    record: Option<VerificationRecord>,
}

/// 表单级的放行闸门
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormVerificationGate {
    /// 每个候选都有一条 verified 记录时才为 true；没有候选时为 false
    pub all_verified: bool,
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
    pub failed: usize,
}

/// 表单上除了媒体之外的必填项，由外层表单提供
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFields {
    #[serde(default)]
    pub hazard_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    /// 设备定位拿到的坐标；没有定位时 `location` 必须是手填的 "lat, lng"
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl FormFields {
    fn location_valid(&self) -> bool {
        let located = self.latitude.is_some() && self.longitude.is_some();
        !self.location.trim().is_empty() && (located || self.location.contains(','))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCheck {
    pub ready: bool,
    pub message: String,
}

/// 描述至少要写这么多字
pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// 一份报告最多挂几个媒体
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// 一份报告草稿里的全部媒体和它们的核验记录。
///
/// 唯一的可变状态就在这里：每个候选一个槽位，槽位里最多一条记录。
/// 不同候选之间互不影响，所以并发核验两张图时只需要在开始和结束时各拿一次锁。
pub struct Draft {
    slots: HashMap<CandidateId, Slot>,
    /// 插入顺序，用于展示
    order: Vec<CandidateId>,
    next_generation: u64,
    max_candidates: usize,
}

impl Default for Draft {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_CANDIDATES)
    }
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_candidates: usize) -> Self {
        Self {
            slots: HashMap::new(),
            order: Vec::new(),
            next_generation: 0,
            max_candidates,
        }
    }

    /// 登记一个新候选，返回它的身份令牌。满了就拒收。
    pub fn add(&mut self, candidate: MediaCandidate) -> Result<CandidateId, VerifyError> {
        if self.slots.len() >= self.max_candidates {
            return Err(VerifyError::DraftFull(self.max_candidates));
        }
        let id = candidate.id.clone();
        let media_sha256 = fingerprint::sha256_hex(candidate.raw_bytes());
        self.order.push(id.clone());
        self.slots.insert(
            id.clone(),
            Slot {
                candidate,
                media_sha256,
                generation: 0,
                record: None,
            },
        );
        Ok(id)
    }

    /// 移除候选。正在跑的核验结果回来后会被丢弃。
    pub fn remove(&mut self, id: &CandidateId) -> Option<MediaCandidate> {
        self.order.retain(|x| x != id);
        self.slots.remove(id).map(|slot| slot.candidate)
    }

    pub fn candidate(&self, id: &CandidateId) -> Option<&MediaCandidate> {
        self.slots.get(id).map(|s| &s.candidate)
    }

    pub fn record(&self, id: &CandidateId) -> Option<&VerificationRecord> {
        self.slots.get(id).and_then(|s| s.record.as_ref())
    }

    /// 按插入顺序列出所有记录（还没开始核验的候选不在其中）
    pub fn records(&self) -> Vec<&VerificationRecord> {
        self.order
            .iter()
            .filter_map(|id| self.record(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 开始一轮核验：放入 pending 占位记录，发放新凭证，旧凭证随之作废。
    pub fn begin(&mut self, id: &CandidateId) -> Result<(Ticket, MediaCandidate), VerifyError> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| VerifyError::CandidateNotFound(id.to_string()))?;
        slot.generation = generation;
        slot.record = Some(VerificationRecord::pending(id.clone(), slot.media_sha256.clone()));
        Ok((
            Ticket {
                candidate_id: id.clone(),
                generation,
            },
            slot.candidate.clone(),
        ))
    }

    /// 凭证入库。返回 false 表示结果已经过期（候选已删或被更新的核验顶替），记录被丢弃。
    pub fn complete(&mut self, ticket: &Ticket, record: VerificationRecord) -> bool {
        match self.slots.get_mut(&ticket.candidate_id) {
            Some(slot) if slot.generation == ticket.generation && record.status.is_terminal() => {
                slot.record = Some(record);
                true
            }
            _ => false,
        }
    }

    /// 核验没跑完就被放弃（调用方的 future 被丢弃）：占位记录落成 error。
    ///
    /// 只动还是 pending 且凭证仍然有效的槽位，已经入库的结果不受影响。
    pub fn abandon(&mut self, ticket: &Ticket, message: impl Into<String>) -> bool {
        let Some(slot) = self.slots.get_mut(&ticket.candidate_id) else {
            return false;
        };
        let pending = slot
            .record
            .as_ref()
            .is_some_and(|r| r.status == VerificationStatus::Pending);
        if slot.generation != ticket.generation || !pending {
            return false;
        }
        slot.record = Some(VerificationRecord {
            status: VerificationStatus::Error,
            source: VerdictSource::Interrupted,
            message: message.into(),
            timestamp: Utc::now(),
            ..VerificationRecord::pending(ticket.candidate_id.clone(), slot.media_sha256.clone())
        });
        true
    }

    /// 重新计算表单闸门
    pub fn gate(&self) -> FormVerificationGate {
        let mut gate = FormVerificationGate {
            all_verified: false,
            total: self.slots.len(),
            verified: 0,
            pending: 0,
            failed: 0,
        };
        for slot in self.slots.values() {
            match slot.record.as_ref().map(|r| r.status) {
                Some(VerificationStatus::Verified) => gate.verified += 1,
                Some(VerificationStatus::Failed) | Some(VerificationStatus::Error) => gate.failed += 1,
                Some(VerificationStatus::Pending) | None => gate.pending += 1,
            }
        }
        gate.all_verified = gate.total > 0 && gate.verified == gate.total;
        gate
    }

    /// 提交前的整体检查：必填项 + 媒体闸门，返回第一条没通过的原因
    pub fn submission_check(&self, fields: &FormFields) -> SubmissionCheck {
        let gate = self.gate();
        let failure = if fields.hazard_type.trim().is_empty() {
            Some("Please select a hazard type")
        } else if fields.description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
            Some("Please provide a detailed description (at least 10 characters)")
        } else if !fields.location_valid() {
            Some("Location not found - Please capture location or enter manually")
        } else if gate.total == 0 {
            Some("Please upload at least one image or video")
        } else if !gate.all_verified {
            Some("All media must be verified before submission")
        } else {
            None
        };

        SubmissionCheck {
            ready: failure.is_none(),
            message: failure.unwrap_or("Form data verified successfully").to_string(),
        }
    }
}
