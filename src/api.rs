use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    error::VerifyError,
    evidence::VerificationRecord,
    hazard::HazardCategory,
    media::{CandidateId, MediaCandidate, MediaOrigin},
    orchestrator::Orchestrator,
    store::{Draft, FormFields, FormVerificationGate, SubmissionCheck},
};

type ApiError = (StatusCode, String);

// ==========================================
// 1. 应用状态
// ==========================================
// 每份草稿一把锁：同一草稿里的多张图可以并发核验（编排器只在首尾拿锁），
// 不同草稿之间互不干扰。外层这把锁只在查找/创建草稿时短暂持有。
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub drafts: Mutex<HashMap<String, Arc<Mutex<Draft>>>>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            drafts: Mutex::new(HashMap::new()),
        }
    }

    async fn draft(&self, draft_id: &str) -> Result<Arc<Mutex<Draft>>, ApiError> {
        self.drafts
            .lock()
            .await
            .get(draft_id)
            .cloned()
            .ok_or_else(|| (StatusCode::NOT_FOUND, format!("draft not found: {draft_id}")))
    }
}

// ==========================================
// 2. 数据传输对象
// ==========================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftCreated {
    pub draft_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub records: Vec<VerificationRecord>,
    pub gate: FormVerificationGate,
}

/// 核验回执。`record` 为空说明核验期间候选已被移除，结果作废
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReceipt {
    pub candidate_id: CandidateId,
    pub record: Option<VerificationRecord>,
    pub gate: FormVerificationGate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub hazard_type: String,
    #[serde(default)]
    pub description: String,
}

// ==========================================
// 3. 路由
// ==========================================
pub fn app(state: Arc<AppState>) -> Router {
    // 请求体上限：最大的视频再留 1MB 给表单字段
    let body_limit = state.orchestrator.config().max_video_bytes as usize + 1024 * 1024;

    Router::new()
        .route("/drafts", post(create_draft))
        .route("/drafts/{draft_id}", get(get_draft).delete(delete_draft))
        .route("/drafts/{draft_id}/media", post(upload_media))
        .route("/drafts/{draft_id}/media/{candidate_id}/verify", post(reverify_media))
        .route("/drafts/{draft_id}/media/{candidate_id}", delete(remove_media))
        .route("/drafts/{draft_id}/submit-check", post(submit_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()) // ⚠️ 开发模式：允许所有跨域
        .with_state(state)
}

// ==========================================
// 4. 处理函数
// ==========================================

async fn create_draft(State(state): State<Arc<AppState>>) -> Json<DraftCreated> {
    let mut raw = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut raw);
    let draft_id = hex::encode(raw);

    state
        .drafts
        .lock()
        .await
        .insert(
            draft_id.clone(),
            Arc::new(Mutex::new(Draft::with_limit(state.orchestrator.config().max_candidates))),
        );
    info!(draft = %draft_id, "新建草稿");

    Json(DraftCreated { draft_id })
}

async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Result<Json<DraftView>, ApiError> {
    let draft = state.draft(&draft_id).await?;
    let draft = draft.lock().await;
    Ok(Json(DraftView {
        records: draft.records().into_iter().cloned().collect(),
        gate: draft.gate(),
    }))
}

/// 接口：丢弃整份草稿（提交完或者用户放弃），连同所有媒体字节一起释放
async fn delete_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .drafts
        .lock()
        .await
        .remove(&draft_id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("draft not found: {draft_id}")))?;
    info!(draft = %draft_id, "删除草稿");
    Ok(StatusCode::NO_CONTENT)
}

/// 接口：上传一个媒体文件并立即核验
async fn upload_media(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<MediaReceipt>, ApiError> {
    let draft = state.draft(&draft_id).await?;

    let mut file: Option<(String, String, bytes::Bytes)> = None;
    let mut hazard_type = String::new();
    let mut description = String::new();
    let mut origin = MediaOrigin::Upload;

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" | "image" | "video" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(bad_request)?;
                file = Some((file_name, mime, data));
            }
            "hazard_type" => hazard_type = field.text().await.map_err(bad_request)?,
            "description" => description = field.text().await.map_err(bad_request)?,
            "origin" => origin = MediaOrigin::parse(&field.text().await.map_err(bad_request)?),
            _ => {}
        }
    }

    let (name, mime, data) =
        file.ok_or_else(|| (StatusCode::BAD_REQUEST, "missing `file` field".to_string()))?;
    info!(draft = %draft_id, name = %name, mime = %mime, bytes = data.len(), "收到媒体上传");

    let candidate = MediaCandidate::new(name, mime, data).with_origin(origin);
    let candidate_id = draft.lock().await.add(candidate).map_err(verify_error)?;

    let category = HazardCategory::parse_lenient(&hazard_type);
    let record = run_detached(&state, &draft, &candidate_id, category, description).await?;

    let gate = draft.lock().await.gate();
    Ok(Json(MediaReceipt {
        candidate_id,
        record,
        gate,
    }))
}

/// 接口：类别或描述改了之后重新核验，新记录整条替换旧记录
async fn reverify_media(
    State(state): State<Arc<AppState>>,
    Path((draft_id, candidate_id)): Path<(String, String)>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<MediaReceipt>, ApiError> {
    let draft = state.draft(&draft_id).await?;
    let candidate_id = CandidateId::from(candidate_id);
    let category = HazardCategory::parse_lenient(&req.hazard_type);

    let record = run_detached(&state, &draft, &candidate_id, category, req.description).await?;

    let gate = draft.lock().await.gate();
    Ok(Json(MediaReceipt {
        candidate_id,
        record,
        gate,
    }))
}

async fn remove_media(
    State(state): State<Arc<AppState>>,
    Path((draft_id, candidate_id)): Path<(String, String)>,
) -> Result<Json<FormVerificationGate>, ApiError> {
    let draft = state.draft(&draft_id).await?;
    let mut draft = draft.lock().await;
    let candidate_id = CandidateId::from(candidate_id);
    draft
        .remove(&candidate_id)
        .ok_or_else(|| verify_error(VerifyError::CandidateNotFound(candidate_id.to_string())))?;
    info!(draft = %draft_id, candidate = %candidate_id, "移除媒体");
    Ok(Json(draft.gate()))
}

async fn submit_check(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(fields): Json<FormFields>,
) -> Result<Json<SubmissionCheck>, ApiError> {
    let draft = state.draft(&draft_id).await?;
    let check = draft.lock().await.submission_check(&fields);
    Ok(Json(check))
}

/// 核验放到独立任务里跑：客户端中途断开时 handler 会被丢弃，但核验照样跑完入库
async fn run_detached(
    state: &AppState,
    draft: &Arc<Mutex<Draft>>,
    candidate_id: &CandidateId,
    category: HazardCategory,
    description: String,
) -> Result<Option<VerificationRecord>, ApiError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let draft = Arc::clone(draft);
    let candidate_id = candidate_id.clone();

    tokio::spawn(async move {
        orchestrator
            .run(&draft, &candidate_id, category, &description)
            .await
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("verification task failed: {e}")))?
    .map_err(verify_error)
}

fn bad_request(e: axum::extract::multipart::MultipartError) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn verify_error(e: VerifyError) -> ApiError {
    match e {
        VerifyError::CandidateNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        VerifyError::DraftFull(_) => (StatusCode::CONFLICT, e.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
