use oceanwatch_core::{api, config::Config, orchestrator::Orchestrator, remote::HttpRemoteVerifier};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ----------------------------------------------------------------
    // 0. 加载配置 & 日志
    // ----------------------------------------------------------------
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oceanwatch_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        host = %config.host,
        port = config.port,
        max_side = config.verifier.max_side,
        authenticity_threshold = config.verifier.authenticity_threshold,
        relevance_threshold = config.verifier.relevance_threshold,
        "配置加载完成"
    );

    // ----------------------------------------------------------------
    // 1. 核验编排器：远端可选，没配就只跑本地启发式
    // ----------------------------------------------------------------
    let mut orchestrator = Orchestrator::new(config.verifier.clone());
    match HttpRemoteVerifier::from_urls(
        config.verify_image_url.clone(),
        config.verify_video_url.clone(),
        config.remote_timeout,
    )? {
        Some(remote) => {
            info!(
                image = ?config.verify_image_url,
                video = ?config.verify_video_url,
                timeout_secs = config.remote_timeout.as_secs(),
                "远端核验已启用"
            );
            orchestrator = orchestrator.with_remote(Arc::new(remote));
        }
        None => info!("未配置远端核验，所有结论来自本地降级分析"),
    }

    // ----------------------------------------------------------------
    // 2. 启动 HTTP 服务
    // ----------------------------------------------------------------
    let state = Arc::new(api::AppState::new(orchestrator));
    let app = api::app(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(%addr, "核验服务已启动");
    info!("   - POST   /drafts                              : 新建草稿");
    info!("   - DELETE /drafts/{{id}}                         : 丢弃草稿");
    info!("   - POST   /drafts/{{id}}/media                   : 上传并核验媒体");
    info!("   - POST   /drafts/{{id}}/media/{{cid}}/verify      : 重新核验");
    info!("   - DELETE /drafts/{{id}}/media/{{cid}}             : 移除媒体");
    info!("   - POST   /drafts/{{id}}/submit-check            : 提交前检查");

    axum::serve(listener, app).await?;

    Ok(())
}
