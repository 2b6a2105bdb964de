//! 健康检查 API

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    started_at: String,
    /// 当前活跃构建数 / 并发上限
    active_builds: usize,
    max_concurrent_builds: usize,
    builds_succeeded: u64,
    builds_failed: u64,
    /// 签名配置是否仍在使用不安全默认值
    insecure_keystore: bool,
}

/// 创建健康检查路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

/// 健康检查
///
/// GET /health，无需认证
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: "xjp-apk-agent",
        version: VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        started_at: state.started_at.to_rfc3339(),
        active_builds: state.active_builds(),
        max_concurrent_builds: state.config.max_concurrent_builds.max(1),
        builds_succeeded: state.builds_succeeded.load(Ordering::Relaxed),
        builds_failed: state.builds_failed.load(Ordering::Relaxed),
        insecure_keystore: !state.config.signing.insecure_defaults().is_empty(),
    })
}
