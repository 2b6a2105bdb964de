//! APK 生成与下载 API
//!
//! 包含 /generate-apk, /download-apk/:filename 端点

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::config::env::constants::APK_MIME_TYPE;
use crate::domain::is_acceptable_url;
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::services;
use crate::state::AppState;

/// APK 生成请求
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// 目标 URL，缺失时返回 400
    pub url: Option<String>,
}

/// APK 生成响应
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    pub apk_filename: String,
    pub download_url: String,
}

/// 创建 APK 路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate-apk", post(generate_apk))
        .route("/download-apk/:filename", get(download_apk))
}

/// 生成 APK
///
/// POST /generate-apk
///
/// 校验通过后才获取并发许可并创建工作区，400 路径零副作用。
/// 编排失败细节只进日志，响应体统一为通用失败消息
async fn generate_apk(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(url) = request.url else {
        return Err(ApiError::bad_request("Missing 'url' in request body"));
    };
    if !is_acceptable_url(&url) {
        return Err(ApiError::bad_request(
            "URL must start with http:// or https://",
        ));
    }

    info!(url, "Received APK generation request");

    // 并发许可：满载时在此排队等待，而不是无上限地并行跑重型构建
    let _permit = state
        .build_permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::internal("APK generation failed"))?;

    match services::build::produce_artifact(&state.config, &url).await {
        Ok(apk_filename) => {
            state.builds_succeeded.fetch_add(1, Ordering::Relaxed);
            let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
            Ok(Json(GenerateResponse {
                success: true,
                message: "APK generated".to_string(),
                download_url: compose_download_url(host, &apk_filename),
                apk_filename,
            }))
        }
        Err(_) => {
            state.builds_failed.fetch_add(1, Ordering::Relaxed);
            Err(ApiError::internal("APK generation failed"))
        }
    }
}

/// 下载已生成的 APK
///
/// GET /download-apk/:filename
/// 以附件形式流式返回输出目录中的文件
async fn download_apk(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if !is_safe_filename(&filename) {
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let path = state.config.paths.output_dir.join(&filename);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("APK not found"))?;

    let body = Body::from_stream(ReaderStream::new(file));
    let headers = [
        (header::CONTENT_TYPE, APK_MIME_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];

    Ok((headers, body).into_response())
}

/// 组合下载地址
///
/// 有 Host header 时给出绝对 URL（scheme 固定为 http，代理后面如需 https
/// 由反代改写），否则退回相对路径
fn compose_download_url(host: Option<&str>, filename: &str) -> String {
    match host {
        Some(host) => format!("http://{}/download-apk/{}", host, filename),
        None => format!("/download-apk/{}", filename),
    }
}

/// 文件名只允许输出目录的直接子项，拒绝任何路径穿越
fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
}
