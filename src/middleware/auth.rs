//! API Key 认证中间件
//!
//! 提供 `RequireApiKey` extractor。未配置 `APK_AGENT_API_KEY` 时接口保持
//! 开放（与最初的生成服务行为一致），配置后校验 `x-api-key` header

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HeaderMap, request::Parts},
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// API Key 认证 Extractor
///
/// # Example
///
/// ```ignore
/// async fn protected_handler(
///     _auth: RequireApiKey,
///     State(state): State<Arc<AppState>>,
/// ) -> impl IntoResponse {
///     // handler 逻辑...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireApiKey;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        verify_api_key(&parts.headers, state.config.api_key.as_deref())
    }
}

/// 验证 API Key
///
/// `expected_key` 为 None 时跳过校验
pub fn verify_api_key(
    headers: &HeaderMap,
    expected_key: Option<&str>,
) -> Result<RequireApiKey, ApiError> {
    let Some(expected) = expected_key else {
        return Ok(RequireApiKey);
    };

    let provided_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    match provided_key {
        Some(key) if key == expected => Ok(RequireApiKey),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(ApiError::unauthorized())
        }
        None => {
            tracing::warn!("Missing x-api-key header");
            Err(ApiError::unauthorized())
        }
    }
}
