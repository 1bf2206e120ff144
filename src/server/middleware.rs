use std::sync::Arc;

use axum::Json;
use axum::body::to_bytes;
use axum::extract::{MatchedPath, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::{error, warn};

use super::error::{ApiError, ErrorLog, Result};
use super::state::AppState;
use crate::envelope::{Envelope, ErrorBody, ErrorDetail};

/// 读取框架错误响应体时的上限
const MAX_ERROR_BODY: usize = 64 * 1024;

/// 校验 `Authorization: <scheme> <key>` 中的 API key
///
/// 没有该请求头时视为匿名请求，是否放行由 `allow_anonymous` 决定
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response> {
    // 空的请求头与没有请求头一样视为匿名
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .filter(|v| !v.as_bytes().iter().all(u8::is_ascii_whitespace))
        .map(|v| v.to_str().map(str::to_owned));
    match header {
        None if state.allow_anonymous => {}
        None => {
            return Err(ApiError::Authentication(
                "Authentication credentials were not provided.".into(),
            ));
        }
        Some(value) => {
            let key = value.ok().and_then(|v| v.split_whitespace().nth(1).map(str::to_owned));
            let valid = match key {
                Some(key) => state.db.verify_api_key(&key).await?,
                None => false,
            };
            if !valid {
                return Err(ApiError::Authentication("Invalid API key.".into()));
            }
        }
    }
    Ok(next.run(req).await)
}

/// 记录所有错误响应，并把非本服务产生的错误响应包装成统一结构
pub async fn envelope_errors(req: Request, next: Next) -> Response {
    let operation = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "-".to_owned());
    let request = format!("{} {}", req.method(), req.uri());

    let response = next.run(req).await;
    if let Some(log) = response.extensions().get::<ErrorLog>() {
        if log.internal {
            error!("{} (operation: {operation}, request: {request})", log.reason);
        } else {
            warn!("{} (operation: {operation}, request: {request})", log.reason);
        }
        return response;
    }

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    // 框架或中间件直接返回的错误，例如请求体过大
    let body = match to_bytes(response.into_body(), MAX_ERROR_BODY).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => ErrorDetail::from_value(value).normalize(),
            Err(_) => ErrorBody::new(String::from_utf8_lossy(&bytes).trim()),
        },
        Err(_) => ErrorBody::new(""),
    };
    let body = match body.message.is_empty() {
        true => ErrorBody::new(status.canonical_reason().unwrap_or("Error")),
        false => body,
    };
    warn!("{} (operation: {operation}, request: {request})", body.message);
    (status, Json(Envelope::failure(body))).into_response()
}
