use axum::Json;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::envelope::{Envelope, ErrorBody, ErrorDetail, SERVER_ERROR_MESSAGE};
use crate::facedb::StoreError;
use crate::service::{IngestError, StatsError};

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// API错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(ErrorDetail),
    #[error("Not found.")]
    NotFound,
    #[error("{0}")]
    Authentication(String),
    #[error("Method \"{0}\" not allowed.")]
    MethodNotAllowed(Method),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// 附加在错误响应上，供日志中间件记录
#[derive(Debug, Clone)]
pub struct ErrorLog {
    pub reason: String,
    pub internal: bool,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(ErrorDetail::Message(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(self) -> ErrorBody {
        match self {
            Self::Validation(detail) => detail.normalize(),
            Self::Internal(_) => ErrorBody::new(SERVER_ERROR_MESSAGE),
            other => ErrorBody::new(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let internal = match &self {
            Self::Internal(e) => Some(format!("{e:#}")),
            _ => None,
        };
        let body = self.body();
        let log = ErrorLog {
            reason: internal.clone().unwrap_or_else(|| match &body.extra {
                Some(extra) => format!("{} ({extra})", body.message),
                None => body.message.clone(),
            }),
            internal: internal.is_some(),
        };
        let mut response = (status, Json(Envelope::failure(body))).into_response();
        response.extensions_mut().insert(log);
        response
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Conflict(_) => Self::Validation(ErrorDetail::field(
                "image_locator",
                "face image with this image locator already exists.",
            )),
            StoreError::Database(e) => Self::Internal(e.into()),
        }
    }
}

/// 成功响应，数据会按统一结构包装
pub struct ApiResponse {
    status: StatusCode,
    data: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, data: impl Serialize) -> Result<Self> {
        let data = serde_json::to_value(data).map_err(anyhow::Error::from)?;
        Ok(Self { status, data })
    }

    pub fn ok(data: impl Serialize) -> Result<Self> {
        Self::new(StatusCode::OK, data)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(Envelope::success(self.data))).into_response()
    }
}
