use std::io::Cursor;
use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum_typed_multipart::{TypedMultipart, TypedMultipartError};
use image::ImageReader;
use log::{error, info};
use uuid::Uuid;

use super::error::{ApiError, ApiResponse, Result};
use super::state::AppState;
use super::types::*;
use crate::envelope::{ErrorBody, ErrorDetail};

const FIELD_FACE_IMAGE: &str = "face_image";

/// 上传一张图片并提取人脸编码
#[utoipa::path(
    post,
    path = "/face-image/",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, body = FaceImageCreated),
        (status = 400, body = ErrorBody),
    )
)]
pub async fn create_face_image(
    State(state): State<Arc<AppState>>,
    data: std::result::Result<TypedMultipart<UploadRequest>, TypedMultipartError>,
) -> Result<ApiResponse> {
    let data = data.map_err(|e| ApiError::Validation(ErrorDetail::field(FIELD_FACE_IMAGE, e.to_string())))?;
    let Some(file) = data.0.face_image else {
        return Err(ApiError::Validation(ErrorDetail::field(
            FIELD_FACE_IMAGE,
            "No file was submitted.",
        )));
    };
    validate_image(&file.contents)?;

    let file_name = file.metadata.file_name.unwrap_or_default();
    let record = state.ingest.ingest(file.contents, &file_name).await?;
    ApiResponse::new(StatusCode::CREATED, FaceImageCreated::from(record))
}

/// 获取人脸图片详情
#[utoipa::path(
    get,
    path = "/face-image/{public_id}/",
    params(("public_id" = Uuid, Path, description = "人脸图片的公开 ID")),
    responses(
        (status = 200, body = FaceImageDetail),
        (status = 404, body = ErrorBody),
    )
)]
pub async fn get_face_image(
    State(state): State<Arc<AppState>>,
    public_id: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<ApiResponse> {
    // 不是合法 UUID 的路径等同于不存在
    let Path(public_id) = public_id.map_err(|_| ApiError::NotFound)?;
    let record = state.db.get_by_public_id(public_id).await?;
    ApiResponse::ok(FaceImageDetail::from(record))
}

/// 各编码状态的图片数量
#[utoipa::path(
    get,
    path = "/face-image/stats/",
    responses((status = 200, body = Vec<StatusCountItem>))
)]
pub async fn face_image_stats(State(state): State<Arc<AppState>>) -> Result<ApiResponse> {
    let counts = state.stats.status_histogram().await?;
    ApiResponse::ok(counts.into_iter().map(StatusCountItem::from).collect::<Vec<_>>())
}

/// 所有编码成功的人脸的平均编码
#[utoipa::path(
    get,
    path = "/face-image/avg-encodings/",
    responses(
        (status = 200, body = AverageEncoding),
        (status = 400, body = ErrorBody),
    )
)]
pub async fn average_encodings(State(state): State<Arc<AppState>>) -> Result<ApiResponse> {
    let average = state.stats.average_embedding().await?;
    ApiResponse::ok(AverageEncoding { average_face_encoding: average })
}

/// 服务健康检查，无需鉴权
#[utoipa::path(
    get,
    path = "/health-check/",
    responses(
        (status = 200),
        (status = 503, body = ErrorBody),
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<ApiResponse> {
    info!("开始健康检查");
    if let Err(e) = state.db.ping().await {
        error!("无法连接数据库: {e}");
        return Err(ApiError::Unavailable("Database failure!".into()));
    }
    info!("健康检查通过");
    ApiResponse::ok("Service is healthy.")
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

/// 确认上传的文件是可以识别的图片
fn validate_image(contents: &[u8]) -> Result<()> {
    if contents.is_empty() {
        return Err(ApiError::Validation(ErrorDetail::field(
            FIELD_FACE_IMAGE,
            "The submitted file is empty.",
        )));
    }
    let valid = ImageReader::new(Cursor::new(contents))
        .with_guessed_format()
        .ok()
        .filter(|reader| reader.format().is_some())
        .is_some_and(|reader| reader.into_dimensions().is_ok());
    if !valid {
        return Err(ApiError::Validation(ErrorDetail::field(
            FIELD_FACE_IMAGE,
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        )));
    }
    Ok(())
}
