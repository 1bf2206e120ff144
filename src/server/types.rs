use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{FaceImageRecord, StatusCount};

/// 上传人脸图片的请求
#[derive(TryFromMultipart)]
pub struct UploadRequest {
    pub face_image: Option<FieldData<Bytes>>,
}

/// 上传表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct UploadForm {
    /// 含有人脸的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub face_image: String,
}

/// 录入完成后返回的记录
#[derive(Debug, Serialize, ToSchema)]
pub struct FaceImageCreated {
    pub public_id: Uuid,
    /// base64 编码的人脸编码字节，编码失败时为空字符串
    pub face_encoding: String,
    /// `PENDING`、`SUCCESS` 或 `FAILED`
    pub encoding_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FaceImageRecord> for FaceImageCreated {
    fn from(record: FaceImageRecord) -> Self {
        Self {
            public_id: record.public_id,
            face_encoding: BASE64_STANDARD.encode(&record.embedding),
            encoding_status: record.status.to_string(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// 人脸图片详情
#[derive(Debug, Serialize, ToSchema)]
pub struct FaceImageDetail {
    pub face_encoding: String,
    pub encoding_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FaceImageRecord> for FaceImageDetail {
    fn from(record: FaceImageRecord) -> Self {
        Self {
            face_encoding: BASE64_STANDARD.encode(&record.embedding),
            encoding_status: record.status.to_string(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCountItem {
    pub encoding_status: String,
    pub count: i64,
}

impl From<StatusCount> for StatusCountItem {
    fn from(count: StatusCount) -> Self {
        Self { encoding_status: count.encoding_status.to_string(), count: count.count }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AverageEncoding {
    pub average_face_encoding: Vec<f64>,
}
