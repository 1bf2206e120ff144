use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 人脸编码状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum EncodingStatus {
    Pending,
    Success,
    Failed,
}

impl EncodingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for EncodingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 人脸图片记录
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FaceImageRecord {
    /// 内部自增 ID，不对外暴露
    pub id: i64,
    /// 对外公开的 ID
    pub public_id: Uuid,
    /// 图片在存储中的位置
    pub image_locator: String,
    /// 人脸编码，小端序 f64 序列；仅在编码成功时非空
    #[sqlx(rename = "face_encoding")]
    pub embedding: Vec<u8>,
    /// 编码状态
    #[sqlx(rename = "encoding_status")]
    pub status: EncodingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 按状态分组的计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub encoding_status: EncodingStatus,
    pub count: i64,
}

/// API key 记录，只保存前缀与哈希
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRecord {
    pub id: i64,
    pub prefix: String,
    pub hashed_key: Vec<u8>,
    pub name: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}
