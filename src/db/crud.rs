use chrono::{DateTime, Utc};
use sqlx::{Executor, Result, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{ApiKeyRecord, EncodingStatus, FaceImageRecord, StatusCount};

/// 添加人脸图片记录，返回插入后的完整记录
pub async fn add_face_image<'c, E>(
    executor: E,
    public_id: Uuid,
    image_locator: &str,
    embedding: &[u8],
    status: EncodingStatus,
    now: DateTime<Utc>,
) -> Result<FaceImageRecord>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, FaceImageRecord>(
        r#"
        INSERT INTO face_image (public_id, image_locator, face_encoding, encoding_status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(public_id)
    .bind(image_locator)
    .bind(embedding)
    .bind(status)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
}

/// 根据公开 ID 查询记录
pub async fn get_face_image(
    executor: &SqlitePool,
    public_id: Uuid,
) -> Result<Option<FaceImageRecord>> {
    sqlx::query_as::<_, FaceImageRecord>(
        r#"
        SELECT * FROM face_image WHERE public_id = ?
        "#,
    )
    .bind(public_id)
    .fetch_optional(executor)
    .await
}

/// 按编码状态分组计数
pub async fn count_by_status(executor: &SqlitePool) -> Result<Vec<StatusCount>> {
    sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT encoding_status, COUNT(*) AS count FROM face_image GROUP BY encoding_status
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 获取指定状态的所有记录
pub async fn get_face_images_by_status(
    executor: &SqlitePool,
    status: EncodingStatus,
) -> Result<Vec<FaceImageRecord>> {
    sqlx::query_as::<_, FaceImageRecord>(
        r#"
        SELECT * FROM face_image WHERE encoding_status = ? ORDER BY id ASC
        "#,
    )
    .bind(status)
    .fetch_all(executor)
    .await
}

/// 数据库存活检查
pub async fn ping(executor: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1;").execute(executor).await?;
    Ok(())
}

/// 添加 API key
pub async fn add_api_key(
    executor: &SqlitePool,
    prefix: &str,
    hashed_key: &[u8],
    name: &str,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord> {
    sqlx::query_as::<_, ApiKeyRecord>(
        r#"
        INSERT INTO api_key (prefix, hashed_key, name, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(prefix)
    .bind(hashed_key)
    .bind(name)
    .bind(now)
    .fetch_one(executor)
    .await
}

/// 根据前缀查找未吊销的 API key
pub async fn get_active_api_key(
    executor: &SqlitePool,
    prefix: &str,
) -> Result<Option<ApiKeyRecord>> {
    sqlx::query_as::<_, ApiKeyRecord>(
        r#"
        SELECT * FROM api_key WHERE prefix = ? AND revoked = 0
        "#,
    )
    .bind(prefix)
    .fetch_optional(executor)
    .await
}

pub async fn list_api_keys(executor: &SqlitePool) -> Result<Vec<ApiKeyRecord>> {
    sqlx::query_as::<_, ApiKeyRecord>("SELECT * FROM api_key ORDER BY id ASC")
        .fetch_all(executor)
        .await
}

/// 吊销 API key，返回是否有记录被修改
pub async fn revoke_api_key(executor: &SqlitePool, prefix: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE api_key SET revoked = 1 WHERE prefix = ? AND revoked = 0")
        .bind(prefix)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
