use chrono::Utc;
use log::{info, warn};
use rand::distr::{Alphanumeric, SampleString};
use uuid::Uuid;

use crate::config::DataDir;
use crate::db::{self, ApiKeyRecord, Database, EncodingStatus, FaceImageRecord, StatusCount, crud};

/// API key 前缀长度
const KEY_PREFIX_LEN: usize = 8;
/// API key 密钥部分长度
const KEY_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found.")]
    NotFound,
    #[error("face image with this image locator already exists: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// 人脸图片记录存储
///
/// 记录写入后不再修改，`image_locator` 的唯一性由数据库约束保证
#[derive(Clone)]
pub struct FaceDB {
    db: Database,
}

impl FaceDB {
    /// 打开数据目录下的数据库，不存在时自动创建
    pub async fn open(data_dir: &DataDir) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir.path())?;
        let db = db::init_db(data_dir.database()).await?;
        Ok(Self { db })
    }

    pub fn from_pool(db: Database) -> Self {
        Self { db }
    }

    /// 插入一条记录，公开 ID 与时间戳在此时分配
    pub async fn insert(
        &self,
        image_locator: &str,
        embedding: &[u8],
        status: EncodingStatus,
    ) -> Result<FaceImageRecord, StoreError> {
        let public_id = Uuid::new_v4();
        let result =
            crud::add_face_image(&self.db, public_id, image_locator, embedding, status, Utc::now())
                .await;
        match result {
            Ok(record) => Ok(record),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                warn!("图片位置重复: {image_locator}");
                Err(StoreError::Conflict(image_locator.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_public_id(&self, public_id: Uuid) -> Result<FaceImageRecord, StoreError> {
        crud::get_face_image(&self.db, public_id).await?.ok_or(StoreError::NotFound)
    }

    pub async fn group_count_by_status(&self) -> Result<Vec<StatusCount>, StoreError> {
        Ok(crud::count_by_status(&self.db).await?)
    }

    pub async fn all_with_status(
        &self,
        status: EncodingStatus,
    ) -> Result<Vec<FaceImageRecord>, StoreError> {
        Ok(crud::get_face_images_by_status(&self.db, status).await?)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        Ok(crud::ping(&self.db).await?)
    }

    /// 生成新的 API key，明文只在此时返回一次
    pub async fn create_api_key(&self, name: &str) -> Result<(ApiKeyRecord, String), StoreError> {
        // ThreadRng 不是 Send，必须在 await 之前释放
        let (prefix, secret) = {
            let mut rng = rand::rng();
            (
                Alphanumeric.sample_string(&mut rng, KEY_PREFIX_LEN),
                Alphanumeric.sample_string(&mut rng, KEY_SECRET_LEN),
            )
        };
        let key = format!("{prefix}.{secret}");
        let hash = blake3::hash(key.as_bytes());
        let record =
            crud::add_api_key(&self.db, &prefix, hash.as_bytes(), name, Utc::now()).await?;
        info!("创建 API key: {} ({})", record.prefix, record.name);
        Ok((record, key))
    }

    /// 校验 API key 是否有效
    pub async fn verify_api_key(&self, key: &str) -> Result<bool, StoreError> {
        let Some((prefix, _)) = key.split_once('.') else {
            return Ok(false);
        };
        let Some(record) = crud::get_active_api_key(&self.db, prefix).await? else {
            return Ok(false);
        };
        // blake3::Hash 的比较是常数时间的
        let expected = blake3::Hash::from_slice(&record.hashed_key)
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(blake3::hash(key.as_bytes()) == expected)
    }

    pub async fn list_api_keys(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        Ok(crud::list_api_keys(&self.db).await?)
    }

    pub async fn revoke_api_key(&self, prefix: &str) -> Result<(), StoreError> {
        match crud::revoke_api_key(&self.db, prefix).await? {
            true => Ok(()),
            false => Err(StoreError::NotFound),
        }
    }
}
