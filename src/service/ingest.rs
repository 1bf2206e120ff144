use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use axum::body::Bytes;
use log::{info, warn};
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;
use tokio::time::timeout;

use crate::blob::BlobStore;
use crate::db::{EncodingStatus, FaceImageRecord};
use crate::encoder::{Encoder, embedding_to_bytes};
use crate::facedb::{FaceDB, StoreError};
use crate::metrics;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Exception occurred while file storing: {0}")]
    Storage(#[source] io::Error),
    #[error("Exception occurred while encoding face image: {0:#}")]
    Encoding(#[source] anyhow::Error),
    #[error("Exception occurred while creating face image record: {0}")]
    Persistence(#[source] StoreError),
}

impl IngestError {
    fn stage(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::Encoding(_) => "encoding",
            Self::Persistence(_) => "persistence",
        }
    }
}

/// 人脸图片录入：保存图片、提取编码、写入记录
///
/// 三个步骤依次执行且不在同一事务中，写入记录失败时已保存的图片不会被删除
pub struct IngestService {
    db: FaceDB,
    blob: Arc<dyn BlobStore>,
    encoder: Arc<dyn Encoder>,
    /// 限制同时运行的编码任务数量
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl IngestService {
    pub fn new(
        db: FaceDB,
        blob: Arc<dyn BlobStore>,
        encoder: Arc<dyn Encoder>,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        Self { db, blob, encoder, permits: Arc::new(Semaphore::new(workers.max(1))), timeout }
    }

    /// 录入一张图片
    ///
    /// 未检测到人脸不是错误，返回状态为 `FAILED`、编码为空的记录
    pub async fn ingest(
        &self,
        image: Bytes,
        original_name: &str,
    ) -> Result<FaceImageRecord, IngestError> {
        let result = self.perform(image, original_name).await;
        if let Err(e) = &result {
            warn!("{e} (image: {original_name})");
            metrics::inc_error_count(e.stage());
        }
        result
    }

    async fn perform(
        &self,
        image: Bytes,
        original_name: &str,
    ) -> Result<FaceImageRecord, IngestError> {
        let locator = self.store_image(image.clone(), original_name).await?;

        info!("开始提取人脸编码: {locator}");
        let embeddings = self.encode(image).await.map_err(IngestError::Encoding)?;
        let (embedding, status) = match embeddings.into_iter().next() {
            Some(embedding) => (embedding_to_bytes(&embedding), EncodingStatus::Success),
            None => (vec![], EncodingStatus::Failed),
        };

        let record =
            self.db.insert(&locator, &embedding, status).await.map_err(IngestError::Persistence)?;
        info!("人脸图片 {} 编码完成: {}", record.public_id, record.status);
        metrics::inc_image_count(record.status);
        Ok(record)
    }

    async fn store_image(&self, image: Bytes, original_name: &str) -> Result<String, IngestError> {
        info!("接收图片，开始保存: {original_name}");
        let blob = self.blob.clone();
        let name = original_name.to_string();
        let locator = spawn_blocking(move || blob.save(&name, &image))
            .await
            .map_err(io::Error::other)
            .and_then(|r| r)
            .map_err(IngestError::Storage)?;
        info!("图片保存成功: {locator}");
        Ok(locator)
    }

    async fn encode(&self, image: Bytes) -> anyhow::Result<Vec<Vec<f64>>> {
        let start = Instant::now();
        // 等待空闲名额的时间同样计入超时
        let embeddings = match timeout(self.timeout, self.run_encoder(image)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(anyhow!("encoding timed out after {}s", self.timeout.as_secs_f32()));
            }
        };
        metrics::observe_encode_duration(start.elapsed().as_secs_f32());
        Ok(embeddings)
    }

    async fn run_encoder(&self, image: Bytes) -> anyhow::Result<Vec<Vec<f64>>> {
        let permit = self.permits.clone().acquire_owned().await?;
        let encoder = self.encoder.clone();
        // 许可随任务一起释放，超时后仍在运行的编码任务依旧占用名额
        spawn_blocking(move || {
            let _permit = permit;
            encoder.encode(&image)
        })
        .await
        .map_err(|e| anyhow!("encoder task failed: {e}"))?
    }
}
