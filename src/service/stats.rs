use log::{info, warn};
use ndarray::{Array2, Axis};

use crate::db::{EncodingStatus, StatusCount};
use crate::encoder::embedding_from_bytes;
use crate::facedb::{FaceDB, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("No face encodings found.")]
    NoData,
    #[error("Insufficient face encodings to calculate average.")]
    InsufficientData,
    #[error("Exception occurred while calculating face images status stats: {0}")]
    Histogram(#[source] StoreError),
    #[error("Exception occurred while calculating face encoding Average: {0:#}")]
    Average(#[source] anyhow::Error),
}

/// 人脸图片统计
pub struct StatsService {
    db: FaceDB,
}

impl StatsService {
    pub fn new(db: FaceDB) -> Self {
        Self { db }
    }

    /// 各编码状态的记录数量，没有记录的状态不会出现在结果中
    pub async fn status_histogram(&self) -> Result<Vec<StatusCount>, StatsError> {
        let counts = self.db.group_count_by_status().await.map_err(|e| {
            let e = StatsError::Histogram(e);
            warn!("{e}");
            e
        })?;
        info!("返回图片编码状态统计");
        Ok(counts)
    }

    /// 所有编码成功记录的平均编码
    pub async fn average_embedding(&self) -> Result<Vec<f64>, StatsError> {
        let result = self.calc_average().await;
        if let Err(e) = &result {
            warn!("{e}");
        }
        result
    }

    async fn calc_average(&self) -> Result<Vec<f64>, StatsError> {
        let records = self
            .db
            .all_with_status(EncodingStatus::Success)
            .await
            .map_err(|e| StatsError::Average(e.into()))?;
        if records.is_empty() {
            return Err(StatsError::NoData);
        }

        let embeddings = records
            .iter()
            .map(|record| embedding_from_bytes(&record.embedding))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StatsError::Average)?;
        if embeddings.len() < 2 {
            return Err(StatsError::InsufficientData);
        }

        Ok(average_embeddings(&embeddings))
    }
}

/// 计算多个编码的逐元素平均值
///
/// 长度不足的编码会循环重复自身的值补齐到最大长度（`padded[i] = src[i % len]`），
/// 而不是补零；空编码补零
pub fn average_embeddings(embeddings: &[Vec<f64>]) -> Vec<f64> {
    let max_len = embeddings.iter().map(Vec::len).max().unwrap_or(0);
    let mut matrix = Array2::<f64>::zeros((embeddings.len(), max_len));
    for (mut row, src) in matrix.rows_mut().into_iter().zip(embeddings) {
        if src.is_empty() {
            continue;
        }
        for (i, v) in row.iter_mut().enumerate() {
            *v = src[i % src.len()];
        }
    }
    matrix.mean_axis(Axis(0)).map(|mean| mean.to_vec()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::encoder::embedding_to_bytes;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
        }
    }

    async fn memory_db() -> FaceDB {
        FaceDB::from_pool(db::init_memory_db().await.unwrap())
    }

    #[test]
    fn test_average_equal_length() {
        let embeddings = vec![
            vec![0.5, -0.3, 0.7, 0.2, -0.1],
            vec![-0.2, 0.6, 0.3, -0.4, 0.5],
            vec![0.1, 0.6, -0.1, 0.2, 0.7],
        ];
        assert_close(&average_embeddings(&embeddings), &[0.1333, 0.3, 0.3, 0.0, 0.3667]);
    }

    #[test]
    fn test_average_wraps_shorter_vectors() {
        let embeddings = vec![vec![1.0, 2.0, 3.0], vec![10.0], vec![4.0, 6.0]];
        // [10, 10, 10] 与 [4, 6, 4]
        assert_close(&average_embeddings(&embeddings), &[5.0, 6.0, 17.0 / 3.0]);
    }

    #[test]
    fn test_average_empty_vector_pads_with_zero() {
        let embeddings = vec![vec![2.0, 4.0], vec![]];
        assert_close(&average_embeddings(&embeddings), &[1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_average_requires_two_records() {
        let db = memory_db().await;
        let stats = StatsService::new(db.clone());
        assert!(matches!(stats.average_embedding().await, Err(StatsError::NoData)));

        // 编码失败的记录不参与计算
        db.insert("failed.png", &[], EncodingStatus::Failed).await.unwrap();
        assert!(matches!(stats.average_embedding().await, Err(StatsError::NoData)));

        db.insert("a.png", &embedding_to_bytes(&[1.0, 3.0]), EncodingStatus::Success)
            .await
            .unwrap();
        assert!(matches!(stats.average_embedding().await, Err(StatsError::InsufficientData)));

        db.insert("b.png", &embedding_to_bytes(&[3.0, 5.0]), EncodingStatus::Success)
            .await
            .unwrap();
        assert_close(&stats.average_embedding().await.unwrap(), &[2.0, 4.0]);
    }

    #[tokio::test]
    async fn test_average_rejects_corrupt_payload() {
        let db = memory_db().await;
        db.insert("a.png", &embedding_to_bytes(&[1.0]), EncodingStatus::Success).await.unwrap();
        db.insert("b.png", &[0u8; 5], EncodingStatus::Success).await.unwrap();

        let err = StatsService::new(db).average_embedding().await.unwrap_err();
        assert!(matches!(err, StatsError::Average(_)));
        assert!(err.to_string().starts_with("Exception occurred while calculating face encoding Average"));
    }

    #[tokio::test]
    async fn test_status_histogram() {
        let db = memory_db().await;
        let statuses = [
            EncodingStatus::Success,
            EncodingStatus::Pending,
            EncodingStatus::Success,
            EncodingStatus::Success,
            EncodingStatus::Failed,
            EncodingStatus::Pending,
        ];
        for (i, status) in statuses.into_iter().enumerate() {
            db.insert(&format!("test{i}.png"), &[], status).await.unwrap();
        }

        let mut histogram = StatsService::new(db).status_histogram().await.unwrap();
        histogram.sort_by_key(|c| c.encoding_status.as_str());
        let pairs: Vec<_> = histogram.iter().map(|c| (c.encoding_status, c.count)).collect();
        assert_eq!(
            pairs,
            [
                (EncodingStatus::Failed, 1),
                (EncodingStatus::Pending, 2),
                (EncodingStatus::Success, 3),
            ]
        );
        assert_eq!(histogram.iter().map(|c| c.count).sum::<i64>(), 6);
    }

    #[tokio::test]
    async fn test_status_histogram_omits_absent_statuses() {
        let db = memory_db().await;
        db.insert("only.png", &[], EncodingStatus::Failed).await.unwrap();
        let histogram = StatsService::new(db).status_histogram().await.unwrap();
        assert_eq!(histogram.len(), 1);
        assert_eq!(histogram[0].encoding_status, EncodingStatus::Failed);
    }
}
