use std::sync::Arc;
use std::time::Duration;

use crate::blob::BlobStore;
use crate::config::IngestOptions;
use crate::encoder::Encoder;
use crate::facedb::FaceDB;
use crate::service::{IngestService, StatsService};

/// 应用状态
pub struct AppState {
    /// 数据库连接
    pub db: FaceDB,
    /// 人脸图片录入
    pub ingest: IngestService,
    /// 统计
    pub stats: StatsService,
    /// 是否允许不带 API key 的请求
    pub allow_anonymous: bool,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        db: FaceDB,
        blob: Arc<dyn BlobStore>,
        encoder: Arc<dyn Encoder>,
        opts: &IngestOptions,
        allow_anonymous: bool,
    ) -> Arc<Self> {
        let ingest = IngestService::new(
            db.clone(),
            blob,
            encoder,
            opts.workers(),
            Duration::from_secs(opts.encode_timeout),
        );
        Arc::new(AppState { stats: StatsService::new(db.clone()), db, ingest, allow_anonymous })
    }
}
