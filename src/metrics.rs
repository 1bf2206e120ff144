use std::sync::LazyLock;

use prometheus::*;

use crate::db::EncodingStatus;

static METRIC_INGEST_IMAGE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "facestore_ingest_image_count",
        "count of the ingested images",
        &["status"]
    )
    .unwrap()
});

static METRIC_INGEST_ERROR_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "facestore_ingest_error_count",
        "count of the failed ingestions",
        &["stage"]
    )
    .unwrap()
});

static METRIC_ENCODE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("facestore_encode_duration", "duration of the per-image encoding in seconds")
        .unwrap()
});

/// 增加录入成功的图片计数
pub fn inc_image_count(status: EncodingStatus) {
    METRIC_INGEST_IMAGE_COUNT.with_label_values(&[status.as_str()]).inc();
}

/// 增加录入失败计数，`stage` 为出错的阶段
pub fn inc_error_count(stage: &str) {
    METRIC_INGEST_ERROR_COUNT.with_label_values(&[stage]).inc();
}

pub fn observe_encode_duration(duration: f32) {
    METRIC_ENCODE_DURATION.observe(duration as f64);
}
