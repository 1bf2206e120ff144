use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Bytes;
use clap::Parser;
use futures::StreamExt;
use indicatif::ProgressBar;

use crate::blob::LocalBlobStore;
use crate::cli::SubCommandExtend;
use crate::config::{EncoderOptions, IngestOptions, Opts};
use crate::db::EncodingStatus;
use crate::encoder::build_encoder;
use crate::facedb::FaceDB;
use crate::service::IngestService;
use crate::utils::{pb_style, scan_images, suffix_regex};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub encoder: EncoderOptions,
    #[command(flatten)]
    pub ingest: IngestOptions,
    /// 图片文件或所在目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,png,webp")]
    pub suffix: String,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = suffix_regex(&self.suffix);
        let images = scan_images(&self.path, &re_suf);

        let db = FaceDB::open(&opts.data_dir).await?;
        let blob = Arc::new(LocalBlobStore::new(opts.data_dir.media())?);
        let encoder = build_encoder(&opts.data_dir, &self.encoder)?;
        let workers = self.ingest.workers();
        let service = IngestService::new(
            db,
            blob,
            encoder,
            workers,
            Duration::from_secs(self.ingest.encode_timeout),
        );

        let pb = ProgressBar::new(images.len() as u64).with_style(pb_style());
        let (mut success, mut failed, mut error) = (0usize, 0usize, 0usize);

        let mut results = futures::stream::iter(images)
            .map(|path| {
                let service = &service;
                async move {
                    let result = async {
                        let data = tokio::fs::read(&path).await?;
                        let name = path
                            .file_name()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        Ok::<_, anyhow::Error>(service.ingest(Bytes::from(data), &name).await?)
                    }
                    .await;
                    (path, result)
                }
            })
            .buffer_unordered(workers);

        while let Some((path, result)) = results.next().await {
            match result {
                Ok(record) => {
                    match record.status {
                        EncodingStatus::Success => success += 1,
                        _ => failed += 1,
                    }
                    pb.println(format!(
                        "[OK] {} -> {} ({})",
                        path.display(),
                        record.public_id,
                        record.status
                    ));
                }
                Err(e) => {
                    error += 1;
                    pb.println(format!("[ERR] {}: {e:#}", path.display()));
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message(format!(
            "图片添加完成，成功 {success}，未检测到人脸 {failed}，出错 {error}"
        ));
        Ok(())
    }
}
