use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ndarray::Array1;
use ndarray_npy::write_npy;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat};
use crate::facedb::FaceDB;
use crate::server::{AverageEncoding, StatusCountItem};
use crate::service::StatsService;

#[derive(Parser, Debug, Clone)]
pub struct StatsCommand {
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
    /// 同时计算平均人脸编码
    #[arg(long)]
    pub average: bool,
    /// 将平均人脸编码保存为 .npy 文件
    #[arg(long, value_name = "FILE", requires = "average")]
    pub export: Option<PathBuf>,
}

impl SubCommandExtend for StatsCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = FaceDB::open(&opts.data_dir).await?;
        let stats = StatsService::new(db);

        let counts: Vec<_> =
            stats.status_histogram().await?.into_iter().map(StatusCountItem::from).collect();
        let average = match self.average {
            true => Some(stats.average_embedding().await?),
            false => None,
        };

        match self.output_format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&counts)?);
                if let Some(average) = &average {
                    let average = AverageEncoding { average_face_encoding: average.clone() };
                    println!("{}", serde_json::to_string_pretty(&average)?);
                }
            }
            OutputFormat::Table => {
                for item in &counts {
                    println!("{}\t{}", item.encoding_status, item.count);
                }
                if let Some(average) = &average {
                    println!("average\t{average:?}");
                }
            }
        }

        if let (Some(path), Some(average)) = (&self.export, average) {
            write_npy(path, &Array1::from(average))?;
            println!("平均人脸编码已保存至 {}", path.display());
        }
        Ok(())
    }
}
