use anyhow::Result;
use clap::Parser;
use uuid::Uuid;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat};
use crate::facedb::FaceDB;
use crate::server::FaceImageDetail;

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// 人脸图片的公开 ID
    pub public_id: Uuid,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ShowCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = FaceDB::open(&opts.data_dir).await?;
        let record = db.get_by_public_id(self.public_id).await?;

        match self.output_format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&FaceImageDetail::from(record))?)
            }
            OutputFormat::Table => {
                println!("public_id\t{}", record.public_id);
                println!("image_locator\t{}", record.image_locator);
                println!("encoding_status\t{}", record.status);
                println!("face_encoding\t{} bytes", record.embedding.len());
                println!("created_at\t{}", record.created_at);
                println!("updated_at\t{}", record.updated_at);
            }
        }
        Ok(())
    }
}
