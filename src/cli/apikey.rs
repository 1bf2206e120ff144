use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::facedb::FaceDB;

#[derive(Parser, Debug, Clone)]
pub struct ApiKeyCommand {
    #[command(subcommand)]
    pub action: ApiKeyAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ApiKeyAction {
    /// 创建新的 API key，明文只显示一次
    Create {
        /// 备注名称
        name: String,
    },
    /// 列出所有 API key
    List,
    /// 吊销 API key
    Revoke {
        /// API key 前缀
        prefix: String,
    },
}

impl SubCommandExtend for ApiKeyCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = FaceDB::open(&opts.data_dir).await?;

        match &self.action {
            ApiKeyAction::Create { name } => {
                let (_, key) = db.create_api_key(name).await?;
                println!("{key}");
            }
            ApiKeyAction::List => {
                for key in db.list_api_keys().await? {
                    let state = if key.revoked { "revoked" } else { "active" };
                    println!("{}\t{}\t{}\t{}", key.prefix, state, key.created_at, key.name);
                }
            }
            ApiKeyAction::Revoke { prefix } => {
                db.revoke_api_key(prefix).await?;
                println!("已吊销 API key: {prefix}");
            }
        }
        Ok(())
    }
}
