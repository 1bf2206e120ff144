use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use prometheus::{BasicAuthentication, labels};
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tokio::time::{Duration, sleep};

use crate::blob::LocalBlobStore;
use crate::cli::SubCommandExtend;
use crate::config::{EncoderOptions, IngestOptions};
use crate::encoder::build_encoder;
use crate::{FaceDB, Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub encoder: EncoderOptions,
    #[command(flatten)]
    pub ingest: IngestOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// 允许不带 API key 的匿名请求
    #[arg(long)]
    pub allow_anonymous: bool,
    /// 上传大小限制，单位为 MiB
    #[arg(long, value_name = "MIB", default_value_t = 10)]
    pub upload_limit: usize,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = FaceDB::open(&opts.data_dir).await?;
        let blob = Arc::new(LocalBlobStore::new(opts.data_dir.media())?);
        let encoder = build_encoder(&opts.data_dir, &self.encoder)?;

        if self.allow_anonymous {
            info!("允许匿名请求");
        }

        // 创建应用状态
        let state = server::AppState::new(db, blob, encoder, &self.ingest, self.allow_anonymous);

        // 创建应用
        let app = server::create_app(state, self.upload_limit * 1024 * 1024);

        if let Some(url) = self.prometheus_push.clone() {
            let instance = self.prometheus_instance.clone().unwrap_or_else(|| self.addr.clone());
            let auth = match &self.prometheus_auth {
                Some(s) => {
                    let (username, password) = s
                        .split_once(':')
                        .ok_or_else(|| anyhow::anyhow!("prometheus 认证信息格式错误"))?;
                    Some((username.to_string(), password.to_string()))
                }
                None => None,
            };
            tokio::spawn(push_metrics(url, instance, auth));
        }

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn push_metrics(url: String, instance: String, auth: Option<(String, String)>) {
    loop {
        let metric_families = prometheus::gather();
        let url = url.clone();
        let instance = instance.clone();
        let auth = auth.clone();
        let r = spawn_blocking(move || {
            prometheus::push_metrics(
                "facestore",
                labels! {
                    "instance".to_string() => instance,
                },
                &url,
                metric_families,
                auth.map(|(username, password)| BasicAuthentication { username, password }),
            )
        })
        .await;
        match r {
            Ok(Err(e)) => error!("推送指标失败: {e}"),
            Err(e) => error!("推送指标失败: {e}"),
            Ok(Ok(())) => {}
        }
        sleep(Duration::from_secs(30)).await;
    }
}
