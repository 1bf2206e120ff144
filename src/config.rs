use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs =
        ProjectDirs::from("", "facestore", "facestore").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

/// 人脸编码器参数
#[derive(Parser, Debug, Clone)]
pub struct EncoderOptions {
    /// YuNet 人脸检测模型路径，默认为数据目录下的 models/face_detection_yunet_2023mar.onnx
    #[arg(long, value_name = "FILE")]
    pub detector_model: Option<PathBuf>,
    /// SFace 人脸识别模型路径，默认为数据目录下的 models/face_recognition_sface_2021dec.onnx
    #[arg(long, value_name = "FILE")]
    pub recognizer_model: Option<PathBuf>,
    /// 人脸检测置信度阈值
    #[arg(long, value_name = "SCORE", default_value_t = 0.9)]
    pub score_threshold: f32,
    /// 人脸检测 NMS 阈值
    #[arg(long, value_name = "THRESHOLD", default_value_t = 0.3)]
    pub nms_threshold: f32,
    /// NMS 之前保留的候选框数量
    #[arg(long, value_name = "N", default_value_t = 5000)]
    pub top_k: i32,
}

/// 人脸录入参数
#[derive(Parser, Debug, Clone)]
pub struct IngestOptions {
    /// 单次编码的超时时间，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub encode_timeout: u64,
    /// 同时进行编码的最大任务数，默认为 CPU 核心数
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

impl IngestOptions {
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "facestore", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// facestore 数据目录
    #[arg(short, long, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动 HTTP 服务
    Server(ServerCommand),
    /// 录入图片并提取人脸编码
    Add(AddCommand),
    /// 显示一条人脸图片记录
    Show(ShowCommand),
    /// 显示编码状态统计与平均人脸编码
    Stats(StatsCommand),
    /// 管理 API key
    #[command(name = "apikey")]
    ApiKey(ApiKeyCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("facestore.db")
    }

    /// 返回上传图片的存储目录
    pub fn media(&self) -> PathBuf {
        self.path.join("media")
    }

    /// 返回模型文件所在目录
    pub fn models(&self) -> PathBuf {
        self.path.join("models")
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
