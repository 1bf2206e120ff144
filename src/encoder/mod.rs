use std::sync::Arc;

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::config::{DataDir, EncoderOptions};

#[cfg(feature = "opencv")]
mod opencv;

#[cfg(feature = "opencv")]
pub use self::opencv::OpencvEncoder;

/// 人脸编码器
///
/// 输入原始图片字节，返回图片中每张人脸的编码向量，未检测到人脸时返回空列表。
/// 只有编码器本身出错时才返回 `Err`
pub trait Encoder: Send + Sync {
    fn encode(&self, image: &[u8]) -> Result<Vec<Vec<f64>>>;
}

impl<F> Encoder for F
where
    F: Fn(&[u8]) -> Result<Vec<Vec<f64>>> + Send + Sync,
{
    fn encode(&self, image: &[u8]) -> Result<Vec<Vec<f64>>> {
        self(image)
    }
}

/// 根据命令行参数创建编码器
#[cfg(feature = "opencv")]
pub fn build_encoder(data_dir: &DataDir, opts: &EncoderOptions) -> Result<Arc<dyn Encoder>> {
    Ok(Arc::new(OpencvEncoder::new(data_dir, opts)?))
}

#[cfg(not(feature = "opencv"))]
pub fn build_encoder(_data_dir: &DataDir, _opts: &EncoderOptions) -> Result<Arc<dyn Encoder>> {
    Err(anyhow::anyhow!("未启用任何人脸编码后端，请使用 `--features opencv` 重新编译"))
}

/// 将编码向量序列化为小端序 f64 字节
pub fn embedding_to_bytes(embedding: &[f64]) -> Vec<u8> {
    let mut buf = vec![0u8; embedding.len() * 8];
    LittleEndian::write_f64_into(embedding, &mut buf);
    buf
}

/// 将字节解析为 f64 序列，长度必须是 8 的整数倍
pub fn embedding_from_bytes(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return Err(anyhow::anyhow!(
            "buffer size must be a multiple of element size, got {} bytes",
            bytes.len()
        ));
    }
    let mut embedding = vec![0f64; bytes.len() / 8];
    LittleEndian::read_f64_into(bytes, &mut embedding);
    Ok(embedding)
}
