use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, warn};
use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;

static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^-\w.]").expect("failed to build regex"));

/// 重名时附加的随机后缀长度
const SUFFIX_LEN: usize = 7;

/// 上传图片的二进制存储
pub trait BlobStore: Send + Sync {
    /// 以不与已有文件冲突的名字保存数据，返回存储位置
    fn save(&self, name: &str, data: &[u8]) -> io::Result<String>;
}

/// 本地目录存储
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for LocalBlobStore {
    fn save(&self, name: &str, data: &[u8]) -> io::Result<String> {
        let name = valid_name(name);
        let mut candidate = name.clone();
        loop {
            let path = self.root.join(&candidate);
            // create_new 保证并发上传同名文件时不会互相覆盖
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    write_or_remove(&path, file, data)?;
                    debug!("图片已保存: {}", path.display());
                    return Ok(path.to_string_lossy().into_owned());
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = with_random_suffix(&name);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 写入新建的文件，失败时删除写了一半的文件，避免占用文件名
fn write_or_remove(path: &Path, mut file: File, data: &[u8]) -> io::Result<()> {
    let result = file.write_all(data).and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = result {
        if let Err(err) = std::fs::remove_file(path) {
            warn!("无法删除写入失败的文件 {}: {err}", path.display());
        }
        return Err(e);
    }
    Ok(())
}

/// 清理文件名：去掉目录部分，空白替换为下划线，删除其余非法字符
fn valid_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = base.trim().replace(' ', "_");
    let base = INVALID_CHARS.replace_all(&base, "");
    match base.trim_matches('.') {
        "" => "upload".to_string(),
        _ => base.into_owned(),
    }
}

fn with_random_suffix(name: &str) -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), SUFFIX_LEN);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{name}_{suffix}"),
    }
}
