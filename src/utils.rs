use std::path::{Path, PathBuf};

use indicatif::ProgressStyle;
use regex::Regex;
use walkdir::WalkDir;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {wide_bar} {pos}/{len} {msg}")
        .expect("invalid progress bar template")
}

/// 根据逗号分隔的后缀名构建大小写不敏感的匹配规则
pub fn suffix_regex(suffix: &str) -> Regex {
    let re = format!("(?i)^({})$", regex::escape(suffix).replace(',', "|"));
    Regex::new(&re).expect("failed to build regex")
}

/// 扫描图片文件，`path` 为文件时直接返回
pub fn scan_images(path: &Path, re_suf: &Regex) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut images: Vec<_> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension().map(|s| re_suf.is_match(&s.to_string_lossy())) == Some(true)
        })
        .collect();
    images.sort();
    images
}
