// store.rs — 内容寻址的图片存储
//
// 文件名由内容决定：{dir}/{prefix}-{sha256 前 7 位}[__tag1_tag2]{.ext}
// 扩展名来自内容嗅探，而不是 URL。相同内容总是得到相同路径。

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::source::Image;

pub const DEFAULT_PREFIX: &str = "sw";

/// 指纹长度（十六进制字符数）
const FINGERPRINT_LEN: usize = 7;

/// 单个标签清洗后的最大长度
const MAX_TAG_LEN: usize = 20;

/// 保存结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub path: PathBuf,
    /// 同名文件已存在，未重新写入
    pub already_present: bool,
}

/// 图片存储目录
#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
    prefix: String,
}

impl ContentStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// 读完图片流并保存
    pub async fn save(&self, image: Image, tags: &[String], cancel: &CancelToken) -> Result<Stored> {
        let data = image.into_bytes(cancel).await?;
        self.save_bytes(&data, tags).await
    }

    /// 根据内容计算文件名（不含目录）
    pub fn file_name(&self, data: &[u8], tags: &[String]) -> Result<String> {
        let format = image::guess_format(data).map_err(|_| Error::UnknownExtension)?;
        Ok(format!(
            "{}-{}{}.{}",
            self.prefix,
            fingerprint(data),
            tag_suffix(tags),
            extension(format)
        ))
    }

    /// 保存字节内容，同名文件已存在时直接返回
    pub async fn save_bytes(&self, data: &[u8], tags: &[String]) -> Result<Stored> {
        let name = self.file_name(data, tags)?;

        create_dir(&self.dir).await?;

        let path = self.dir.join(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), "image already present");
            return Ok(Stored {
                path,
                already_present: true,
            });
        }

        write_private(&path, data).await?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "image saved");
        Ok(Stored {
            path,
            already_present: false,
        })
    }
}

/// SHA-256 的前 7 位十六进制
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// 把标签拼成文件名后缀 `__a_b_c`
///
/// 每个标签只保留 ASCII 字母数字和西里尔字母并转小写；
/// 清洗后为空或超过 20 个字符的丢弃；去重保持首次出现的顺序。
pub fn tag_suffix(tags: &[String]) -> String {
    let mut seen = HashSet::new();
    let valid: Vec<String> = tags
        .iter()
        .map(|t| clean_tag(t))
        .filter(|t| !t.is_empty() && t.chars().count() <= MAX_TAG_LEN)
        .filter(|t| seen.insert(t.clone()))
        .collect();

    if valid.is_empty() {
        String::new()
    } else {
        format!("__{}", valid.join("_"))
    }
}

fn clean_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_ascii_alphanumeric() || is_cyrillic_letter(*c))
        .collect::<String>()
        .to_lowercase()
}

fn is_cyrillic_letter(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c) && c.is_alphabetic()
}

fn extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        other => other.extensions_str().first().copied().unwrap_or("img"),
    }
}

async fn create_dir(dir: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(dir).await.map_err(|e| Error::io(dir, e))
}

async fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(|e| Error::io(path, e))?;
    file.write_all(data).await.map_err(|e| Error::io(path, e))?;
    file.flush().await.map_err(|e| Error::io(path, e))
}
