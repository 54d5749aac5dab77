// local.rs — 本地目录图片源
// 文件名包含全部关键词（不区分大小写）即为候选，随机挑一个有效图片

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::io::AsyncReadExt;

use super::{Image, ImageBody, ImageSource};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::output::Resolution;

/// 直接认定为图片的扩展名
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

/// 本地图片目录
pub struct LocalDir {
    dir: PathBuf,
}

impl LocalDir {
    /// 目录不存在时返回错误
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "local image directory {} does not exist",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// 列出文件名匹配全部关键词的文件
    async fn matching_files(&self, query: &str) -> Result<Vec<PathBuf>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, e))?;

        let mut matched = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&self.dir, e))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if terms.iter().all(|t| name.contains(t.as_str())) {
                matched.push(entry.path());
            }
        }
        Ok(matched)
    }

    async fn open(&self, path: &Path, cancel: &CancelToken) -> Result<Image> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        Image::detect(ImageBody::Local(file), cancel).await
    }
}

/// 先看扩展名，不在白名单里再嗅探文件头
async fn looks_like_image(path: &Path) -> bool {
    let by_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);
    if by_ext {
        return true;
    }

    let mut head = [0u8; 64];
    let n = match tokio::fs::File::open(path).await {
        Ok(mut f) => f.read(&mut head).await.unwrap_or(0),
        Err(_) => return false,
    };
    image::guess_format(&head[..n]).is_ok()
}

#[async_trait]
impl ImageSource for LocalDir {
    async fn search(
        &self,
        cancel: &CancelToken,
        query: &str,
        _resolution: Option<Resolution>,
    ) -> Result<Image> {
        let mut candidates = self.matching_files(query).await?;
        if candidates.is_empty() {
            return Err(Error::NoResults(query.to_string()));
        }

        {
            let mut rng = rand::thread_rng();
            candidates.shuffle(&mut rng);
        }

        for path in &candidates {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if !looks_like_image(path).await {
                continue;
            }
            match self.open(path, cancel).await {
                Ok(image) => {
                    tracing::debug!(path = %path.display(), size = %image.size(), "picked local image");
                    return Ok(image);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read candidate");
                }
            }
        }

        Err(Error::NoValidImage)
    }
}
