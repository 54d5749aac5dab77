// service.rs — 壁纸更新流程
// 短语 → 搜索（带重试与尺寸检查）→ 保存 → 设置壁纸

use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::output::{Monitor, Resolution};
use crate::phrase::PhraseSource;
use crate::setter::WallpaperSetter;
use crate::source::{Image, ImageSource};
use crate::store::{ContentStore, Stored};

/// 一次更新（tick）的参数
#[derive(Debug, Clone)]
pub struct UpdateParams {
    /// 搜索短语，为空时向短语来源要
    pub phrase: Option<String>,
    /// 短语来源没有内容时使用
    pub fallback_phrase: Option<String>,
    /// 目标分辨率；`None` 时使用显示器检测到的分辨率，两者都没有则不限
    pub resolution: Option<Resolution>,
    pub save_dir: PathBuf,
    pub file_prefix: String,
    /// 目标显示器，ID 为空表示全部输出
    pub output: Monitor,
    pub retry_count: usize,
    /// 是否把关键词写进文件名
    pub tag_files: bool,
}

/// 壁纸服务，持有图片源、短语来源和壁纸工具
pub struct WallpaperService {
    source: Box<dyn ImageSource>,
    phrases: Option<Box<dyn PhraseSource>>,
    setter: Box<dyn WallpaperSetter>,
}

impl WallpaperService {
    pub fn new(
        source: Box<dyn ImageSource>,
        phrases: Option<Box<dyn PhraseSource>>,
        setter: Box<dyn WallpaperSetter>,
    ) -> Self {
        Self {
            source,
            phrases,
            setter,
        }
    }

    /// 一次性运行结束后是否要等到中断再退出
    pub fn needs_wait(&self, follow: bool) -> bool {
        !follow && self.setter.holds_wallpaper()
    }

    /// 退出前的清理；`wait` 为真时先等到取消
    pub async fn shutdown(&self, cancel: &CancelToken, wait: bool) -> Result<()> {
        if wait {
            cancel.cancelled().await;
        }
        self.setter.close().await
    }

    /// 完整执行一次：取图、保存并设置壁纸
    pub async fn update(&self, cancel: &CancelToken, params: &UpdateParams) -> Result<Stored> {
        let stored = self.fetch(cancel, params).await?;

        tracing::debug!(path = %stored.path.display(), output = %params.output, "provide wallpaper");
        self.setter
            .change(cancel, &stored.path, &params.output.id)
            .await?;
        Ok(stored)
    }

    /// 取图并保存，不设置壁纸
    pub async fn fetch(&self, cancel: &CancelToken, params: &UpdateParams) -> Result<Stored> {
        let phrase = self.resolve_phrase(params)?;
        tracing::info!(phrase = %phrase, "searching");

        let target = params.resolution.or(params.output.resolution);
        let image = self
            .fetch_image_with_retry(cancel, &phrase, target, params.retry_count)
            .await?;

        let tags: Vec<String> = if params.tag_files {
            phrase.split_whitespace().map(str::to_string).collect()
        } else {
            Vec::new()
        };

        let store = ContentStore::new(&params.save_dir, params.file_prefix.as_str());
        let stored = store.save(image, &tags, cancel).await?;
        tracing::debug!(
            path = %stored.path.display(),
            already_present = stored.already_present,
            "image saved"
        );
        Ok(stored)
    }

    fn resolve_phrase(&self, params: &UpdateParams) -> Result<String> {
        if let Some(phrase) = params.phrase.as_deref().filter(|p| !p.trim().is_empty()) {
            return Ok(phrase.to_string());
        }

        let source = self.phrases.as_ref().ok_or(Error::EmptyPhrase)?;
        match source.last_search() {
            Ok(phrase) => {
                tracing::info!(phrase = %phrase, "using phrase from history");
                Ok(phrase)
            }
            Err(Error::HistoryEmpty) => {
                let fallback = params.fallback_phrase.clone().ok_or(Error::HistoryEmpty)?;
                tracing::warn!(phrase = %fallback, "history is empty, using fallback phrase");
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }

    /// 调用图片源直到拿到不小于目标分辨率的图片
    ///
    /// 每次失败都记录下来继续尝试；取消立即返回，不计入重试。
    pub async fn fetch_image_with_retry(
        &self,
        cancel: &CancelToken,
        phrase: &str,
        resolution: Option<Resolution>,
        retries: usize,
    ) -> Result<Image> {
        if retries == 0 {
            return Err(Error::Config("retry count must be at least 1".into()));
        }

        let mut last_err = None;
        for attempt in 1..=retries {
            let image = match self.source.search(cancel, phrase, resolution).await {
                Ok(image) => image,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "search attempt failed");
                    last_err = Some(e);
                    continue;
                }
            };

            if let Some(required) = resolution {
                let actual = image.size();
                if !actual.covers(&required) {
                    drop(image);
                    tracing::debug!(attempt, %actual, %required, "image too small");
                    last_err = Some(Error::TooSmall { actual, required });
                    continue;
                }
            }
            return Ok(image);
        }

        Err(Error::RetriesExhausted {
            attempts: retries,
            last: Box::new(last_err.unwrap_or(Error::NoResults(phrase.to_string()))),
        })
    }
}
