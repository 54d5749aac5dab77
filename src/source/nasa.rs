// nasa.rs — NASA 图片库图片源
//
// 搜索结果带标题、描述、关键词等元数据，先做内容过滤，再随机打乱后逐个尝试：
// 解析资源列表 → 下载 → 读取尺寸 → 宽高比检查，第一个合格的即返回。

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;

use super::filter::{self, Candidate};
use super::http;
use super::{Image, ImageBody, ImageSource};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::output::Resolution;

const BASE_URL: &str = "https://images-api.nasa.gov";

/// 每次搜索最多尝试的候选数
pub const MAX_ATTEMPTS: usize = 10;

#[derive(Deserialize, Debug)]
struct SearchResponse {
    collection: Collection,
}

#[derive(Deserialize, Debug)]
struct Collection {
    #[serde(default)]
    items: Vec<Item>,
}

/// 单条搜索结果，`href` 指向该条目的资源列表（JSON 字符串数组）
#[derive(Deserialize, Debug)]
struct Item {
    href: String,
    #[serde(default)]
    data: Vec<ItemData>,
}

#[derive(Deserialize, Debug, Default)]
struct ItemData {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

impl From<Item> for Candidate {
    fn from(item: Item) -> Self {
        let data = item.data.into_iter().next().unwrap_or_default();
        Candidate {
            href: item.href,
            title: data.title,
            description: data.description,
            keywords: data.keywords,
        }
    }
}

/// NASA Image and Video Library 客户端
pub struct NasaClient {
    client: reqwest::Client,
    base_url: String,
}

impl NasaClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn candidates(&self, cancel: &CancelToken, query: &str) -> Result<Vec<Candidate>> {
        let url = format!("{}/search", self.base_url);
        let req = self
            .client
            .get(url)
            .query(&[("q", query), ("media_type", "image")]);
        let res: SearchResponse = http::get_json(cancel, req).await?;
        Ok(res.collection.items.into_iter().map(Candidate::from).collect())
    }

    /// 把候选的资源列表解析成一个可下载的图片地址
    async fn resolve_asset(&self, cancel: &CancelToken, candidate: &Candidate) -> Result<String> {
        let assets: Vec<String> = http::get_json(cancel, self.client.get(&candidate.href)).await?;
        pick_asset(&assets).ok_or_else(|| Error::NoAssets(candidate.href.clone()))
    }

    /// 下载单个候选并做宽高比检查
    async fn try_candidate(
        &self,
        cancel: &CancelToken,
        candidate: &Candidate,
        target: Option<Resolution>,
    ) -> Result<Image> {
        let url = self.resolve_asset(cancel, candidate).await?;
        tracing::trace!(%url, "selected nasa image url");

        let resp = http::send(cancel, self.client.get(&url)).await?;
        let image = Image::detect(ImageBody::Remote(resp), cancel).await?;
        // 不合格时 image 在这里被丢弃，连接随之关闭
        filter::check_aspect(image.size(), target)?;
        Ok(image)
    }
}

/// 优先原图，其次大图，最后取第一个
fn pick_asset(assets: &[String]) -> Option<String> {
    assets
        .iter()
        .find(|a| a.contains("~orig.jpg"))
        .or_else(|| assets.iter().find(|a| a.contains("~large.jpg")))
        .or_else(|| assets.first())
        .cloned()
}

#[async_trait]
impl ImageSource for NasaClient {
    async fn search(
        &self,
        cancel: &CancelToken,
        query: &str,
        resolution: Option<Resolution>,
    ) -> Result<Image> {
        tracing::trace!(query, "requesting nasa search");
        let candidates = self.candidates(cancel, query).await?;
        if candidates.is_empty() {
            return Err(Error::NoResults(query.to_string()));
        }

        let (mut candidates, bypassed) = filter::filter_candidates(candidates);
        if bypassed {
            tracing::warn!(
                query,
                count = candidates.len(),
                "content filter rejected every candidate, using unfiltered results"
            );
        }

        {
            let mut rng = rand::thread_rng();
            candidates.shuffle(&mut rng);
        }

        let mut attempts = 0;
        for candidate in candidates.iter().take(MAX_ATTEMPTS) {
            attempts += 1;
            match self.try_candidate(cancel, candidate, resolution).await {
                Ok(image) => {
                    tracing::debug!(
                        attempt = attempts,
                        size = %image.size(),
                        title = candidate.title.as_deref().unwrap_or_default(),
                        "accepted nasa image"
                    );
                    return Ok(image);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt = attempts, href = %candidate.href, error = %e, "candidate rejected");
                }
            }
        }

        Err(Error::NoSuitableImage(attempts))
    }
}
