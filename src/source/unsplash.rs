// unsplash.rs — Unsplash 图片源
// 调用随机图片接口，过滤掉付费图，下载全尺寸图片
//
// 提供 Access Key 时走官方 API（Authorization: Client-ID <key>），
// 否则走网页版使用的公开接口。

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize; // 反序列化 trait，用于将 JSON 转为 Rust 结构体

use super::http;
use super::{Image, ImageBody, ImageSource};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::output::Resolution;

const API_URL: &str = "https://api.unsplash.com";
const WEB_URL: &str = "https://unsplash.com/napi";

/// 公开接口需要浏览器 UA，否则会被拒绝
const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Mobile Safari/537.36";

/// 每次请求返回的随机图片数量
const PER_REQUEST: &str = "10";

/// 全是付费图时最多重新请求的次数
const PREMIUM_RETRIES: usize = 5;

/// 单张图片的数据结构
#[derive(Deserialize, Debug)]
pub struct Photo {
    /// 图片唯一标识符（如 "LBI7cgq3pbM"）
    pub id: String,

    pub width: u32,
    pub height: u32,

    /// 各尺寸图片 URL 集合
    pub urls: PhotoUrls,

    /// 付费图（带水印）
    #[serde(default)]
    pub premium: bool,

    /// Unsplash+ 图片
    #[serde(default)]
    pub plus: bool,
}

/// 图片 URL 集合
#[derive(Deserialize, Debug)]
pub struct PhotoUrls {
    /// 最高质量图片（带 q=80&fm=jpg 等 Imgix 参数）
    pub full: String,
}

/// Unsplash 异步客户端
pub struct UnsplashClient {
    /// HTTP 客户端（内部有连接池，应复用）
    client: reqwest::Client,

    /// API 基础 URL
    base_url: String,

    /// 可选的 Access Key
    access_key: Option<String>,
}

impl UnsplashClient {
    /// 创建客户端，有 Access Key 时使用官方 API
    pub fn new(client: reqwest::Client, access_key: Option<String>) -> Self {
        let base_url = if access_key.is_some() { API_URL } else { WEB_URL };
        Self::with_base_url(client, access_key, base_url)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        access_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            access_key,
        }
    }

    fn random_request(&self, query: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/photos/random", self.base_url);
        let mut req = self.client.get(url).query(&[
            ("query", query),
            ("count", PER_REQUEST),
            ("orientation", "landscape"), // 壁纸场景优先横向
        ]);

        match &self.access_key {
            // Unsplash 使用 "Client-ID <key>" 格式，而非 Bearer token
            Some(key) => req = req.header("Authorization", format!("Client-ID {key}")),
            None => {
                req = req
                    .header("User-Agent", USER_AGENT)
                    .header("Referer", format!("https://unsplash.com/s/photos/{query}"));
            }
        }
        req
    }

    /// 取一张非付费的随机图片
    ///
    /// 一次响应全是付费图时重新请求，最多 [`PREMIUM_RETRIES`] 次。
    async fn pick_photo(&self, cancel: &CancelToken, query: &str) -> Result<Photo> {
        for attempt in 1..=PREMIUM_RETRIES {
            let photos: Vec<Photo> = http::get_json(cancel, self.random_request(query)).await?;
            if photos.is_empty() {
                return Err(Error::NoResults(query.to_string()));
            }

            let mut free: Vec<Photo> = photos
                .into_iter()
                .filter(|p| !p.premium && !p.plus)
                .collect();

            // ThreadRng 不是 Send，不能跨 await 持有
            let picked = {
                let mut rng = rand::thread_rng();
                free.shuffle(&mut rng);
                free.pop()
            };
            if let Some(photo) = picked {
                return Ok(photo);
            }
            tracing::trace!(attempt, "got only watermarked photos, trying again");
        }
        Err(Error::OnlyPremium(PREMIUM_RETRIES))
    }
}

#[async_trait]
impl ImageSource for UnsplashClient {
    async fn search(
        &self,
        cancel: &CancelToken,
        query: &str,
        resolution: Option<Resolution>,
    ) -> Result<Image> {
        tracing::debug!(query, "searching unsplash");
        let photo = self.pick_photo(cancel, query).await?;
        tracing::debug!(
            id = %photo.id,
            width = photo.width,
            height = photo.height,
            "selected unsplash photo"
        );

        // full URL 已带查询参数，.query() 会追加而不是覆盖
        let mut req = self.client.get(&photo.urls.full);
        if let Some(r) = resolution {
            req = req.query(&[("w", r.width()), ("h", r.height())]);
        }

        let resp = http::send(cancel, req).await?;
        Image::detect(ImageBody::Remote(resp), cancel).await
    }
}
