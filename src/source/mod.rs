// source/mod.rs — 图片源模块入口
// 定义所有图片源（Unsplash、NASA、本地目录）必须实现的通用 Trait

pub mod filter;
pub mod http;
pub mod local;
pub mod nasa;
pub mod unsplash;

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::output::Resolution;

pub use local::LocalDir;
pub use nasa::NasaClient;
pub use unsplash::UnsplashClient;

/// 读取图片头部时最多缓存的字节数
const HEADER_LIMIT: usize = 4 * 1024 * 1024;

/// 猜测格式至少需要的字节数
const MIN_PROBE: usize = 32;

const FILE_CHUNK: usize = 64 * 1024;

/// 图片字节流的来源
pub(crate) enum ImageBody {
    /// 尚未读完的 HTTP 响应体
    Remote(reqwest::Response),
    /// 本地文件
    Local(tokio::fs::File),
    /// 已经全部在内存里
    Done,
}

impl ImageBody {
    /// 读下一块数据追加到 `buf`，流结束时返回 `false`
    async fn read_chunk(&mut self, buf: &mut Vec<u8>, cancel: &CancelToken) -> Result<bool> {
        match self {
            ImageBody::Remote(resp) => {
                let url = resp.url().to_string();
                let chunk = cancel
                    .guard(async {
                        resp.chunk()
                            .await
                            .map_err(|e| http::classify(e, &url, cancel))
                    })
                    .await?;
                match chunk {
                    Some(bytes) => {
                        buf.extend_from_slice(&bytes);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            ImageBody::Local(file) => {
                let mut tmp = vec![0u8; FILE_CHUNK];
                let n = cancel
                    .guard(async {
                        file.read(&mut tmp)
                            .await
                            .map_err(|e| Error::io("<local image>", e))
                    })
                    .await?;
                buf.extend_from_slice(&tmp[..n]);
                Ok(n > 0)
            }
            ImageBody::Done => Ok(false),
        }
    }
}

/// 已确认尺寸、尚未完全读取的图片
///
/// 头部字节已被读出用于解析尺寸，[`Image::into_bytes`] 会先回放头部再读剩余部分。
/// 丢弃 `Image` 即关闭底层连接或文件。
pub struct Image {
    head: Vec<u8>,
    body: ImageBody,
    size: Resolution,
}

impl Image {
    /// 从完整的内存数据构造，常用于测试桩
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let size = header_size(&data, true)?.ok_or(Error::UnknownExtension)?;
        Ok(Self {
            head: data,
            body: ImageBody::Done,
            size,
        })
    }

    /// 从流中读取足够的头部来确定尺寸
    pub(crate) async fn detect(mut body: ImageBody, cancel: &CancelToken) -> Result<Self> {
        let mut head = Vec::new();
        loop {
            let more = body.read_chunk(&mut head, cancel).await?;
            let last = !more || head.len() >= HEADER_LIMIT;
            if let Some(size) = header_size(&head, last)? {
                tracing::trace!(%size, header = head.len(), "decoded image header");
                return Ok(Self { head, body, size });
            }
            if !more {
                // header_size 在 last 时不会返回 None，这里只是兜底
                return Err(Error::UnknownExtension);
            }
        }
    }

    /// 实际像素尺寸
    pub fn size(&self) -> Resolution {
        self.size
    }

    /// 读完剩余数据，返回完整内容
    pub async fn into_bytes(self, cancel: &CancelToken) -> Result<Vec<u8>> {
        let Image {
            head: mut data,
            mut body,
            ..
        } = self;
        while body.read_chunk(&mut data, cancel).await? {}
        Ok(data)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("size", &self.size)
            .field("buffered", &self.head.len())
            .finish()
    }
}

/// 尝试用已有字节解析图片尺寸
///
/// 数据还不够时返回 `Ok(None)`；`last` 为真表示不会再有更多数据。
fn header_size(head: &[u8], last: bool) -> Result<Option<Resolution>> {
    if head.len() < MIN_PROBE && !last {
        return Ok(None);
    }
    let format = image::guess_format(head)?;
    match image::ImageReader::with_format(Cursor::new(head), format).into_dimensions() {
        Ok((w, h)) => Resolution::new(w, h).map(Some),
        Err(_) if !last => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// 图片源的抽象 Trait
///
/// 所有实现共享同一个契约：给定关键词和期望分辨率，返回一张可用的图片或失败。
/// `resolution` 为 `None` 表示不限尺寸。取消令牌触发时必须尽快返回
/// [`Error::Cancelled`]。
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn search(
        &self,
        cancel: &CancelToken,
        query: &str,
        resolution: Option<Resolution>,
    ) -> Result<Image>;
}

/// 可选的图片源
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    Unsplash,
    Nasa,
    Local,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Unsplash, SourceKind::Nasa, SourceKind::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Unsplash => "unsplash",
            SourceKind::Nasa => "nasa",
            SourceKind::Local => "local",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SourceKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownSource(s.to_string()))
    }
}

/// 构造图片源所需的参数
#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    pub unsplash_access_key: Option<String>,
    pub local_dir: Option<std::path::PathBuf>,
    pub timeout: Option<Duration>,
}

/// 启动时选定的图片源
pub enum Source {
    Unsplash(UnsplashClient),
    Nasa(NasaClient),
    Local(LocalDir),
}

impl Source {
    /// 根据种类构造图片源，只在启动时调用一次
    pub fn build(kind: SourceKind, settings: &SourceSettings) -> Result<Self> {
        let client = || http::client(settings.timeout.unwrap_or(http::DEFAULT_TIMEOUT));
        let source = match kind {
            SourceKind::Unsplash => Source::Unsplash(UnsplashClient::new(
                client()?,
                settings.unsplash_access_key.clone(),
            )),
            SourceKind::Nasa => Source::Nasa(NasaClient::new(client()?)),
            SourceKind::Local => {
                let dir = settings
                    .local_dir
                    .clone()
                    .ok_or_else(|| Error::Config("source.local.dir is not set".into()))?;
                Source::Local(LocalDir::new(dir)?)
            }
        };
        tracing::debug!(source = %kind, "image source ready");
        Ok(source)
    }
}

#[async_trait]
impl ImageSource for Source {
    async fn search(
        &self,
        cancel: &CancelToken,
        query: &str,
        resolution: Option<Resolution>,
    ) -> Result<Image> {
        match self {
            Source::Unsplash(s) => s.search(cancel, query, resolution).await,
            Source::Nasa(s) => s.search(cancel, query, resolution).await,
            Source::Local(s) => s.search(cancel, query, resolution).await,
        }
    }
}
