// error.rs — 统一错误类型
// 取图流水线中所有可能的失败都归到这里，保留底层错误链（#[source]）

use std::path::PathBuf;

use crate::output::Resolution;

/// 库内统一的 Result 别名
pub type Result<T> = std::result::Result<T, Error>;

/// 流水线错误
///
/// 分为几类：
/// - 可重试：网络超时、单个候选图不合格
/// - 本轮终止：过滤 + 重试后仍无结果、无法识别的内容类型、写文件失败
/// - 取消：用户中断，调用方不应当作错误打印
/// - 配置：构造阶段就能发现的问题，不进入重试
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 操作被取消（Ctrl-C 等）
    #[error("operation cancelled")]
    Cancelled,

    /// HTTP 请求超时
    #[error("connection timeout: api: {url}")]
    ConnectionTimeout { url: String },

    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to build http client")]
    HttpClient(#[source] reqwest::Error),

    /// 搜索结果为空
    #[error("no images found for query: {0}")]
    NoResults(String),

    /// Unsplash 连续返回的都是付费图
    #[error("only premium photos returned after {0} attempts")]
    OnlyPremium(usize),

    #[error("no image assets found for item {0}")]
    NoAssets(String),

    /// 候选全部试完也没有合格的图
    #[error("no suitable image found after {0} attempts")]
    NoSuitableImage(usize),

    #[error("no valid images found among candidates")]
    NoValidImage,

    /// 宽高比不在可接受范围内
    #[error("aspect ratio {ratio:.3} of {actual} rejected")]
    AspectRatio { actual: Resolution, ratio: f64 },

    /// 图片比目标分辨率小
    #[error("image too small: {actual} < {required}")]
    TooSmall {
        actual: Resolution,
        required: Resolution,
    },

    /// 重试预算耗尽，附带最后一次的失败原因
    #[error("failed to find suitable image after {attempts} attempts")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        last: Box<Error>,
    },

    /// 无法从内容识别图片格式
    #[error("unknown extension")]
    UnknownExtension,

    #[error("failed to decode image header")]
    Decode(#[from] image::ImageError),

    #[error("io error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid resolution {0:?}, e.g. 1920x1080")]
    InvalidResolution(String),

    #[error("invalid interval {0:?}, e.g. 1h, 30m, 45s")]
    InvalidInterval(String),

    #[error("unknown source {0:?}, available: unsplash, nasa, local")]
    UnknownSource(String),

    #[error("unknown wallpaper tool {0:?}, available: swaybg, swww, wbg, system")]
    UnknownSetter(String),

    /// 壁纸工具不在 PATH 中
    #[error("{0}: utility not found in PATH")]
    UtilityNotFound(String),

    /// xrandr 中找不到指定输出
    #[error("monitor {0} not found")]
    MonitorNotFound(String),

    #[error("failed to detect current mode of {0}")]
    DetectCurrentMode(String),

    #[error("failed to run {tool}")]
    Setter {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed: {message}")]
    SetterFailed { tool: String, message: String },

    /// 短语来源没有可用内容（可恢复，回退到默认短语）
    #[error("browser history is empty")]
    HistoryEmpty,

    #[error("search phrase is empty and no phrase source provided")]
    EmptyPhrase,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// 是否为取消信号
    ///
    /// 调用方据此决定是安静退出还是打印错误。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn exhausted_retries_keep_cause_in_source_only() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(Error::NoResults("mountains".into())),
        };
        assert_eq!(err.to_string(), "failed to find suitable image after 3 attempts");
        let cause = err.source().map(|e| e.to_string());
        assert_eq!(cause.as_deref(), Some("no images found for query: mountains"));
    }
}
