// source/http.rs — HTTP 请求封装
// 把 reqwest 的超时翻译成 ConnectionTimeout，把取消翻译成 Cancelled

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 创建共享的 HTTP 客户端（内部有连接池，应复用）
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::HttpClient)
}

/// 区分超时、取消和其他网络错误
///
/// 如果超时发生时外层已经取消，按取消处理，方便调用方静默退出。
pub(crate) fn classify(err: reqwest::Error, url: &str, cancel: &CancelToken) -> Error {
    if cancel.is_cancelled() {
        Error::Cancelled
    } else if err.is_timeout() {
        Error::ConnectionTimeout {
            url: url.to_string(),
        }
    } else {
        Error::Http {
            url: url.to_string(),
            source: err,
        }
    }
}

/// 发送请求，要求 2xx 状态码
pub(crate) async fn send(
    cancel: &CancelToken,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let (client, request) = request.build_split();
    let request = request.map_err(|e| Error::Http {
        url: e.url().map(|u| u.to_string()).unwrap_or_default(),
        source: e,
    })?;
    let url = request.url().to_string();

    tracing::trace!(%url, "sending request");
    let resp = cancel
        .guard(async {
            client
                .execute(request)
                .await
                .map_err(|e| classify(e, &url, cancel))
        })
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Status { url, status });
    }
    Ok(resp)
}

/// 发送请求并把响应体解析为 JSON
pub(crate) async fn get_json<T: DeserializeOwned>(
    cancel: &CancelToken,
    request: reqwest::RequestBuilder,
) -> Result<T> {
    let resp = send(cancel, request).await?;
    let url = resp.url().to_string();
    cancel
        .guard(async { resp.json::<T>().await.map_err(|e| classify(e, &url, cancel)) })
        .await
}
