// cancel.rs — 取消令牌
// 从信号处理一路传到 provider、重试循环和下载流

use std::future::Future;

use tokio::sync::watch;

use crate::error::{Error, Result};

/// 触发取消的一端，只由顶层（信号处理）持有
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// 可克隆的取消令牌，传给每个可能阻塞的调用
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        // send_replace 在没有接收者时也会更新值
        self.tx.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// 永远不会被取消的令牌
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待取消；发送端被丢弃且未取消时永远挂起
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// 运行 `fut`，取消时立即丢弃它并返回 [`Error::Cancelled`]
    ///
    /// 丢弃 reqwest 的 future 会中断正在进行的请求。
    pub async fn guard<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled),
            res = fut => res,
        }
    }
}
