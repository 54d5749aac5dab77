// 测试用的进程内 HTTP 服务器和图片生成工具
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// 路由的响应方式
#[derive(Clone)]
pub enum Reply {
    Json(String),
    Bytes(Vec<u8>),
    /// 发完响应头和 `head` 后不再发送，连接保持打开
    Stall { head: Vec<u8>, declared_len: usize },
    Status(u16),
}

pub struct TestServer {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, Reply>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, Reply>>> = Arc::default();
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();

        let (r, q) = (routes.clone(), requests.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, r.clone(), q.clone()));
            }
        });

        Self {
            addr,
            routes,
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn route(&self, path: &str, reply: Reply) {
        self.routes.lock().unwrap().insert(path.to_string(), reply);
    }

    /// 路径为 `path` 的请求次数（不含查询串）
    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|head| request_path(head) == path)
            .count()
    }

    /// 所有收到的请求头，原样保留
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn request_target(head: &str) -> &str {
    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("")
}

fn request_path(head: &str) -> &str {
    let target = request_target(head);
    target.split('?').next().unwrap_or(target)
}

async fn serve(
    mut stream: TcpStream,
    routes: Arc<Mutex<HashMap<String, Reply>>>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&buf).to_string();
    let path = request_path(&head).to_string();
    requests.lock().unwrap().push(head);
    let reply = routes.lock().unwrap().get(&path).cloned();

    let (status, content_type, body, stall) = match reply {
        Some(Reply::Json(body)) => (200, "application/json", body.into_bytes(), None),
        Some(Reply::Bytes(body)) => (200, "application/octet-stream", body, None),
        Some(Reply::Stall { head, declared_len }) => {
            (200, "application/octet-stream", head, Some(declared_len))
        }
        Some(Reply::Status(code)) => (code, "text/plain", Vec::new(), None),
        None => (404, "text/plain", b"not found".to_vec(), None),
    };

    let len = stall.unwrap_or(body.len());
    let header = format!(
        "HTTP/1.1 {status} X\r\ncontent-type: {content_type}\r\ncontent-length: {len}\r\nconnection: close\r\n\r\n"
    );
    if stream.write_all(header.as_bytes()).await.is_err() {
        return;
    }
    if stream.write_all(&body).await.is_err() {
        return;
    }
    let _ = stream.flush().await;

    if stall.is_some() {
        // 保持连接直到客户端断开
        let _ = stream.read(&mut chunk).await;
    }
}

/// 不走系统代理的客户端
pub fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Jpeg)
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Png)
}

fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}
