// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 集成测试共用的服务器启动器和原始 TCP 客户端。

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filedrop::{serve, AppState, Config};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// 单个请求的硬超时，防止服务器挂起时测试永久阻塞
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestServer {
    pub addr: SocketAddr,
    dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// 以 `options` 启动服务器（TOML 片段，不含目录字段），监听 127.0.0.1 的随机端口。
    ///
    /// `shared` 为真时 serve 与 save 是同一个目录。
    pub async fn start(options: &str, shared: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let serve_root = dir.path().join("serve");
        let save_root = if shared {
            serve_root.clone()
        } else {
            dir.path().join("save")
        };
        std::fs::create_dir_all(&serve_root).unwrap();
        std::fs::create_dir_all(&save_root).unwrap();

        let config = Config::from_toml_str(&format!(
            "serve_root = \"{}\"\nsave_root = \"{}\"\n{}",
            serve_root.display(),
            save_root.display(),
            options
        ))
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let state = Arc::new(AppState::new(config));
        let handle = tokio::spawn(serve(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            dir,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn serve_root(&self) -> PathBuf {
        self.dir.path().join("serve")
    }

    pub fn save_root(&self) -> PathBuf {
        let save = self.dir.path().join("save");
        if save.exists() {
            save
        } else {
            self.serve_root()
        }
    }

    /// 发送原始请求并读取完整响应（服务器每次都会关闭连接）
    pub async fn exchange(&self, raw: &[u8]) -> RawResponse {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        tokio::time::timeout(EXCHANGE_TIMEOUT, stream.read_to_end(&mut out))
            .await
            .expect("服务器没有在限定时间内关闭连接")
            .unwrap();
        RawResponse::parse(out)
    }

    pub async fn request(&self, raw: &str) -> RawResponse {
        self.exchange(raw.as_bytes()).await
    }

    /// 发出停机信号并等待主循环退出
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(EXCHANGE_TIMEOUT, handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}

/// 解析后的响应。`raw` 为空表示服务器没有发送任何数据就关闭了连接。
pub struct RawResponse {
    pub raw: Vec<u8>,
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn parse(raw: Vec<u8>) -> Self {
        let split = raw.windows(4).position(|w| w == b"\r\n\r\n");
        let (head, body) = match split {
            Some(pos) => (
                String::from_utf8_lossy(&raw[..pos]).to_string(),
                raw[pos + 4..].to_vec(),
            ),
            None => (String::from_utf8_lossy(&raw).to_string(), Vec::new()),
        };
        let status = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        Self {
            raw,
            status,
            head,
            body,
        }
    }

    /// 按名称（不区分大小写）查找响应头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            if n.trim().eq_ignore_ascii_case(name) {
                Some(v.trim())
            } else {
                None
            }
        })
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
