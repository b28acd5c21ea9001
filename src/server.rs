// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接处理
//!
//! 监听循环为每个连接启动一个任务，每个连接只处理一个请求：
//! 分帧 → 解析 → 路由 → 写响应 → 关闭。
//!
//! 分帧阶段的拒绝（请求头过大、声明长度超限等）会先发送错误响应，
//! 再关闭写端并在有限的时间和字节数内继续读取，避免未读数据导致连接被重置。
//! 传输层失败只记日志，不发送任何响应。

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    time,
};

use crate::{
    compressor::Compressor,
    config::Config,
    exception::Exception,
    framer::{read_request, FrameError, FrameLimits},
    logging::ConnectionContext,
    request::Request,
    response::Response,
    router::{dispatch, Reply},
    storage::StorageWriter,
};

/// 拒绝请求后最多再读取的字节数
const LINGER_LIMIT: usize = 1024 * 1024;
/// 拒绝请求后最多等待的时间
const LINGER_TIMEOUT: Duration = Duration::from_secs(2);

/// 所有连接共享的只读状态
pub struct AppState {
    config: Config,
    limits: FrameLimits,
    storage: StorageWriter,
    compressor: Compressor,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let limits = FrameLimits::from_config(&config);
        let storage = StorageWriter::new(config.save_root(), config.serve_root());
        let compressor = Compressor::from_config(&config);
        Self {
            config,
            limits,
            storage,
            compressor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn limits(&self) -> &FrameLimits {
        &self.limits
    }

    pub fn storage(&self) -> &StorageWriter {
        &self.storage
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }
}

/// 主循环：接受连接直到 `shutdown` 完成。单个连接的失败不会结束循环。
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let active_connection = Arc::new(AtomicU32::new(0));
    let mut id: u128 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("收到停机信号，停止接受新连接");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("接受连接失败：{}", e);
                        continue;
                    }
                };
                let ctx = ConnectionContext::new(id, peer);
                id += 1;
                debug!("{} | TCP连接已建立", ctx);

                let state = Arc::clone(&state);
                let active_connection = Arc::clone(&active_connection);
                active_connection.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    handle_connection(stream, &state, ctx).await;
                    active_connection.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }
    }

    let remaining = active_connection.load(Ordering::SeqCst);
    if remaining > 0 {
        info!("退出时仍有{}个连接未处理完", remaining);
    }
}

/// 处理单个连接上的唯一一个请求，结束后关闭连接。
pub async fn handle_connection<S>(mut stream: S, state: &AppState, ctx: ConnectionContext)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let start_time = Instant::now();
    let timeout = state.config().read_timeout();

    let frame = match read_request(&mut stream, state.limits()).await {
        Ok(frame) => frame,
        Err(FrameError::Reject(e)) => {
            warn!("{} | - | {} | {}", ctx, e.status_code(), e.message());
            let response = Response::from_exception(e);
            if send(&mut stream, &response.as_bytes(), timeout).await.is_ok() {
                linger_close(&mut stream).await;
            }
            return;
        }
        Err(FrameError::Abort(e)) => {
            debug!("{} | 连接中止，不发送响应：{}", ctx, e);
            return;
        }
    };

    let request = match Request::try_from(&frame.head, ctx.id) {
        Ok(request) => request,
        Err(e) => {
            warn!("{} | - | {} | {}", ctx, e.status_code(), e.message());
            let response = Response::from_exception(e);
            if let Err(e) = send(&mut stream, &response.as_bytes(), timeout).await {
                debug!("{} | 发送错误响应失败：{}", ctx, e);
            }
            if let Err(e) = stream.shutdown().await {
                debug!("{} | 关闭连接失败：{}", ctx, e);
            }
            return;
        }
    };

    debug!(
        "{} | {} {} {} | User-Agent: {}",
        ctx,
        request.method(),
        request.target(),
        request.version(),
        request.user_agent()
    );

    let outcome = match dispatch(&request, frame.body, state, &ctx).await {
        Ok(reply) => write_reply(&mut stream, reply, state.config().chunk_size(), timeout).await,
        Err(e) => {
            let response = Response::from_exception(e);
            send(&mut stream, &response.as_bytes(), timeout)
                .await
                .map(|_| (e.status_code(), e.message().to_string()))
        }
    };

    match outcome {
        Ok((status, message)) if status < 400 => info!(
            "{} | {} {} | {} | {} ({}ms)",
            ctx,
            request.method(),
            request.target(),
            status,
            message,
            start_time.elapsed().as_millis()
        ),
        Ok((status, message)) => warn!(
            "{} | {} {} | {} | {}",
            ctx,
            request.method(),
            request.target(),
            status,
            message
        ),
        Err(e) => warn!(
            "{} | {} {} | 发送响应失败：{}",
            ctx,
            request.method(),
            request.target(),
            e
        ),
    }

    let _ = stream.shutdown().await;
}

/// 写出路由结果，返回实际发送的状态码和一条日志说明。
async fn write_reply<S>(
    stream: &mut S,
    reply: Reply,
    chunk_size: usize,
    timeout: Duration,
) -> io::Result<(u16, String)>
where
    S: AsyncWrite + Unpin,
{
    match reply {
        Reply::Preflight => {
            send(stream, &Response::preflight().as_bytes(), timeout).await?;
            Ok((204, "CORS预检".to_string()))
        }
        Reply::NotModified(descriptor) => {
            send(stream, &Response::not_modified(&descriptor).as_bytes(), timeout).await?;
            Ok((304, format!("未修改 {}", descriptor.etag())))
        }
        Reply::Json(body) => {
            let message = body.clone();
            send(stream, &Response::json(body).as_bytes(), timeout).await?;
            Ok((200, message))
        }
        Reply::File {
            path,
            descriptor,
            content_type,
            head_only,
        } => {
            let response = Response::from_descriptor(&descriptor, content_type);
            if head_only {
                send(stream, response.head().as_bytes(), timeout).await?;
                return Ok((200, format!("{}字节（仅头部）", descriptor.size())));
            }

            // 先打开文件，失败时还能回 500
            let file = match File::open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    error!("无法打开{}：{}", path.display(), e);
                    let failure = Exception::InternalError;
                    send(stream, &Response::from_exception(failure).as_bytes(), timeout).await?;
                    return Ok((failure.status_code(), failure.message().to_string()));
                }
            };
            send(stream, response.head().as_bytes(), timeout).await?;
            let sent = stream_file(stream, file, descriptor.size(), chunk_size, timeout).await?;
            Ok((200, format!("已发送{}字节", sent)))
        }
    }
}

/// 按块发送文件，最多 `size` 字节（与已发送的 Content-Length 一致）。
async fn stream_file<S>(
    stream: &mut S,
    file: File,
    size: u64,
    chunk_size: usize,
    timeout: Duration,
) -> io::Result<u64>
where
    S: AsyncWrite + Unpin,
{
    let mut reader = file.take(size);
    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        send(stream, &buffer[..n], timeout).await?;
        total += n as u64;
    }
    if total < size {
        warn!("文件在发送过程中变短：期望{}字节，实际{}字节", size, total);
    }
    Ok(total)
}

async fn send<S>(stream: &mut S, bytes: &[u8], timeout: Duration) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    match time::timeout(timeout, stream.write_all(bytes)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "send timed out")),
    }
}

/// 关闭写端后丢弃对端剩余的数据，直到对端关闭、超时或读满上限。
async fn linger_close<S>(stream: &mut S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if stream.shutdown().await.is_err() {
        return;
    }
    let drain = async {
        let mut buffer = [0u8; 8192];
        let mut drained = 0;
        while drained < LINGER_LIMIT {
            match stream.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => drained += n,
            }
        }
    };
    let _ = time::timeout(LINGER_TIMEOUT, drain).await;
}

/// 监听地址：`local` 为真时只监听回环地址。
pub fn bind_address(config: &Config) -> SocketAddr {
    let ip = if config.local() {
        [127, 0, 0, 1]
    } else {
        [0, 0, 0, 0]
    };
    SocketAddr::from((ip, config.port()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::io::duplex;

    fn state(dir: &Path, extra: &str) -> AppState {
        let config = Config::from_toml_str(&format!(
            "serve_root = \"{root}\"\nsave_root = \"{root}\"\nroute_mode = \"single\"\nenable_compressor = false\n{extra}",
            root = dir.display(),
            extra = extra,
        ))
        .unwrap();
        AppState::new(config)
    }

    fn ctx() -> ConnectionContext {
        ConnectionContext::new(1, "127.0.0.1:50000".parse().unwrap())
    }

    /// 写入原始请求，读回完整响应
    async fn exchange(state: &AppState, raw: &[u8]) -> Vec<u8> {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(raw).await.unwrap();
        client.shutdown().await.unwrap();
        handle_connection(server, state, ctx()).await;
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_get_streams_file() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(dir.path().join("blob.bin"), &content).unwrap();
        let s = state(dir.path(), "chunk_size = 1000");

        let out = exchange(&s, b"GET /?name=blob.bin HTTP/1.1\r\n\r\n").await;
        let split = out.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        let head = String::from_utf8_lossy(&out[..split]);
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains("Content-Type: application/octet-stream"));
        assert!(head.contains("Content-Length: 20000"));
        assert_eq!(&out[split + 4..], &content[..]);
    }

    #[tokio::test]
    async fn test_head_sends_no_body() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let s = state(dir.path(), "");
        let out = exchange(&s, b"HEAD /?name=a.txt HTTP/1.0\r\n\r\n").await;
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_malformed_request_line() {
        let dir = TempDir::new().unwrap();
        let s = state(dir.path(), "");
        let out = exchange(&s, b"GARBAGE\r\n\r\n").await;
        assert!(String::from_utf8_lossy(&out).starts_with("HTTP/1.1 400 Bad Request"));
    }

    /// 对端在错误响应发出前就消失，发送失败只记日志，处理器正常返回
    #[tokio::test]
    async fn test_malformed_request_from_vanished_peer() {
        let dir = TempDir::new().unwrap();
        let s = state(dir.path(), "");
        let (mut client, server) = duplex(1024);
        client.write_all(b"GARBAGE\r\n\r\n").await.unwrap();
        drop(client);
        tokio::time::timeout(
            Duration::from_secs(5),
            handle_connection(server, &s, ctx()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_frame_gets_response() {
        let dir = TempDir::new().unwrap();
        let s = state(dir.path(), "max_request_size = 10");
        let out = exchange(
            &s,
            b"POST /?name=a.txt HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world",
        )
        .await;
        assert!(String::from_utf8_lossy(&out).starts_with("HTTP/1.1 413 Payload Too Large"));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_aborted_request_gets_nothing() {
        let dir = TempDir::new().unwrap();
        let s = state(dir.path(), "");
        let (mut client, server) = duplex(1024);
        client
            .write_all(b"POST /?name=a.txt HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .unwrap();
        client.shutdown().await.unwrap();
        handle_connection(server, &s, ctx()).await;
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_bind_address() {
        let local = Config::from_toml_str("local = true\nport = 9001").unwrap();
        assert_eq!(bind_address(&local).to_string(), "127.0.0.1:9001");
        let public = Config::from_toml_str("port = 9002").unwrap();
        assert_eq!(bind_address(&public).to_string(), "0.0.0.0:9002");
    }
}
