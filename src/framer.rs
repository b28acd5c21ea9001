// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求分帧
//!
//! 从字节流中切出一个完整请求：请求头（到 `\r\n\r\n` 为止）和
//! 恰好 `Content-Length` 字节的请求体。
//!
//! - 请求头缓冲区大小固定，不会扩容。缓冲区写满仍找不到分隔符即拒绝。
//! - 声明的长度超过上限时立即拒绝，不再读取请求体。
//! - 请求体缓冲区随数据到达逐块增长，不按声明的长度一次性分配。
//! - 每一次读取都受空闲超时约束，超时与读错误同样处理：放弃请求，不发送响应。

use std::io;
use std::str;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time;

use crate::{config::Config, exception::Exception, param::HEADER_TERMINATOR, request::Headers};

/// 读取请求体时每次最多接收的字节数
const BODY_CHUNK: usize = 64 * 1024;

/// 分帧的结果：请求头字节（不含分隔符）与请求体。
#[derive(Debug, Clone)]
pub struct Frame {
    pub head: Vec<u8>,
    pub body: Bytes,
}

#[derive(Debug)]
pub enum FrameError {
    /// 请求不合法，需要回一个错误响应
    Reject(Exception),
    /// 传输层失败（断开、超时、读错误），不发送任何响应
    Abort(io::Error),
}

impl From<Exception> for FrameError {
    fn from(e: Exception) -> Self {
        FrameError::Reject(e)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    pub header_buffer_size: usize,
    pub max_request_size: u64,
    pub read_timeout: Duration,
}

impl FrameLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            header_buffer_size: config.header_buffer_size(),
            max_request_size: config.max_request_size(),
            read_timeout: config.read_timeout(),
        }
    }
}

pub async fn read_request<S>(stream: &mut S, limits: &FrameLimits) -> Result<Frame, FrameError>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; limits.header_buffer_size];
    let mut received = 0;

    let header_end = loop {
        if received == buffer.len() {
            debug!("请求头超过{}字节仍未结束", buffer.len());
            return Err(FrameError::Reject(Exception::HeaderTooLarge));
        }
        let n = recv(stream, &mut buffer[received..], limits.read_timeout).await?;
        // 分隔符可能跨越两次读取
        let search_from = received.saturating_sub(HEADER_TERMINATOR.len() - 1);
        received += n;
        if let Some(pos) = find_terminator(&buffer[search_from..received]) {
            break search_from + pos;
        }
    };

    let head_text =
        str::from_utf8(&buffer[..header_end]).map_err(|_| Exception::MalformedRequest)?;
    let content_length = Headers::parse(head_text).content_length()?.unwrap_or(0);
    if content_length > limits.max_request_size {
        debug!(
            "声明的Content-Length为{}，超过上限{}",
            content_length, limits.max_request_size
        );
        return Err(FrameError::Reject(Exception::PayloadTooLarge));
    }
    let content_length =
        usize::try_from(content_length).map_err(|_| Exception::PayloadTooLarge)?;

    // 与请求头一起读进来的字节就是请求体的开头，超出声明长度的部分丢弃
    let body_start = header_end + HEADER_TERMINATOR.len();
    let early = received - body_start;
    let mut body = BytesMut::with_capacity(content_length.min(BODY_CHUNK));
    body.extend_from_slice(&buffer[body_start..body_start + early.min(content_length)]);

    let mut chunk = vec![0u8; (content_length - body.len()).min(BODY_CHUNK)];
    while body.len() < content_length {
        let want = (content_length - body.len()).min(chunk.len());
        let n = recv(stream, &mut chunk[..want], limits.read_timeout).await?;
        body.extend_from_slice(&chunk[..n]);
    }

    buffer.truncate(header_end);
    Ok(Frame {
        head: buffer,
        body: body.freeze(),
    })
}

/// 读取一次。0 字节（对端关闭）、超时、非暂时性错误都转换为 `Abort`。
async fn recv<S>(stream: &mut S, buf: &mut [u8], timeout: Duration) -> Result<usize, FrameError>
where
    S: AsyncRead + Unpin,
{
    loop {
        match time::timeout(timeout, stream.read(buf)).await {
            Err(_) => {
                return Err(FrameError::Abort(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "receive timed out",
                )))
            }
            Ok(Ok(0)) => {
                return Err(FrameError::Abort(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed connection",
                )))
            }
            Ok(Ok(n)) => return Ok(n),
            Ok(Err(e))
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Ok(Err(e)) => return Err(FrameError::Abort(e)),
        }
    }
}

fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}
