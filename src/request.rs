// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求解析模块
//!
//! 负责把分帧器交来的请求头字节解析为强类型的 `Request`：
//! 1. 请求行（Request-Line）的解析（方法、目标、版本）。
//! 2. 请求头解析为有序的 名称→值 列表。
//!
//! 请求头查找不区分大小写，同名头以**第一次出现**的为准。

use std::str;

use log::{debug, error};

use crate::{exception::Exception, param::*};

/// 解析后的请求头，保留原始顺序。
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// 解析完整的请求头块（第一行是请求行，会被跳过）。
    ///
    /// 没有冒号的行直接忽略，名称与值两侧的空白会被去掉。
    pub fn parse(head: &str) -> Self {
        let entries = head
            .split(CRLF)
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();
        Self { entries }
    }

    /// 按名称查找（不区分大小写，第一个生效）。
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 解析 `Content-Length`。
    ///
    /// 头不存在时返回 `Ok(None)`；值不是十进制非负整数时视为畸形请求。
    pub fn content_length(&self) -> Result<Option<u64>, Exception> {
        match self.get("Content-Length") {
            None => Ok(None),
            Some(v) => v
                .parse::<u64>()
                .map(Some)
                .map_err(|_| Exception::MalformedRequest),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 表示一个 HTTP 请求的元数据。请求体由分帧器单独持有。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法
    method: HttpRequestMethod,
    /// 请求行中的原始目标（含查询字符串）
    target: String,
    /// 不含查询字符串的路径
    path: String,
    /// `?` 之后的部分
    query: Option<String>,
    /// HTTP 协议版本
    version: HttpVersion,
    headers: Headers,
}

impl Request {
    /// 从请求头字节（不含 `\r\n\r\n`）构建 `Request`。
    ///
    /// # 错误处理
    /// - 不是合法 UTF-8，或请求行不足三段：`MalformedRequest`
    /// - 版本不是 `HTTP/1.0` / `HTTP/1.1`：`UnsupportedVersion`
    ///
    /// 方法不在这里校验，未知方法交由路由返回 501。
    pub fn try_from(head: &[u8], id: u128) -> Result<Self, Exception> {
        let text = match str::from_utf8(head) {
            Ok(t) => t,
            Err(_) => {
                error!("[ID{}]请求头不是合法的UTF-8", id);
                return Err(Exception::MalformedRequest);
            }
        };

        let request_line = text.split(CRLF).next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v)) => (m, t, v),
            _ => {
                debug!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
                return Err(Exception::MalformedRequest);
            }
        };

        let version = match HttpVersion::parse(version) {
            Some(v) => v,
            None => {
                debug!("[ID{}]不支持的HTTP协议版本：{}", id, version);
                return Err(Exception::UnsupportedVersion);
            }
        };

        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };

        Ok(Self {
            method: HttpRequestMethod::parse(method),
            target: target.to_string(),
            path,
            query,
            version,
            headers: Headers::parse(text),
        })
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn method(&self) -> &HttpRequestMethod {
        &self.method
    }

    /// 请求行中的原始目标
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// 获取用户代理字符串，缺失时为空
    pub fn user_agent(&self) -> &str {
        self.headers.get("User-Agent").unwrap_or_default()
    }
}
