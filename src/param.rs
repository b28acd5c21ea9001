// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 `filedrop` 遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 用到的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 按扩展名推断的 MIME 类型映射表。
//! - CORS 与缓存相关的固定响应头。
//! - HTTP 方法与版本的强类型枚举。

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "filedrop";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 请求头与请求体之间的分隔符
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 文件名的最大长度（字节）
pub const MAX_FILENAME_LEN: usize = 255;

/// 可缓存内容统一使用的 `Cache-Control`
pub const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// 每个响应都携带的 CORS 头。顺序即为写出顺序。
pub const CORS_HEADERS: [(&str, &str); 6] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, HEAD, OPTIONS"),
    (
        "Access-Control-Allow-Headers",
        "Content-Type, Content-Length, If-None-Match, If-Modified-Since, Authorization",
    ),
    ("Access-Control-Expose-Headers", "Content-Length, Content-Type"),
    ("Access-Control-Max-Age", "86400"),
    ("Vary", "Origin"),
];

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 只收录本服务器实际会发出的状态码。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(204, "No Content");
        map.insert(304, "Not Modified");
        map.insert(400, "Bad Request");
        map.insert(404, "Not Found");
        map.insert(413, "Payload Too Large");
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map
    };
}

lazy_static! {
    /// 文件后缀名（小写）到 MIME 类型的映射表。
    ///
    /// 用于设置下载响应的 `Content-Type`，未收录的后缀一律按二进制流处理。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("txt", "text/plain");
        map.insert("html", "text/html");
        map.insert("css", "text/css");
        map.insert("js", "application/javascript");
        map.insert("json", "application/json");
        map.insert("xml", "application/xml");
        map.insert("pdf", "application/pdf");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("png", "image/png");
        map.insert("gif", "image/gif");
        map.insert("svg", "image/svg+xml");
        map.insert("webp", "image/webp");
        map.insert("zip", "application/zip");
        map
    };
}

lazy_static! {
    /// 上传时 `Content-Type` 到存储扩展名的映射表。
    pub static ref UPLOAD_EXTENSIONS: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("image/jpeg", ".jpg");
        map.insert("image/jpg", ".jpg");
        map.insert("image/png", ".png");
        map.insert("image/webp", ".webp");
        map.insert("image/gif", ".gif");
        map.insert("application/pdf", ".pdf");
        map.insert("application/zip", ".zip");
        map
    };
}

/// 兜底的二进制 MIME 类型
pub const OCTET_STREAM: &str = "application/octet-stream";

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    V1_0,
    V1_1,
}

/// HTTP 请求方法
///
/// 不认识的方法不会在解析阶段被拒绝，而是交给路由返回 501。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// CORS 预检
    Options,
    /// 上传文件
    Post,
    /// 其他任意方法
    Other(String),
}

impl HttpRequestMethod {
    /// 方法名区分大小写，`get` 不等于 `GET`。
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            other => HttpRequestMethod::Other(other.to_string()),
        }
    }
}

impl HttpVersion {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "HTTP/1.0" => Some(HttpVersion::V1_0),
            "HTTP/1.1" => Some(HttpVersion::V1_1),
            _ => None,
        }
    }
}

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
            HttpRequestMethod::Other(m) => write!(f, "{}", m),
        }
    }
}

/// 按文件名的最后一个后缀推断 `Content-Type`（后缀不区分大小写）。
pub fn get_content_type(filename: &str) -> &'static str {
    let ext = match filename.rfind('.') {
        Some(pos) => &filename[pos + 1..],
        None => return OCTET_STREAM,
    };
    match MIME_TYPES.get(ext.to_ascii_lowercase().as_str()) {
        Some(v) => v,
        None => OCTET_STREAM,
    }
}
