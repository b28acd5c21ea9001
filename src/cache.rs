//! 缓存校验：根据文件元数据生成 ETag / Last-Modified，并判断条件请求。
//!
//! 每次 GET/HEAD 都从文件系统重新计算，不在请求之间缓存。

use std::fs::Metadata;
use std::io;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::request::Headers;

/// 条件请求命中的依据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    ETag,
    LastModified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// 304，不发送正文
    NotModified(Validator),
    /// 200，发送完整元数据（GET 再附上正文）
    Full,
}

/// 单个文件的缓存描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDescriptor {
    etag: String,
    last_modified: String,
    size: u64,
}

impl CacheDescriptor {
    pub fn new(modified: SystemTime, size: u64) -> Self {
        let modified: DateTime<Utc> = modified.into();
        Self {
            etag: generate_etag(modified.timestamp(), size),
            last_modified: format_http_date(&modified),
            size,
        }
    }

    pub fn from_metadata(metadata: &Metadata) -> io::Result<Self> {
        Ok(Self::new(metadata.modified()?, metadata.len()))
    }

    /// 先看 `If-None-Match`，再看 `If-Modified-Since`。
    ///
    /// 两者都是对头部值做字节级的子串包含判断，因此格式必须与
    /// `etag()` / `last_modified()` 完全一致才会命中。
    pub fn evaluate(&self, headers: &Headers) -> CacheDecision {
        if let Some(v) = headers.get("If-None-Match") {
            if v.contains(&self.etag) {
                return CacheDecision::NotModified(Validator::ETag);
            }
        }
        if let Some(v) = headers.get("If-Modified-Since") {
            if v.contains(&self.last_modified) {
                return CacheDecision::NotModified(Validator::LastModified);
            }
        }
        CacheDecision::Full
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// `"<mtime秒的十六进制>-<大小的十六进制>"`，带双引号。
fn generate_etag(mtime_secs: i64, size: u64) -> String {
    format!("\"{:x}-{:x}\"", mtime_secs as u64, size)
}

/// RFC 1123 格式，固定 GMT，例如 `Sun, 06 Nov 1994 08:49:37 GMT`。
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
