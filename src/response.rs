use crate::{
    cache::{format_http_date, CacheDescriptor},
    exception::Exception,
    param::*,
    util::{reason_phrase, HtmlBuilder},
};

use bytes::Bytes;
use chrono::prelude::*;

/// 待发送的响应。
///
/// 每个响应都带 CORS 头和 `Connection: close`。需要流式发送文件时，
/// `content` 为空而 `content_length` 为文件大小，正文由调用方随后写出。
#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: Option<u64>,
    date: DateTime<Utc>,
    server_name: String,
    etag: Option<String>,
    last_modified: Option<String>,
    cache_control: Option<&'static str>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: Some(0),
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            etag: None,
            last_modified: None,
            cache_control: None,
            content: None,
        }
    }

    /// CORS 预检：204，没有 Content-Type 和 Content-Length。
    pub fn preflight() -> Self {
        let mut response = Self::new();
        response.set_code(204);
        response.content_length = None;
        response
    }

    pub fn from_exception(e: Exception) -> Self {
        let code = e.status_code();
        let html = HtmlBuilder::from_status_code(code, Some(e.message())).build();
        let mut response = Self::new();
        response.set_code(code);
        response.set_content("text/html", Bytes::from(html));
        response
    }

    pub fn not_modified(descriptor: &CacheDescriptor) -> Self {
        let mut response = Self::new();
        response.set_code(304);
        response.content_type = Some("text/plain".to_string());
        response.set_validators(descriptor);
        response
    }

    /// 200 + 文件元数据。正文不在这里，GET 由调用方流式写出。
    pub fn from_descriptor(descriptor: &CacheDescriptor, content_type: &str) -> Self {
        let mut response = Self::new();
        response.content_type = Some(content_type.to_string());
        response.content_length = Some(descriptor.size());
        response.set_validators(descriptor);
        response
    }

    pub fn json(body: String) -> Self {
        let mut response = Self::new();
        response.set_content("application/json", Bytes::from(body));
        response
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = reason_phrase(code).to_string();
        self
    }

    fn set_content(&mut self, content_type: &str, content: Bytes) -> &mut Self {
        self.content_type = Some(content_type.to_string());
        self.content_length = Some(content.len() as u64);
        self.content = Some(content);
        self
    }

    fn set_validators(&mut self, descriptor: &CacheDescriptor) -> &mut Self {
        self.etag = Some(descriptor.etag().to_string());
        self.last_modified = Some(descriptor.last_modified().to_string());
        self.cache_control = Some(CACHE_CONTROL);
        self
    }

    /// 状态行 + 全部响应头 + 空行。
    pub fn head(&self) -> String {
        let mut header = format!("HTTP/1.1 {} {}{}", self.status_code, self.information, CRLF);
        for (name, value) in CORS_HEADERS {
            push_header(&mut header, name, value);
        }
        if let Some(t) = &self.content_type {
            push_header(&mut header, "Content-Type", t);
        }
        if let Some(len) = self.content_length {
            push_header(&mut header, "Content-Length", &len.to_string());
        }
        if let Some(lm) = &self.last_modified {
            push_header(&mut header, "Last-Modified", lm);
        }
        if let Some(etag) = &self.etag {
            push_header(&mut header, "ETag", etag);
        }
        if let Some(cc) = self.cache_control {
            push_header(&mut header, "Cache-Control", cc);
        }
        push_header(&mut header, "Date", &format_http_date(&self.date));
        push_header(&mut header, "Server", &self.server_name);
        push_header(&mut header, "Connection", "close");
        header.push_str(CRLF);
        header
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let head = self.head();
        let content: &[u8] = match &self.content {
            Some(c) => c.as_ref(),
            None => &[],
        };
        [head.as_bytes(), content].concat()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

fn push_header(buf: &mut String, name: &str, value: &str) {
    buf.push_str(name);
    buf.push_str(": ");
    buf.push_str(value);
    buf.push_str(CRLF);
}
