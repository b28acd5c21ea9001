// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了文件中转端点在处理单个请求时可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了报文解析错误、参数校验错误、文件系统错误。
//! - **语义映射**：每个变体都唯一对应一个 HTTP 状态码，上层直接据此生成错误响应。
//! - **终止性**：所有异常都只终止当前请求，不会影响监听循环。
//!
//! 注意：传输层故障（读写失败、超时、对端断开）不属于这里，见 `framer::FrameError`。

use std::fmt;

/// 请求处理过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求行无法拆分为 方法、路径、版本 三段，或请求头不是合法的 UTF-8。
    MalformedRequest,
    /// 协议版本既不是 `HTTP/1.0` 也不是 `HTTP/1.1`。
    UnsupportedVersion,
    /// 请求路径不是当前路由模式所接受的固定路径。
    InvalidPath,
    /// 查询字符串中缺少 `name` 参数，或参数值为空。
    MissingParameter,
    /// 文件名未通过安全校验（路径穿越、非法字符、超长等）。
    InvalidFilename,
    /// 在固定大小的读缓冲区内找不到 `\r\n\r\n`。
    HeaderTooLarge,
    /// 声明的 Content-Length 或上传体积超过上限。
    PayloadTooLarge,
    /// 请求的文件在 serve 目录下不存在。对应 `404 Not Found`。
    FileNotFound,
    /// 写入临时文件失败。
    WriteFailed,
    /// 临时文件重命名（发布）失败。
    SaveFailed,
    /// 不支持的请求方法。
    NotImplemented,
    /// 打开文件等内部操作失败。
    InternalError,
}

use Exception::*;

impl Exception {
    /// 该异常对应的 HTTP 状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            MalformedRequest | UnsupportedVersion | InvalidPath | MissingParameter
            | InvalidFilename | HeaderTooLarge => 400,
            FileNotFound => 404,
            PayloadTooLarge => 413,
            WriteFailed | SaveFailed | InternalError => 500,
            NotImplemented => 501,
        }
    }

    /// 写入错误页面正文的说明文字。
    pub fn message(&self) -> &'static str {
        match self {
            MalformedRequest => "Malformed request",
            UnsupportedVersion => "Invalid HTTP version",
            InvalidPath => "Invalid path",
            MissingParameter => "Missing 'name' parameter",
            InvalidFilename => "Invalid filename",
            HeaderTooLarge => "Headers too large or malformed",
            PayloadTooLarge => "Payload Too Large",
            FileNotFound => "File not found",
            WriteFailed => "Write failed",
            SaveFailed => "Failed to save file",
            NotImplemented => "Method not implemented",
            InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_maps_to_one_status() {
        let cases = [
            (MalformedRequest, 400),
            (UnsupportedVersion, 400),
            (InvalidPath, 400),
            (MissingParameter, 400),
            (InvalidFilename, 400),
            (HeaderTooLarge, 400),
            (PayloadTooLarge, 413),
            (FileNotFound, 404),
            (WriteFailed, 500),
            (SaveFailed, 500),
            (NotImplemented, 501),
            (InternalError, 500),
        ];
        for (e, code) in cases {
            assert_eq!(e.status_code(), code, "{:?}", e);
        }
    }

    #[test]
    fn test_display_contains_status() {
        assert_eq!(FileNotFound.to_string(), "File not found (404)");
        assert_eq!(PayloadTooLarge.to_string(), "Payload Too Large (413)");
    }
}
