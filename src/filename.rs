// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件名校验
//!
//! 在任何路径拼接之前执行。这里的白名单字符策略就是唯一的路径穿越防线，
//! 之后不会再做 canonicalize 或 chroot 检查。
//!
//! 允许多个 `.`（例如 `archive.tar.gz`），但不允许出现相邻的 `..`。

use crate::param::MAX_FILENAME_LEN;

/// 判断文件名是否可以安全地拼接到存储根目录下。
pub fn valid_filename(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return false;
    }

    if name.starts_with(['.', '/', '\\']) {
        return false;
    }

    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return false;
    }

    name.bytes()
        .all(|c| c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || c == b'-')
}
