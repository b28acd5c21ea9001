// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 查询参数解码
//!
//! 只做两件事：按字面量 `key=` 查找参数，以及 `%XX` / `+` 解码。
//! 不是完整的 `application/x-www-form-urlencoded` 解析器。

use crate::param::MAX_FILENAME_LEN;

/// 参数值（编码前）的长度上限，与文件名缓冲区一致。
pub const MAX_PARAM_LEN: usize = MAX_FILENAME_LEN + 1;

/// 对 URL 编码的字符串进行解码。
///
/// 非法的 `%` 序列（后面不足两位或不是十六进制）按原样保留。
/// 解码后的字节如果不是合法 UTF-8，会以替换字符输出，随后必然无法通过文件名校验。
pub fn url_decode(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(a), Some(b)) => {
                        out.push(a * 16 + b);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// 从查询字符串中取出 `key` 对应的值并解码。
///
/// 值截止于下一个空格、`&`、CR、LF 或字符串结尾。
/// 找不到、值为空、或编码后的值过长时返回 `None`。
pub fn get_query_param(query: &str, key: &str) -> Option<String> {
    let search = format!("{}=", key);
    let start = query.find(&search)? + search.len();
    let rest = &query[start..];
    let end = rest.find([' ', '&', '\r', '\n']).unwrap_or(rest.len());
    let encoded = &rest[..end];

    if encoded.is_empty() || encoded.len() >= MAX_PARAM_LEN {
        return None;
    }

    let value = url_decode(encoded);
    if value.is_empty() {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_url_decode_basic() {
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("a+b"), "a b");
        assert_eq!(url_decode("%41%62c"), "Abc");
        assert_eq!(url_decode("%2e%2E"), "..");
    }

    #[test]
    fn test_url_decode_malformed_percent() {
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%4"), "%4");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%%41"), "%A");
    }

    #[test]
    fn test_get_query_param() {
        assert_eq!(get_query_param("name=a.jpg", "name").as_deref(), Some("a.jpg"));
        assert_eq!(
            get_query_param("x=1&name=b.png&y=2", "name").as_deref(),
            Some("b.png")
        );
        assert_eq!(
            get_query_param("name=my%20file.txt", "name").as_deref(),
            Some("my file.txt")
        );
    }

    #[test]
    fn test_get_query_param_missing_or_empty() {
        assert_eq!(get_query_param("", "name"), None);
        assert_eq!(get_query_param("other=1", "name"), None);
        assert_eq!(get_query_param("name=", "name"), None);
        assert_eq!(get_query_param("name=&x=1", "name"), None);
    }

    #[test]
    fn test_get_query_param_too_long() {
        let q = format!("name={}", "a".repeat(MAX_PARAM_LEN));
        assert_eq!(get_query_param(&q, "name"), None);
        let q = format!("name={}", "a".repeat(MAX_PARAM_LEN - 1));
        assert!(get_query_param(&q, "name").is_some());
    }

    #[test]
    fn test_get_query_param_literal_substring() {
        // 字面量查找：`filename=` 中也包含 `name=`
        assert_eq!(get_query_param("filename=x.txt", "name").as_deref(), Some("x.txt"));
    }

    proptest! {
        #[test]
        fn prop_plain_values_roundtrip(value in "[A-Za-z0-9._-]{1,64}") {
            let q = format!("name={}&z=1", value);
            prop_assert_eq!(get_query_param(&q, "name"), Some(value));
        }

        #[test]
        fn prop_decode_never_panics(s in "\\PC{0,64}") {
            let _ = url_decode(&s);
        }
    }
}
