use crate::param::STATUS_CODES;

/// 错误页面构建器
///
/// 页面刻意保持单行、无样式，客户端大多是脚本而不是浏览器。
pub struct HtmlBuilder {
    heading: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let reason = reason_phrase(code);
        let heading = format!("{} {}", code, reason);
        let body = note.unwrap_or(reason).to_string();
        Self { heading, body }
    }

    pub fn build(&self) -> String {
        format!(
            "<html><body><h1>{}</h1><p>{}</p></body></html>",
            self.heading, self.body
        )
    }
}

/// 状态码对应的原因短语，未收录的统一为 `Error`。
pub fn reason_phrase(code: u16) -> &'static str {
    match STATUS_CODES.get(&code) {
        Some(d) => d,
        None => "Error",
    }
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size() {
        assert_eq!(format_file_size(9926), "9.7 KB");
        assert_eq!(format_file_size(51800), "50.6 KB");
    }

    #[test]
    fn test_file_size_units() {
        assert_eq!(format_file_size(0), "0.0 B");
        assert_eq!(format_file_size(1023), "1023.0 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
        assert_eq!(format_file_size(128 * 1024 * 1024), "128.0 MB");
        assert_eq!(format_file_size(1073741824), "1.0 GB");
        assert_eq!(format_file_size(1099511627776), "1.0 TB");
    }

    #[test]
    fn test_html_builder_with_note() {
        let html = HtmlBuilder::from_status_code(404, Some("File not found")).build();
        assert_eq!(
            html,
            "<html><body><h1>404 Not Found</h1><p>File not found</p></body></html>"
        );
    }

    #[test]
    fn test_html_builder_without_note() {
        let html = HtmlBuilder::from_status_code(501, None).build();
        assert!(html.contains("<h1>501 Not Implemented</h1>"));
        assert!(html.contains("<p>Not Implemented</p>"));
    }

    #[test]
    fn test_unknown_code_does_not_panic() {
        assert_eq!(reason_phrase(999), "Error");
        let html = HtmlBuilder::from_status_code(999, None).build();
        assert!(html.contains("999 Error"));
    }
}
