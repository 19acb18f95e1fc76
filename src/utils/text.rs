use regex::Regex;

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 从页面标题中解析 (职位, 公司)
///
/// 标题形如 `"(3) Rust Engineer | Acme Corp | LinkedIn"`，前面的通知数会被去掉
pub fn parse_page_title(page_title: &str) -> (String, String) {
    let mut parts = page_title.split(" | ");
    let mut title = parts.next().unwrap_or_default().trim().to_string();
    if let Ok(re) = Regex::new(r"^\(\d+\)\s*") {
        let stripped = re.replace(&title, "").trim().to_string();
        title = stripped;
    }
    let company = parts.next().map(|c| c.trim().to_string()).unwrap_or_default();
    (title, company)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_title_strips_notification_count() {
        let (title, company) = parse_page_title("(3) Rust Engineer | Acme Corp | LinkedIn");
        assert_eq!(title, "Rust Engineer");
        assert_eq!(company, "Acme Corp");
    }

    #[test]
    fn test_parse_page_title_without_company() {
        let (title, company) = parse_page_title("Jobs");
        assert_eq!(title, "Jobs");
        assert_eq!(company, "");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("你好世界", 2), "你好...");
        assert_eq!(truncate_text("short", 10), "short");
    }
}
