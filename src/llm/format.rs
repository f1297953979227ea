//! URL 构建与上游错误识别工具

use once_cell::sync::Lazy;
use regex::Regex;

/// 配额/限流类错误信息的匹配规则
static QUOTA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b429\b|quota|resource_exhausted|rate.?limit").expect("valid quota regex")
});

/// 判断错误信息是否表示配额耗尽
pub fn is_quota_message(message: &str) -> bool {
    QUOTA_PATTERN.is_match(message)
}

/// 修复 base_url
///
/// - 移除末尾斜杠
/// - 修复双斜杠（保留协议部分）
pub fn fix_base_url(base_url: &str) -> String {
    let mut url = base_url.trim_end_matches('/').to_string();

    if let Some(pos) = url.find("://") {
        let (protocol, rest) = url.split_at(pos + 3);
        let fixed_rest = rest.replace("//", "/");
        url = format!("{}{}", protocol, fixed_rest);
    }

    url
}

/// 构建 Gemini 流式生成端点
///
/// base_url 可以只给主机，也可以已经带上 `/v1beta`
pub fn build_gemini_stream_endpoint(base_url: &str, model: &str) -> String {
    let url = fix_base_url(base_url);
    let model = model.trim_start_matches("models/");

    let versioned = if url.ends_with("/v1beta") || url.ends_with("/v1") {
        url
    } else {
        format!("{}/v1beta", url)
    };

    format!("{}/models/{}:streamGenerateContent?alt=sse", versioned, model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_base_url() {
        assert_eq!(
            fix_base_url("https://generativelanguage.googleapis.com/"),
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(
            fix_base_url("https://generativelanguage.googleapis.com//v1beta"),
            "https://generativelanguage.googleapis.com/v1beta"
        );
    }

    #[test]
    fn test_build_gemini_stream_endpoint() {
        let expected = "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse";
        assert_eq!(
            build_gemini_stream_endpoint("https://generativelanguage.googleapis.com", "gemini-1.5-flash"),
            expected
        );
        assert_eq!(
            build_gemini_stream_endpoint("https://generativelanguage.googleapis.com/v1beta/", "gemini-1.5-flash"),
            expected
        );
        assert_eq!(
            build_gemini_stream_endpoint("https://generativelanguage.googleapis.com", "models/gemini-1.5-flash"),
            expected
        );
    }

    #[test]
    fn test_is_quota_message() {
        assert!(is_quota_message("429 Too Many Requests"));
        assert!(is_quota_message("You exceeded your current quota"));
        assert!(is_quota_message("status: RESOURCE_EXHAUSTED"));
        assert!(is_quota_message("Rate limit reached"));
        assert!(!is_quota_message("model not found"));
        assert!(!is_quota_message("request id 14290"));
    }
}
