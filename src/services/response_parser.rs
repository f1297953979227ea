//! 上游原始文本解析
//!
//! 以 `SEARCH_QUERY:` 开头的行是搜索建议，其余行是正文。

use serde::{Deserialize, Serialize};

use super::prompt_service::SEARCH_QUERY_MARKER;

/// 一次成功生成的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub response_text: String,
    pub search_queries: Vec<String>,
}

/// 按行拆分正文与搜索建议
///
/// 不校验搜索建议的数量，出现多少条就返回多少条（包括 0 条）
pub fn parse_generation(raw: &str) -> GenerationResult {
    let mut body_lines: Vec<&str> = Vec::new();
    let mut search_queries = Vec::new();

    for line in raw.split('\n') {
        match line.strip_prefix(SEARCH_QUERY_MARKER) {
            Some(query) => search_queries.push(query.trim().to_string()),
            None => body_lines.push(line),
        }
    }

    GenerationResult {
        response_text: body_lines.join("\n").trim().to_string(),
        search_queries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_queries_at_end() {
        let raw = "AI began in the 1950s.\n\nToday it is everywhere.\nSEARCH_QUERY: Dartmouth workshop 1956\nSEARCH_QUERY:   AI winter causes  \nSEARCH_QUERY:deep learning breakthrough 2012\n";
        let result = parse_generation(raw);

        assert_eq!(result.response_text, "AI began in the 1950s.\n\nToday it is everywhere.");
        assert_eq!(
            result.search_queries,
            vec![
                "Dartmouth workshop 1956",
                "AI winter causes",
                "deep learning breakthrough 2012"
            ]
        );
    }

    #[test]
    fn test_no_marker_lines() {
        let raw = "  Just a body.\nSecond line.  \n";
        let result = parse_generation(raw);
        assert_eq!(result.response_text, "Just a body.\nSecond line.");
        assert!(result.search_queries.is_empty());
    }

    #[test]
    fn test_interleaved_markers_keep_order() {
        let raw = "intro\nSEARCH_QUERY: one\nmiddle\nSEARCH_QUERY: two\noutro\nSEARCH_QUERY: three\nSEARCH_QUERY: four";
        let result = parse_generation(raw);
        assert_eq!(result.response_text, "intro\nmiddle\noutro");
        assert_eq!(result.search_queries, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_marker_must_start_line() {
        let raw = "see SEARCH_QUERY: not a query\n SEARCH_QUERY: indented";
        let result = parse_generation(raw);
        assert!(result.search_queries.is_empty());
        assert_eq!(result.response_text, raw);
    }

    #[test]
    fn test_crlf_input() {
        let raw = "body\r\nSEARCH_QUERY: windows\r\n";
        let result = parse_generation(raw);
        assert_eq!(result.response_text, "body");
        assert_eq!(result.search_queries, vec!["windows"]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let result = GenerationResult {
            response_text: "x".to_string(),
            search_queries: vec!["q".to_string()],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["responseText"], "x");
        assert_eq!(json["searchQueries"][0], "q");
    }
}
