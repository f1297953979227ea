//! 结果渲染
//!
//! 纯函数：同一份数据总是渲染出同样的文本和链接。

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::fmt;

use crate::services::GenerationResult;

const SEARCH_URL: &str = "https://www.google.com/search?q=";

/// 搜索链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLink {
    pub query: String,
    pub url: String,
}

/// 渲染后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResult {
    pub text: String,
    pub links: Vec<SearchLink>,
}

pub fn search_url(query: &str) -> String {
    format!("{}{}", SEARCH_URL, utf8_percent_encode(query, NON_ALPHANUMERIC))
}

pub fn render(result: &GenerationResult) -> RenderedResult {
    RenderedResult {
        text: result.response_text.clone(),
        links: result
            .search_queries
            .iter()
            .map(|query| SearchLink {
                query: query.clone(),
                url: search_url(query),
            })
            .collect(),
    }
}

impl fmt::Display for RenderedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)?;
        if !self.links.is_empty() {
            write!(f, "\n\nRelated searches:")?;
            for link in &self.links {
                write!(f, "\n  - {} <{}>", link.query, link.url)?;
            }
        }
        Ok(())
    }
}
