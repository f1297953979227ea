//! REST API 请求/响应模型

use serde::{Deserialize, Serialize};

/// 文章生成请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratePostRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

/// 联想建议请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionsRequest {
    #[serde(default)]
    pub query: Option<String>,
}

/// 联想建议响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}
