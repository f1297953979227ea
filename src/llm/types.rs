//! LLM 类型定义

use futures::Stream;
use std::pin::Pin;

use super::format::is_quota_message;

/// 流式响应块
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatChunk {
    /// 文本内容
    pub content: Option<String>,
    /// 完成原因（Gemini 的 finishReason，如 STOP、SAFETY）
    pub finish_reason: Option<String>,
    /// 提示词被拦截的原因（promptFeedback.blockReason）
    pub block_reason: Option<String>,
}

impl ChatChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn finished(reason: impl Into<String>) -> Self {
        Self {
            finish_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            block_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// 流式响应块的装箱流
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>>;

/// 生成选项
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// 温度参数
    pub temperature: Option<f64>,
    /// 最大输出 token 数
    pub max_output_tokens: Option<u32>,
}

/// 流式收集结果
#[derive(Debug, Clone, Default)]
pub struct StreamCollectResult {
    /// 完整响应内容
    pub content: String,
    /// 最后一个完成原因
    pub finish_reason: Option<String>,
    /// 拦截原因
    pub block_reason: Option<String>,
    /// chunk 数量
    pub chunk_count: usize,
}

/// 被视为安全拦截的完成原因
const SAFETY_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

impl StreamCollectResult {
    /// 返回安全拦截原因（如果有）
    ///
    /// finishReason 为安全类但仍返回了正文时不视为拦截。
    pub fn safety_block(&self) -> Option<&str> {
        if let Some(reason) = self.block_reason.as_deref() {
            return Some(reason);
        }

        match self.finish_reason.as_deref() {
            Some(reason)
                if SAFETY_FINISH_REASONS.contains(&reason) && self.content.trim().is_empty() =>
            {
                Some(reason)
            }
            _ => None,
        }
    }
}

/// LLM 错误类型
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP 请求错误
    #[error("HTTP 请求失败: {0}")]
    HttpError(#[source] reqwest::Error),

    /// API 返回错误
    #[error("API 错误 ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// 超时错误
    #[error("请求超时")]
    Timeout,

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 流解析错误
    #[error("流解析错误: {0}")]
    StreamError(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::HttpError(e)
        }
    }
}

impl LlmError {
    /// 是否为上游配额/限流耗尽
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            LlmError::ApiError { status: 429, .. } => true,
            LlmError::ApiError { message, .. } | LlmError::StreamError(message) => {
                is_quota_message(message)
            }
            _ => false,
        }
    }

    /// 用于请求日志的错误类型名
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::HttpError(_) => "http",
            LlmError::ApiError { .. } => "api",
            LlmError::Timeout => "timeout",
            LlmError::ConfigError(_) => "config",
            LlmError::StreamError(_) => "stream",
        }
    }

    /// HTTP 状态码（仅 API 错误）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
