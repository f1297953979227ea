//! 统一错误处理模块
//!
//! 定义应用级错误类型，并实现 axum 的 IntoResponse trait 以便自动转换为 HTTP 响应。
//! 返回给调用方的只有面向用户的信息，上游原始错误只写日志。

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::services::GenerateError;

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// 应用错误枚举
#[derive(Error, Debug)]
pub enum AppError {
    /// 请求参数错误
    #[error("请求错误: {0}")]
    BadRequest(String),

    /// 客户端请求过于频繁
    #[error("请求过于频繁，{retry_after_secs} 秒后重试")]
    RateLimited {
        window_minutes: u64,
        retry_after_secs: u64,
    },

    /// 上游配额耗尽
    #[error("上游配额已耗尽")]
    QuotaExceeded,

    /// 被安全策略拦截
    #[error("内容被安全策略拦截: {0}")]
    SafetyBlocked(String),

    /// 上游返回空内容
    #[error("上游返回空响应")]
    UpstreamEmpty,

    /// 其他上游错误
    #[error("上游错误: {0}")]
    Upstream(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, String, Option<String>) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::RateLimited { window_minutes, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!(
                    "Too many requests, please try again after {} minutes.",
                    window_minutes
                ),
                None,
            ),
            AppError::QuotaExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "The AI service quota has been exceeded. Please try again later.".to_string(),
                Some("quota exceeded".to_string()),
            ),
            AppError::SafetyBlocked(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The AI declined to answer this topic. Try rephrasing it.".to_string(),
                Some(format!("blocked by safety filter: {}", reason)),
            ),
            AppError::UpstreamEmpty => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The AI service returned an empty or invalid response.".to_string(),
                Some("empty response".to_string()),
            ),
            AppError::Upstream(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate content. Please try again later.".to_string(),
                None,
            ),
        }
    }
}

impl From<GenerateError> for AppError {
    fn from(e: GenerateError) -> Self {
        match e {
            GenerateError::QuotaExceeded(_) => AppError::QuotaExceeded,
            GenerateError::SafetyBlocked(reason) => AppError::SafetyBlocked(reason),
            GenerateError::EmptyResponse => AppError::UpstreamEmpty,
            GenerateError::Upstream(inner) => AppError::Upstream(inner.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Upstream(msg) = &self {
            error!("Request failed: {}", msg);
        }

        let (status, error_message, details) = self.parts();
        let body = Json(ErrorBody {
            error: error_message,
            details,
        });
        let mut response = (status, body).into_response();

        if let AppError::RateLimited {
            retry_after_secs, ..
        } = self
        {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// 便捷类型别名
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::RateLimited {
                    window_minutes: 5,
                    retry_after_secs: 10,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (AppError::QuotaExceeded, StatusCode::TOO_MANY_REQUESTS),
            (AppError::SafetyBlocked("SAFETY".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::UpstreamEmpty, StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Upstream("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_upstream_detail_is_not_exposed() {
        let err = AppError::from(GenerateError::Upstream(LlmError::ApiError {
            status: 500,
            message: "secret internal trace".to_string(),
        }));
        let (_, message, details) = err.parts();
        assert!(!message.contains("secret"));
        assert!(details.is_none());
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited {
            window_minutes: 5,
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_quota_and_rate_limit_messages_differ() {
        let (_, quota, _) = AppError::QuotaExceeded.parts();
        let (_, limited, _) = AppError::RateLimited {
            window_minutes: 5,
            retry_after_secs: 1,
        }
        .parts();
        assert_ne!(quota, limited);
        assert!(limited.contains("5 minutes"));
    }
}
