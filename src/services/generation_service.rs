//! 文章生成网关
//!
//! 构建 prompt → 调用上游 → 校验 → 拆分正文与搜索建议

use tracing::{info, warn};

use super::llm_service::LlmService;
use super::prompt_service::{PromptService, Style};
use super::response_parser::{parse_generation, GenerationResult};
use crate::llm::LlmError;

/// 生成失败的原因
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// 上游配额耗尽
    #[error("上游配额已耗尽: {0}")]
    QuotaExceeded(#[source] LlmError),

    /// 被安全策略拦截
    #[error("内容被安全策略拦截: {0}")]
    SafetyBlocked(String),

    /// 上游返回空内容
    #[error("上游返回空响应")]
    EmptyResponse,

    /// 其他上游错误
    #[error("上游调用失败: {0}")]
    Upstream(#[source] LlmError),
}

impl From<LlmError> for GenerateError {
    fn from(e: LlmError) -> Self {
        if e.is_quota_exceeded() {
            GenerateError::QuotaExceeded(e)
        } else {
            GenerateError::Upstream(e)
        }
    }
}

/// 生成服务
#[derive(Clone)]
pub struct GenerationService {
    llm: LlmService,
    prompts: PromptService,
}

impl GenerationService {
    pub fn new(llm: LlmService) -> Self {
        Self {
            llm,
            prompts: PromptService::new(),
        }
    }

    /// 生成文章
    ///
    /// `topic` 由调用方保证非空
    pub async fn generate(&self, topic: &str, style: Style) -> Result<GenerationResult, GenerateError> {
        let prompt = self.prompts.build_post_prompt(topic, style);
        let collected = self
            .llm
            .collect("generate", &prompt, self.llm.default_options())
            .await?;

        if let Some(reason) = collected.safety_block() {
            warn!("Generation blocked by safety filter: reason={}", reason);
            return Err(GenerateError::SafetyBlocked(reason.to_string()));
        }
        if collected.content.trim().is_empty() {
            warn!(
                "Generation returned empty text: finish_reason={:?}",
                collected.finish_reason
            );
            return Err(GenerateError::EmptyResponse);
        }

        let result = parse_generation(&collected.content);
        info!(
            "Generation completed: style={}, body_len={}, search_queries={}",
            style.label(),
            result.response_text.len(),
            result.search_queries.len()
        );
        Ok(result)
    }
}
