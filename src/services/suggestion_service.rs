//! 主题联想建议
//!
//! 尽力而为：输入太短时不调用上游，上游失败时返回空列表。

use tracing::{debug, warn};

use super::llm_service::LlmService;
use super::prompt_service::PromptService;
use crate::llm::GenerationOptions;

/// 触发上游调用的最少字符数
const MIN_QUERY_CHARS: usize = 3;

/// 建议服务
#[derive(Clone)]
pub struct SuggestionService {
    llm: LlmService,
    prompts: PromptService,
}

impl SuggestionService {
    pub fn new(llm: LlmService) -> Self {
        Self {
            llm,
            prompts: PromptService::new(),
        }
    }

    pub async fn suggest(&self, partial_query: Option<&str>) -> Vec<String> {
        let query = partial_query.unwrap_or_default().trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            debug!("Suggestion query too short, skipping upstream call");
            return Vec::new();
        }

        let prompt = self.prompts.build_suggestion_prompt(query);
        let options = GenerationOptions {
            max_output_tokens: Some(120),
            ..self.llm.default_options()
        };

        match self.llm.collect("suggest", &prompt, options).await {
            Ok(collected) => split_suggestions(&collected.content),
            Err(e) => {
                warn!("Suggestion request failed, returning empty list: {}", e);
                Vec::new()
            }
        }
    }
}

/// 按行拆分，去掉空行
fn split_suggestions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
