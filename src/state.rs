//! 应用状态管理
//!
//! 定义在请求处理器之间共享的状态。唯一的可变共享数据是限流计数器。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::TextModel;
use crate::services::{GenerationService, LlmService, SuggestionService};
use crate::utils::{RateLimiter, RequestLogger};

/// 应用共享状态
pub struct AppState {
    /// 文章生成网关
    pub generation: GenerationService,
    /// 联想建议网关
    pub suggestions: SuggestionService,
    /// 按客户端 IP 的限流器
    pub rate_limiter: Arc<RateLimiter>,
    /// 是否信任 X-Forwarded-For
    pub trust_proxy: bool,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: &AppConfig, model: Arc<dyn TextModel>, logger: Option<Arc<RequestLogger>>) -> Self {
        let mut llm = LlmService::new(model, config);
        if let Some(logger) = logger {
            llm = llm.with_logger(logger);
        }

        Self {
            generation: GenerationService::new(llm.clone()),
            suggestions: SuggestionService::new(llm),
            rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            trust_proxy: config.trust_proxy,
        }
    }
}

/// 创建可共享的应用状态
pub fn create_shared_state(
    config: &AppConfig,
    model: Arc<dyn TextModel>,
    logger: Option<Arc<RequestLogger>>,
) -> Arc<AppState> {
    Arc::new(AppState::new(config, model, logger))
}
