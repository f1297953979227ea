//! LLM 服务封装
//!
//! 包装 `TextModel`，统一处理生成参数和请求日志

use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use crate::config::AppConfig;
use crate::llm::{stream_and_collect, GenerationOptions, LlmError, StreamCollectResult, TextModel};
use crate::utils::RequestLogger;

/// LLM 服务
#[derive(Clone)]
pub struct LlmService {
    model: Arc<dyn TextModel>,
    logger: Option<Arc<RequestLogger>>,
    temperature: f64,
    max_output_tokens: u32,
}

impl LlmService {
    pub fn new(model: Arc<dyn TextModel>, config: &AppConfig) -> Self {
        Self {
            model,
            logger: None,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    pub fn with_logger(mut self, logger: Arc<RequestLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// 按配置生成的默认选项
    pub fn default_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: Some(self.temperature),
            max_output_tokens: Some(self.max_output_tokens),
        }
    }

    /// 调用上游并收集完整文本
    pub async fn collect(
        &self,
        operation: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<StreamCollectResult, LlmError> {
        let entry = RequestLogger::begin(operation, self.model.model_name(), prompt);
        let start = Instant::now();

        let result = stream_and_collect(self.model.as_ref(), prompt, &options).await;
        let elapsed = start.elapsed();

        if let Err(e) = &result {
            error!(
                "Upstream {} failed after {}ms: {}",
                operation,
                elapsed.as_millis(),
                e
            );
        }

        if let Some(logger) = &self.logger {
            let logger = Arc::clone(logger);
            let outcome = match &result {
                Ok(collected) => Ok((collected.content.len(), collected.chunk_count)),
                Err(e) => Err((e.kind(), e.to_string(), e.status_code())),
            };
            // 文件写入放到阻塞线程池，不占用异步工作线程
            tokio::task::spawn_blocking(move || match outcome {
                Ok((length, chunks)) => logger.log_success(entry, elapsed, length, chunks),
                Err((kind, message, status)) => {
                    logger.log_error(entry, elapsed, kind, &message, status)
                }
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::FakeModel;
    use crate::utils::request_logger::LogEntry;
    use std::time::Duration;
    use tempfile::TempDir;

    /// 日志在阻塞线程池里写入，轮询等待
    async fn wait_for_entries(logger: &RequestLogger, count: usize) -> Vec<LogEntry> {
        for _ in 0..100 {
            let entries = logger.read_entries();
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        logger.read_entries()
    }

    #[tokio::test]
    async fn test_collect_logs_success_and_error() {
        let dir = TempDir::new().unwrap();
        let logger = Arc::new(RequestLogger::new(Some(dir.path().to_path_buf())));
        let config = AppConfig::default();

        let ok = LlmService::new(Arc::new(FakeModel::with_text("Tides rise.\n")), &config)
            .with_logger(Arc::clone(&logger));
        let result = ok
            .collect("generate", "Write about tides", ok.default_options())
            .await
            .unwrap();
        assert_eq!(result.content, "Tides rise.\n");

        let failing = LlmService::new(
            Arc::new(FakeModel::failing(|| LlmError::ApiError {
                status: 429,
                message: "RESOURCE_EXHAUSTED: quota".to_string(),
            })),
            &config,
        )
        .with_logger(Arc::clone(&logger));
        assert!(failing
            .collect("suggest", "tid", failing.default_options())
            .await
            .is_err());

        let mut entries = wait_for_entries(&logger, 2).await;
        assert_eq!(entries.len(), 2);
        entries.sort_by(|a, b| a.operation.cmp(&b.operation));
        assert_eq!(entries[0].operation, "generate");
        assert_eq!(entries[0].status, "success");
        assert_eq!(entries[0].response_length, Some(12));
        assert_eq!(entries[1].status, "error");
        assert_eq!(entries[1].error_type.as_deref(), Some("api"));
        assert_eq!(entries[1].status_code, Some(429));
    }
}
