//! Gemini LLM 客户端

use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use super::gemini::stream_gemini;
use super::types::{ChunkStream, GenerationOptions, LlmError, StreamCollectResult};

/// 文本生成模型
///
/// 网关只依赖这个 trait，测试中可替换为假模型
pub trait TextModel: Send + Sync {
    /// 模型名称
    fn model_name(&self) -> &str;

    /// 流式生成
    fn stream_generate(&self, prompt: &str, options: &GenerationOptions) -> ChunkStream;
}

/// Gemini 客户端
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    /// 创建新的客户端
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::ConfigError(
                "API Key is required (set GEMINI_API_KEY)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(5)
            .build()
            .map_err(LlmError::HttpError)?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        })
    }
}

impl TextModel for LlmClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn stream_generate(&self, prompt: &str, options: &GenerationOptions) -> ChunkStream {
        info!("LLM request: model={}, prompt_len={}", self.model, prompt.len());
        stream_gemini(
            &self.client,
            &self.api_key,
            &self.base_url,
            prompt,
            &self.model,
            options,
        )
    }
}

/// 流式请求并收集完整响应
pub async fn stream_and_collect(
    model: &dyn TextModel,
    prompt: &str,
    options: &GenerationOptions,
) -> Result<StreamCollectResult, LlmError> {
    let mut stream = model.stream_generate(prompt, options);
    let mut result = StreamCollectResult::default();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        result.chunk_count += 1;

        if let Some(content) = chunk.content {
            result.content.push_str(&content);
        }
        if chunk.finish_reason.is_some() {
            result.finish_reason = chunk.finish_reason;
        }
        if chunk.block_reason.is_some() {
            result.block_reason = chunk.block_reason;
        }
    }

    Ok(result)
}

#[cfg(test)]
pub mod testing {
    //! 测试用假模型

    use super::*;
    use crate::llm::ChatChunk;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 假模型的预设响应
    pub enum FakeReply {
        Chunks(Vec<ChatChunk>),
        Error(fn() -> LlmError),
    }

    /// 按预设返回结果，并记录调用次数和最后的 prompt
    pub struct FakeModel {
        reply: FakeReply,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl FakeModel {
        pub fn new(reply: FakeReply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }

        /// 把整段文本拆成多个块返回
        pub fn with_text(text: &str) -> Self {
            let mut chunks: Vec<ChatChunk> = text
                .split_inclusive('\n')
                .map(ChatChunk::text)
                .collect();
            chunks.push(ChatChunk::finished("STOP"));
            Self::new(FakeReply::Chunks(chunks))
        }

        pub fn failing(make: fn() -> LlmError) -> Self {
            Self::new(FakeReply::Error(make))
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.last_prompt.lock().clone()
        }
    }

    impl TextModel for FakeModel {
        fn model_name(&self) -> &str {
            "fake-model"
        }

        fn stream_generate(&self, prompt: &str, _options: &GenerationOptions) -> ChunkStream {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock() = Some(prompt.to_string());

            let items: Vec<Result<ChatChunk, LlmError>> = match &self.reply {
                FakeReply::Chunks(chunks) => chunks.iter().cloned().map(Ok).collect(),
                FakeReply::Error(make) => vec![Err(make())],
            };
            Box::pin(futures::stream::iter(items))
        }
    }
}
