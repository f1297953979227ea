//! 客户端请求编排
//!
//! 把界面事件映射为方法调用：提交、重新生成、查看历史、切换主题、联想建议。
//! 同一时间最多一个生成请求在途，新的提交会被拒绝而不是并发发出。

use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use super::history::{History, HistoryEntry};
use super::render::{render, RenderedResult};
use super::storage::StoragePort;
use super::theme::Theme;
use super::transport::{ApiTransport, TransportReply};
use super::ClientError;
use crate::services::{GenerationResult, Style};

const GENERATE_PATH: &str = "/generate-post";
const SUGGEST_PATH: &str = "/generate-suggestions";

/// 客户端联想的最少字符数，与服务端一致
const MIN_SUGGEST_CHARS: usize = 3;

/// 错误体截断长度
const ERROR_SNIPPET_CHARS: usize = 200;

/// 上一次提交的输入
#[derive(Debug, Clone, PartialEq, Eq)]
struct LastRequest {
    topic: String,
    tone: String,
}

/// 当前界面状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// 生成按钮是否处于禁用（请求在途）
    pub busy: bool,
    /// 当前展示的结果
    pub result: Option<RenderedResult>,
    /// 当前展示的提示或错误信息
    pub message: Option<String>,
}

#[derive(Default)]
struct SessionInner {
    history: History,
    theme: Theme,
    last_request: Option<LastRequest>,
    view: ViewState,
}

#[derive(Deserialize)]
struct SuggestionsPayload {
    #[serde(default)]
    suggestions: Vec<String>,
}

/// 在途标记，离开作用域时恢复空闲
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 客户端会话
pub struct ClientSession<T: ApiTransport, S: StoragePort> {
    transport: T,
    storage: S,
    in_flight: AtomicBool,
    inner: Mutex<SessionInner>,
}

impl<T: ApiTransport, S: StoragePort> ClientSession<T, S> {
    /// 创建会话并从存储中恢复历史和主题
    pub fn new(transport: T, storage: S) -> Self {
        let inner = SessionInner {
            history: History::load(&storage),
            theme: Theme::load(&storage),
            ..Default::default()
        };

        Self {
            transport,
            storage,
            in_flight: AtomicBool::new(false),
            inner: Mutex::new(inner),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn view(&self) -> ViewState {
        self.inner.lock().view.clone()
    }

    pub fn theme(&self) -> Theme {
        self.inner.lock().theme
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().history.entries().to_vec()
    }

    pub fn filter_history(&self, term: &str) -> Vec<HistoryEntry> {
        self.inner
            .lock()
            .history
            .filter(term)
            .into_iter()
            .cloned()
            .collect()
    }

    /// 提交新主题
    pub async fn submit(&self, topic: &str, style: &str) -> Result<RenderedResult, ClientError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return self.fail(ClientError::Validation("Please enter a topic.".to_string()));
        }

        let tone = Style::from_label(style).label().to_string();
        self.run(topic, &tone, false).await
    }

    /// 用上一次的主题和风格重新生成，不新增历史记录
    pub async fn regenerate(&self) -> Result<RenderedResult, ClientError> {
        let last = self.inner.lock().last_request.clone();
        match last {
            Some(last) => self.run(&last.topic, &last.tone, true).await,
            None => self.fail(ClientError::Validation(
                "Nothing to regenerate yet. Submit a topic first.".to_string(),
            )),
        }
    }

    async fn run(&self, topic: &str, tone: &str, regenerating: bool) -> Result<RenderedResult, ClientError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientError::Busy);
        }
        let _guard = InFlightGuard(&self.in_flight);

        {
            let mut inner = self.inner.lock();
            inner.view = ViewState {
                busy: true,
                result: None,
                message: None,
            };
            if !regenerating {
                inner.last_request = Some(LastRequest {
                    topic: topic.to_string(),
                    tone: tone.to_string(),
                });
            }
        }

        let outcome = self.request_generation(topic, tone).await;

        let mut inner = self.inner.lock();
        inner.view.busy = false;
        match outcome {
            Ok(result) => {
                let rendered = render(&result);
                if !regenerating {
                    inner
                        .history
                        .record(topic, tone, &result, Utc::now().timestamp_millis());
                    if let Err(e) = inner.history.save(&self.storage) {
                        warn!("Failed to persist history: {}", e);
                    }
                }
                info!(
                    "Generation rendered: regenerated={}, links={}",
                    regenerating,
                    rendered.links.len()
                );
                inner.view.result = Some(rendered.clone());
                Ok(rendered)
            }
            Err(e) => {
                inner.view.message = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn request_generation(&self, topic: &str, tone: &str) -> Result<GenerationResult, ClientError> {
        let reply = self
            .transport
            .post_json(GENERATE_PATH, json!({ "topic": topic, "style": tone }))
            .await?;
        interpret_generate_reply(reply)
    }

    /// 显示历史记录中的一条
    pub fn select_history(&self, id: i64) -> Option<RenderedResult> {
        let mut inner = self.inner.lock();
        let rendered = inner.history.get(id).map(|entry| render(&entry.to_result()))?;
        inner.view.result = Some(rendered.clone());
        inner.view.message = None;
        Some(rendered)
    }

    pub fn clear_history(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        inner.history.clear();
        inner.history.save(&self.storage)
    }

    /// 切换并保存主题
    pub fn toggle_theme(&self) -> Result<Theme, ClientError> {
        let mut inner = self.inner.lock();
        inner.theme = inner.theme.toggled();
        inner.theme.save(&self.storage)?;
        Ok(inner.theme)
    }

    /// 联想建议，失败时静默返回空列表
    pub async fn suggest(&self, query: &str) -> Vec<String> {
        let query = query.trim();
        if query.chars().count() < MIN_SUGGEST_CHARS {
            return Vec::new();
        }

        let reply = match self.transport.post_json(SUGGEST_PATH, json!({ "query": query })).await {
            Ok(reply) if reply.is_success() => reply,
            Ok(reply) => {
                warn!("Suggestions request returned status {}", reply.status);
                return Vec::new();
            }
            Err(e) => {
                warn!("Suggestions request failed: {}", e);
                return Vec::new();
            }
        };

        serde_json::from_str::<SuggestionsPayload>(&reply.body)
            .map(|p| p.suggestions)
            .unwrap_or_default()
    }

    fn fail(&self, error: ClientError) -> Result<RenderedResult, ClientError> {
        self.inner.lock().view.message = Some(error.to_string());
        Err(error)
    }
}

/// 截取错误体前若干字符
fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details".to_string();
    }
    let mut s: String = trimmed.chars().take(ERROR_SNIPPET_CHARS).collect();
    if trimmed.chars().count() > ERROR_SNIPPET_CHARS {
        s.push_str("...");
    }
    s
}

/// 解析生成接口的回复
///
/// 错误体不一定是 JSON（例如反向代理返回的 HTML），此时用状态码和正文片段组成信息
fn interpret_generate_reply(reply: TransportReply) -> Result<GenerationResult, ClientError> {
    let parsed: Option<Value> = serde_json::from_str(&reply.body).ok();
    let embedded_error = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
        .filter(|e| !e.trim().is_empty())
        .map(str::to_string);

    if let Some(message) = embedded_error {
        return Err(ClientError::Server {
            status: reply.status,
            message,
        });
    }

    if !reply.is_success() {
        return Err(ClientError::Server {
            status: reply.status,
            message: format!("Server error ({}): {}", reply.status, snippet(&reply.body)),
        });
    }

    match parsed {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidResponse(e.to_string())),
        None => Err(ClientError::InvalidResponse(snippet(&reply.body))),
    }
}
