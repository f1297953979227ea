//! LLM 模块
//!
//! 提供 Gemini 流式客户端，以及网关依赖的 `TextModel` 抽象。

mod client;
mod format;
mod gemini;
mod types;

pub use client::{stream_and_collect, LlmClient, TextModel};
pub use format::fix_base_url;
pub use types::*;

#[cfg(test)]
pub use client::testing;
