//! 终端客户端
//!
//! 对应浏览器前端：请求编排、本地历史和主题偏好。存储通过 `StoragePort` 注入，
//! 网络通过 `ApiTransport` 注入，两者都可在测试中替换。

mod history;
mod orchestrator;
mod render;
mod storage;
mod theme;
mod transport;

pub use history::HistoryEntry;
pub use orchestrator::ClientSession;
pub use storage::FileStorage;
pub use transport::HttpTransport;

use thiserror::Error;

/// 客户端错误，Display 即展示给用户的信息
#[derive(Debug, Error)]
pub enum ClientError {
    /// 输入校验失败，未发出请求
    #[error("{0}")]
    Validation(String),

    /// 已有请求在途
    #[error("A request is already in progress.")]
    Busy,

    /// 无法连接后端
    #[error("Network error: {0}")]
    Network(String),

    /// 后端返回错误
    #[error("{message}")]
    Server { status: u16, message: String },

    /// 后端返回了无法识别的成功响应
    #[error("Unexpected response from server: {0}")]
    InvalidResponse(String),

    /// 本地存储失败
    #[error("Failed to save local data: {0}")]
    Storage(String),
}
