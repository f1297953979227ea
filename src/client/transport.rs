//! 客户端 HTTP 传输

use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::ClientError;
use crate::llm::fix_base_url;

/// 服务端原始回复
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

impl TransportReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 向后端发送 JSON 请求
///
/// 只有连接/读取失败才返回错误，HTTP 错误状态码照常作为回复返回
pub trait ApiTransport: Send + Sync {
    fn post_json<'a>(&'a self, path: &'a str, body: Value)
        -> BoxFuture<'a, Result<TransportReply, ClientError>>;
}

/// 基于 reqwest 的传输实现
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: fix_base_url(&base_url.into()),
        })
    }
}

impl ApiTransport for HttpTransport {
    fn post_json<'a>(
        &'a self,
        path: &'a str,
        body: Value,
    ) -> BoxFuture<'a, Result<TransportReply, ClientError>> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, path);
            debug!("POST {}", url);

            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ClientError::Network(e.to_string()))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| ClientError::Network(e.to_string()))?;

            Ok(TransportReply { status, body })
        })
    }
}
