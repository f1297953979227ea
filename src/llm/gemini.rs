//! Gemini streamGenerateContent 流式实现

use async_stream::try_stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::format::build_gemini_stream_endpoint;
use super::types::{ChatChunk, ChunkStream, GenerationOptions, LlmError};

/// Gemini 请求载荷
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPartOut>,
}

#[derive(Serialize)]
struct GeminiPartOut {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Gemini SSE 响应块
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    /// 流中途出错时 Gemini 在 data 行里返回 error 对象
    #[serde(default)]
    error: Option<GeminiErrorBody>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPartIn>,
}

#[derive(Deserialize, Debug)]
struct GeminiPartIn {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

/// 非 2xx 响应的错误体
#[derive(Deserialize, Debug)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Deserialize, Debug)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiErrorBody {
    fn describe(self) -> String {
        if self.status.is_empty() {
            self.message
        } else {
            format!("{}: {}", self.status, self.message)
        }
    }
}

/// 解析一条 SSE data 负载
///
/// 无法解析的负载返回 None，由调用方跳过；带 error 对象的负载转为流错误
fn parse_sse_data(data: &str) -> Option<Result<ChatChunk, LlmError>> {
    let chunk: GeminiStreamChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse Gemini response: {}, data: {}", e, data);
            return None;
        }
    };

    if let Some(err) = chunk.error {
        let message = err.describe();
        error!("Gemini stream error: {}", message);
        return Some(Err(LlmError::StreamError(message)));
    }

    let block_reason = chunk.prompt_feedback.and_then(|f| f.block_reason);

    let candidate = chunk.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
    let text: String = candidate
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    Some(Ok(ChatChunk {
        content: (!text.is_empty()).then_some(text),
        finish_reason,
        block_reason,
    }))
}

/// 解析一行 SSE，非 data 行返回 None
fn parse_sse_line(line: &str) -> Option<Result<ChatChunk, LlmError>> {
    let data = line.trim().strip_prefix("data:")?;
    parse_sse_data(data.trim())
}

/// 从字节缓冲区取出一整行
///
/// 按字节找换行，只解码完整的行，多字节字符跨网络块时不会被拆坏
fn take_line(buffer: &mut Vec<u8>) -> Option<String> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=pos).collect();
    Some(String::from_utf8_lossy(&line[..pos]).into_owned())
}

/// 把错误响应体整理为可读信息，保留 status 字段供配额识别
fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.describe(),
        Err(_) => body.to_string(),
    }
}

/// 流式调用 Gemini API
pub fn stream_gemini(
    client: &Client,
    api_key: &str,
    base_url: &str,
    prompt: &str,
    model: &str,
    options: &GenerationOptions,
) -> ChunkStream {
    let endpoint = build_gemini_stream_endpoint(base_url, model);
    let api_key = api_key.to_string();
    let model = model.to_string();
    let prompt = prompt.to_string();
    let options = options.clone();
    let client = client.clone();

    Box::pin(try_stream! {
        let payload = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPartOut { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            },
        };

        debug!("Gemini API request: endpoint={}, model={}", endpoint, model);

        let response = client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Gemini API error: status={}, body={}",
                status_code,
                error_text.chars().take(500).collect::<String>()
            );
            Err(LlmError::ApiError {
                status: status_code,
                message: describe_error_body(&error_text),
            })?;
            unreachable!();
        }

        // 处理 SSE 流
        let mut buffer: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();

        use futures::StreamExt;
        while let Some(chunk_result) = stream.next().await {
            let bytes = chunk_result?;
            buffer.extend_from_slice(&bytes);

            while let Some(line) = take_line(&mut buffer) {
                if let Some(item) = parse_sse_line(&line) {
                    yield item?;
                }
            }
        }

        // 流末尾可能没有换行
        if let Some(item) = parse_sse_line(&String::from_utf8_lossy(&buffer)) {
            yield item?;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_text_chunk() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}],"role":"model"}}]}"#;
        let chunk = parse_sse_data(data).unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("Hello world"));
        assert_eq!(chunk.finish_reason, None);
        assert_eq!(chunk.block_reason, None);
    }

    #[test]
    fn test_parse_finish_reason() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"."}]},"finishReason":"STOP"}]}"#;
        let chunk = parse_sse_data(data).unwrap().unwrap();
        assert_eq!(chunk.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_parse_prompt_block() {
        let data = r#"{"promptFeedback":{"blockReason":"SAFETY","safetyRatings":[]}}"#;
        let chunk = parse_sse_data(data).unwrap().unwrap();
        assert_eq!(chunk.content, None);
        assert_eq!(chunk.block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(parse_sse_data("not json").is_none());
    }

    #[test]
    fn test_parse_error_payload() {
        let data = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        match parse_sse_data(data) {
            Some(Err(err @ LlmError::StreamError(_))) => {
                assert!(err.is_quota_exceeded());
                assert_eq!(err.kind(), "stream");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_take_line_waits_for_split_character() {
        let line = "data: 人工智能\n".as_bytes();
        // 在“人”的三个字节中间切开
        let (head, tail) = line.split_at(8);

        let mut buffer = head.to_vec();
        assert_eq!(take_line(&mut buffer), None);

        buffer.extend_from_slice(tail);
        assert_eq!(take_line(&mut buffer).as_deref(), Some("data: 人工智能"));
        assert!(buffer.is_empty());
    }

    /// 起一个只响应一次的本地 HTTP 服务，用 chunked 编码按给定切分发送正文
    async fn serve_chunked(parts: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // 读完请求头和请求体
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            for part in parts {
                socket
                    .write_all(format!("{:x}\r\n", part.len()).as_bytes())
                    .await
                    .unwrap();
                socket.write_all(&part).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        format!("http://{}", addr)
    }

    async fn collect_text(base_url: &str) -> Result<String, LlmError> {
        let mut stream = stream_gemini(
            &Client::new(),
            "test-key",
            base_url,
            "hi",
            "gemini-1.5-flash",
            &GenerationOptions::default(),
        );
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            if let Some(content) = chunk?.content {
                text.push_str(&content);
            }
        }
        Ok(text)
    }

    #[tokio::test]
    async fn test_stream_keeps_character_split_across_chunks() {
        let body = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"人工智能\"}]}}]}\n\n".as_bytes();
        let split = body.windows(3).position(|w| w == "人".as_bytes()).unwrap() + 1;
        let (head, tail) = body.split_at(split);

        let base_url = serve_chunked(vec![head.to_vec(), tail.to_vec()]).await;
        assert_eq!(collect_text(&base_url).await.unwrap(), "人工智能");
    }

    #[tokio::test]
    async fn test_stream_reads_last_line_without_newline() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello \"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"world\"}]},\"finishReason\":\"STOP\"}]}",
        );
        let base_url = serve_chunked(vec![body.as_bytes().to_vec()]).await;
        assert_eq!(collect_text(&base_url).await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_stream_surfaces_error_payload() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"partial\"}]}}]}\n\n",
            "data: {\"error\":{\"code\":500,\"message\":\"Internal error\",\"status\":\"INTERNAL\"}}\n\n",
        );
        let base_url = serve_chunked(vec![body.as_bytes().to_vec()]).await;
        match collect_text(&base_url).await {
            Err(LlmError::StreamError(message)) => assert_eq!(message, "INTERNAL: Internal error"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_describe_error_body() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded for metric","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            describe_error_body(body),
            "RESOURCE_EXHAUSTED: Quota exceeded for metric"
        );
        assert_eq!(describe_error_body("Bad Gateway"), "Bad Gateway");
    }
}
