//! 上游请求日志记录器
//!
//! 每次调用上游模型后追加一行 JSON 到 JSONL 文件。行数在内存中计数，
//! 超过上限一定余量后才重写文件，只保留最新的条目。
//! 写入是阻塞文件 IO，异步代码中应放到 `spawn_blocking` 里调用。

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// 请求日志条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// 请求 ID
    pub request_id: String,
    /// 时间戳
    pub timestamp: DateTime<Utc>,
    /// 调用类型（generate / suggest）
    pub operation: String,
    /// 模型名称
    pub model: String,
    /// prompt 预览
    pub prompt_preview: String,
    /// 状态
    pub status: String,
    /// 持续时间（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// 响应长度
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_length: Option<usize>,
    /// chunk 数量
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    /// 错误类型
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// 错误信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// HTTP 状态码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// 已打开的日志文件及其行数
#[derive(Default)]
struct LogFile {
    file: Option<File>,
    /// 首次打开时从磁盘统计，之后随写入递增
    lines: Option<usize>,
}

/// 请求日志记录器
pub struct RequestLogger {
    log_path: PathBuf,
    max_entries: usize,
    state: Mutex<LogFile>,
}

impl RequestLogger {
    /// 创建新的日志记录器，默认目录为可执行文件旁的 storage/
    pub fn new(log_dir: Option<PathBuf>) -> Self {
        let log_dir = log_dir.unwrap_or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("storage")
        });

        if let Err(e) = fs::create_dir_all(&log_dir) {
            warn!("Failed to create log dir {}: {}", log_dir.display(), e);
        }

        Self {
            log_path: log_dir.join("llm_requests.jsonl"),
            max_entries: 1000,
            state: Mutex::new(LogFile::default()),
        }
    }

    #[cfg(test)]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// 生成请求 ID
    pub fn generate_request_id() -> String {
        Uuid::new_v4().to_string()[..8].to_string()
    }

    /// 按字符截断，避免切断 UTF-8
    fn truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_chars).collect();
            format!("{}...", head)
        }
    }

    /// 创建待完成的日志条目
    pub fn begin(operation: &str, model: &str, prompt: &str) -> LogEntry {
        LogEntry {
            request_id: Self::generate_request_id(),
            timestamp: Utc::now(),
            operation: operation.to_string(),
            model: model.to_string(),
            prompt_preview: Self::truncate(prompt, 200),
            status: "pending".to_string(),
            duration_ms: None,
            response_length: None,
            chunk_count: None,
            error_type: None,
            error_message: None,
            status_code: None,
        }
    }

    /// 记录成功
    pub fn log_success(
        &self,
        mut entry: LogEntry,
        duration: Duration,
        response_length: usize,
        chunk_count: usize,
    ) {
        entry.status = "success".to_string();
        entry.duration_ms = Some(duration.as_millis() as u64);
        entry.response_length = Some(response_length);
        entry.chunk_count = Some(chunk_count);
        self.write_entry(&entry);
    }

    /// 记录错误
    pub fn log_error(
        &self,
        mut entry: LogEntry,
        duration: Duration,
        error_type: &str,
        error_message: &str,
        status_code: Option<u16>,
    ) {
        entry.status = "error".to_string();
        entry.duration_ms = Some(duration.as_millis() as u64);
        entry.error_type = Some(error_type.to_string());
        entry.error_message = Some(Self::truncate(error_message, 500));
        entry.status_code = status_code;
        self.write_entry(&entry);
    }

    /// 读取全部日志条目
    #[cfg(test)]
    pub fn read_entries(&self) -> Vec<LogEntry> {
        let Ok(file) = File::open(&self.log_path) else {
            return Vec::new();
        };
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect()
    }

    /// 超过上限多少行后才压缩，避免写满后每次写入都重写文件
    fn compact_threshold(&self) -> usize {
        self.max_entries + self.max_entries / 10
    }

    fn count_lines(&self) -> usize {
        File::open(&self.log_path)
            .map(|f| BufReader::new(f).lines().count())
            .unwrap_or(0)
    }

    /// 写入日志条目
    fn write_entry(&self, entry: &LogEntry) {
        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize request log entry: {}", e);
                return;
            }
        };

        let mut state = self.state.lock();

        // 懒加载文件
        if state.file.is_none() {
            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)
            {
                Ok(f) => state.file = Some(f),
                Err(e) => {
                    warn!("Failed to open request log {}: {}", self.log_path.display(), e);
                    return;
                }
            }
        }
        if state.lines.is_none() {
            state.lines = Some(self.count_lines());
        }

        let Some(file) = state.file.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(file, "{}", json).and_then(|_| file.flush()) {
            warn!("Failed to write request log: {}", e);
            return;
        }

        let lines = state.lines.unwrap_or(0) + 1;
        state.lines = Some(lines);
        if lines > self.compact_threshold() {
            self.compact(&mut state);
        }
    }

    /// 重写文件，只保留最新的 max_entries 条
    fn compact(&self, state: &mut LogFile) {
        let Ok(file) = File::open(&self.log_path) else {
            return;
        };
        let lines: Vec<String> = BufReader::new(file).lines().map_while(Result::ok).collect();
        let keep_lines = &lines[lines.len().saturating_sub(self.max_entries)..];

        match File::create(&self.log_path) {
            Ok(mut file) => {
                for line in keep_lines {
                    let _ = writeln!(file, "{}", line);
                }
                state.lines = Some(keep_lines.len());
            }
            Err(e) => {
                warn!("Failed to compact request log {}: {}", self.log_path.display(), e);
                state.lines = None;
            }
        }
        // 旧句柄指向被截断前的偏移，下次写入时重新打开
        state.file = None;
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(None)
    }
}
