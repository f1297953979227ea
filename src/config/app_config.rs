//! 应用配置管理
//!
//! 配置来源依次为：字段默认值 → `config.json` → 环境变量。
//! 加载一次后保存在全局单例中。

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// 获取配置文件路径
fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("POSTGEN_CONFIG") {
        return PathBuf::from(path);
    }

    // 默认位于可执行文件同级目录
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.json")
}

/// 限流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 窗口长度（秒）
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// 每个窗口允许的最大请求数
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API 密钥
    #[serde(default)]
    pub api_key: String,

    /// Gemini API 基础 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// 模型名称
    #[serde(default = "default_model")]
    pub model: String,

    /// 温度参数 (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// 最大输出 token 数
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// 上游请求总超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// 上游连接超时（秒）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// 监听地址
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// 允许跨域访问的来源
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// 是否信任 X-Forwarded-For（部署在反向代理之后时开启）
    #[serde(default)]
    pub trust_proxy: bool,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// 是否记录上游请求日志
    #[serde(default = "default_request_log_enabled")]
    pub request_log_enabled: bool,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5500".to_string(),
        "http://127.0.0.1:5500".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_window_secs() -> u64 {
    5 * 60
}

fn default_max_requests() -> u32 {
    15
}

fn default_request_log_enabled() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            bind_addr: default_bind_addr(),
            allowed_origins: default_allowed_origins(),
            trust_proxy: false,
            rate_limit: RateLimitConfig::default(),
            request_log_enabled: default_request_log_enabled(),
        }
    }
}

impl AppConfig {
    /// 用环境变量覆盖配置项
    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.api_key = key;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.model = model;
        }
        if let Some(base_url) = lookup("GEMINI_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(bind) = lookup("POSTGEN_BIND") {
            self.bind_addr = bind;
        }
        if let Some(origins) = lookup("POSTGEN_ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
    }
}

/// 全局配置单例
static CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    let mut config = load_config_from_file().unwrap_or_default();
    config.apply_env_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    RwLock::new(config)
});

/// 从文件加载配置
fn load_config_from_file() -> Option<AppConfig> {
    let path = get_config_path();
    if !path.exists() {
        return None;
    }

    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Ignoring invalid config file {}: {}", path.display(), e);
            None
        }
    }
}

/// 获取当前配置（克隆）
pub fn get_config() -> AppConfig {
    CONFIG.read().clone()
}
