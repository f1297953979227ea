//! 固定窗口限流器
//!
//! 每个客户端标识一个计数窗口。窗口内请求数达到上限后直接拒绝，不排队。

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// 单个客户端的计数窗口
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

/// 限流判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// 放行，附带窗口内剩余额度
    Admitted { remaining: u32 },
    /// 拒绝，附带距窗口重置的时间
    Rejected { retry_after: Duration },
}

/// 限流器
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window(), config.max_requests)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 检查并记录一次请求
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// 指定当前时间的检查（便于测试）
    ///
    /// entry 持有分片写锁，判断和计数是原子的
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(RateWindow {
            count: 0,
            window_start: now,
        });
        let state = entry.value_mut();

        if now.saturating_duration_since(state.window_start) >= self.window {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= self.max_requests {
            let elapsed = now.saturating_duration_since(state.window_start);
            return RateDecision::Rejected {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        state.count += 1;
        RateDecision::Admitted {
            remaining: self.max_requests - state.count,
        }
    }

    /// 清理已过期的窗口，返回清理数量
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn sweep_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < self.window);
        before - self.windows.len()
    }
}
