//! 工具模块

pub mod rate_limiter;
pub mod request_logger;

pub use rate_limiter::{RateDecision, RateLimiter};
pub use request_logger::RequestLogger;
