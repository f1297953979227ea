//! 限流中间件

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::RateDecision;

/// 取客户端标识：可信代理头 → 对端 IP → "unknown"
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 超限直接返回 429，不进入后续处理器
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(
        request.headers(),
        peer.map(|ConnectInfo(addr)| addr),
        state.trust_proxy,
    );

    match state.rate_limiter.check(&key) {
        RateDecision::Admitted { remaining } => {
            debug!("Rate limit admitted: client={}, remaining={}", key, remaining);
            Ok(next.run(request).await)
        }
        RateDecision::Rejected { retry_after } => {
            warn!("Rate limit exceeded: client={}", key);
            let window_secs = state.rate_limiter.window().as_secs();
            Err(AppError::RateLimited {
                window_minutes: window_secs.div_ceil(60),
                retry_after_secs: retry_after.as_secs().max(1),
            })
        }
    }
}
