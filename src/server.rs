//! 后端服务启动

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::create_api_routes;
use crate::config::AppConfig;
use crate::llm::LlmClient;
use crate::state::{create_shared_state, AppState};
use crate::utils::{RateLimiter, RequestLogger};

/// 只允许白名单中的来源跨域访问
pub fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// 组装完整路由
pub fn build_app(state: Arc<AppState>, config: &AppConfig) -> Router {
    create_api_routes(state)
        .layer(build_cors(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// 定期清理过期的限流窗口
fn spawn_rate_limit_sweeper(limiter: Arc<RateLimiter>) {
    let period = limiter.window().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = limiter.sweep_expired();
            if removed > 0 {
                info!("Swept {} expired rate-limit windows", removed);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// 启动后端服务
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting post generator backend...");

    let client = LlmClient::new(
        &config.api_key,
        &config.base_url,
        &config.model,
        Duration::from_secs(config.request_timeout_secs),
        Duration::from_secs(config.connect_timeout_secs),
    )
    .context("failed to create Gemini client")?;

    let logger = config
        .request_log_enabled
        .then(|| Arc::new(RequestLogger::default()));

    let state = create_shared_state(&config, Arc::new(client), logger);
    spawn_rate_limit_sweeper(Arc::clone(&state.rate_limiter));

    let app = build_app(state, &config);

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.bind_addr))?;
    info!(
        "Server listening on: {} (model={}, allowed_origins={:?})",
        addr, config.model, config.allowed_origins
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    Ok(())
}
