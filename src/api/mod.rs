//! API 路由模块

mod generate;
mod health;
mod rate_limit;

pub use generate::generate_routes;
pub use health::health_routes;

use axum::Router;

use crate::state::AppState;
use std::sync::Arc;

/// 创建所有 API 路由
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(generate_routes(Arc::clone(&state)))
        .with_state(state)
}
