//! 文章生成与联想建议端点

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::rate_limit::rate_limit;
use crate::error::{AppError, AppResult};
use crate::models::{GeneratePostRequest, GeneratePostResponse, SuggestionsRequest, SuggestionsResponse};
use crate::services::Style;
use crate::state::AppState;

/// 生成文章
async fn generate_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GeneratePostRequest>, JsonRejection>,
) -> AppResult<Json<GeneratePostResponse>> {
    let Json(req) = payload
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;

    let topic = req
        .topic
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Topic is required".to_string()))?;
    let style = Style::from_label(req.style.as_deref().unwrap_or_default());

    info!(
        "Received generation request: style={}, topic_len={}",
        style.label(),
        topic.chars().count()
    );

    let result = state.generation.generate(topic, style).await?;
    Ok(Json(result))
}

/// 联想建议，任何失败都返回空列表
async fn generate_suggestions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SuggestionsRequest>, JsonRejection>,
) -> Json<SuggestionsResponse> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(e) => {
            warn!("Invalid suggestions request: {}", e.body_text());
            SuggestionsRequest::default()
        }
    };

    let suggestions = state.suggestions.suggest(req.query.as_deref()).await;
    Json(SuggestionsResponse { suggestions })
}

/// 创建生成路由，限流只作用于文章生成
pub fn generate_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let limited = Router::new()
        .route("/generate-post", post(generate_post))
        .route_layer(middleware::from_fn_with_state(state, rate_limit));

    Router::new()
        .merge(limited)
        .route("/generate-suggestions", post(generate_suggestions))
}
