//! 路由配置模块

use axum::{Router, middleware, routing::get};
use shisha_shared::observability::middleware as obs_middleware;
use tower_http::cors::CorsLayer;

use crate::{handlers, state::AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::stats::stats))
        .route("/events/recent", get(handlers::stats::recent_events))
}

/// 构建完整应用：API、探针与全局中间件
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
