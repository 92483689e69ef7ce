//! 健康检查处理器

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

/// 存活探针
///
/// GET /ready
pub async fn ready() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "shisha-dashboard-service"
    }))
}

/// 数据库可用性检查
///
/// GET /health，数据库不可达时返回 503
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.stats.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "database": "ok" }
            })),
        ),
        Err(e) => {
            warn!(error = %e, "数据库检查失败");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "checks": { "database": "fail" }
                })),
            )
        }
    }
}
