//! 健康检查处理器

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::state::AppState;

/// 存活探针：服务进程正常即返回 ok
///
/// GET /live
pub async fn live() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "shisha-inventory-service"
    }))
}

/// 就绪探针：逐项检查数据库、缓存与消息队列
///
/// GET /ready，任一依赖不可用时返回 503
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut checks = Map::new();
    let mut all_ok = true;

    for (name, checker) in state.health_checks.iter() {
        let status = match checker.check().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!(dependency = *name, error = %e, "依赖检查失败");
                all_ok = false;
                "fail"
            }
        };
        checks.insert((*name).to_string(), Value::from(status));
    }

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if all_ok { "ok" } else { "degraded" },
            "service": "shisha-inventory-service",
            "checks": checks
        })),
    )
}
