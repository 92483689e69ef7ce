//! 统计查询处理器

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;

use crate::error::{DashboardError, Result};
use crate::models::{DashboardStats, RecentEvent};
use crate::service::RECENT_EVENTS_LIMIT;
use crate::state::AppState;

const MAX_RECENT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// 看板汇总
///
/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    let stats = state.stats.stats().await?;
    Ok(Json(stats))
}

/// 最近事件，默认 10 条
///
/// GET /api/events/recent?limit=N
pub async fn recent_events(
    State(state): State<AppState>,
    query: std::result::Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<Vec<RecentEvent>>> {
    let Query(query) = query.map_err(|e| DashboardError::Validation(e.body_text()))?;
    let limit = query.limit.unwrap_or(RECENT_EVENTS_LIMIT);
    if !(1..=MAX_RECENT_LIMIT).contains(&limit) {
        return Err(DashboardError::Validation(format!(
            "limit must be between 1 and {MAX_RECENT_LIMIT}"
        )));
    }

    let events = state.stats.recent(limit).await?;
    Ok(Json(events))
}
