//! 看板数据模型

use chrono::{DateTime, Utc};
use serde::Serialize;
use shisha_shared::events::MarketEvent;
use sqlx::FromRow;

/// 已入库的市场事件
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StoredEvent {
    pub id: i64,
    pub actor: String,
    pub event_type: String,
    pub image_uuid: Option<String>,
    pub amount: Option<i64>,
    pub target: Option<String>,
    pub event_date: DateTime<Utc>,
}

/// 待写入的事件，`event_date` 取消费时刻
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub actor: String,
    pub event_type: String,
    pub image_uuid: Option<String>,
    pub amount: Option<i64>,
    pub target: Option<String>,
    pub event_date: DateTime<Utc>,
}

impl NewEvent {
    pub fn from_market_event(event: &MarketEvent, event_date: DateTime<Utc>) -> Self {
        Self {
            actor: event.actor().to_string(),
            event_type: event.event_type().to_string(),
            image_uuid: event.image_uuid().map(str::to_string),
            amount: event.amount(),
            target: event.target().map(str::to_string),
            event_date,
        }
    }
}

/// 最近事件条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEvent {
    pub actor: String,
    pub event_type: String,
    pub event_date: DateTime<Utc>,
}

impl From<StoredEvent> for RecentEvent {
    fn from(event: StoredEvent) -> Self {
        Self {
            actor: event.actor,
            event_type: event.event_type,
            event_date: event.event_date,
        }
    }
}

/// 看板统计
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// 购买次数最多的用户，无购买记录时为 null
    pub top_buyer: Option<String>,
    /// 上传次数最多的用户
    pub top_uploader: Option<String>,
    /// 付费图片累计收入
    pub money_earned: i64,
    pub uploads_count: i64,
    pub last_events: Vec<RecentEvent>,
}
