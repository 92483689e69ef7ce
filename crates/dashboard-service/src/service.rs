//! 看板统计服务

use std::sync::Arc;

use tracing::instrument;

use crate::error::Result;
use crate::models::{DashboardStats, RecentEvent};
use crate::repository::EventRepository;

/// 默认返回的最近事件条数
pub const RECENT_EVENTS_LIMIT: i64 = 10;

pub struct StatsService {
    repo: Arc<dyn EventRepository>,
}

impl StatsService {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    /// 汇总统计，各项查询并发执行
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<DashboardStats> {
        let (top_buyer, top_uploader, money_earned, uploads_count, last_events) = tokio::try_join!(
            self.repo.top_actor("buy"),
            self.repo.top_actor("upload"),
            self.repo.money_earned(),
            self.repo.uploads_count(),
            self.repo.recent(RECENT_EVENTS_LIMIT),
        )?;

        Ok(DashboardStats {
            top_buyer,
            top_uploader,
            money_earned,
            uploads_count,
            last_events: last_events.into_iter().map(RecentEvent::from).collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn recent(&self, limit: i64) -> Result<Vec<RecentEvent>> {
        let events = self.repo.recent(limit).await?;
        Ok(events.into_iter().map(RecentEvent::from).collect())
    }

    pub async fn ping(&self) -> Result<()> {
        Ok(self.repo.ping().await?)
    }
}
