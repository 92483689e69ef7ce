//! 事件仓储
//!
//! 统计查询直接在 `market_events` 上聚合，不维护物化结果

use async_trait::async_trait;
use shisha_shared::error::Result;
use sqlx::PgPool;

use crate::models::{NewEvent, StoredEvent};

/// 事件仓储接口
///
/// 返回共享错误类型，消费者据此判断是否重试
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert(&self, event: &NewEvent) -> Result<StoredEvent>;

    /// 指定类型事件数最多的发起人，并列时取用户名字典序最小者
    async fn top_actor(&self, event_type: &str) -> Result<Option<String>>;

    /// 购买事件金额之和
    async fn money_earned(&self) -> Result<i64>;

    async fn uploads_count(&self) -> Result<i64>;

    /// 按事件时间倒序返回最近 `limit` 条
    async fn recent(&self, limit: i64) -> Result<Vec<StoredEvent>>;

    async fn ping(&self) -> Result<()>;
}

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn insert(&self, event: &NewEvent) -> Result<StoredEvent> {
        let stored = sqlx::query_as::<_, StoredEvent>(
            r#"
            INSERT INTO market_events (actor, event_type, image_uuid, amount, target, event_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, actor, event_type, image_uuid, amount, target, event_date
            "#,
        )
        .bind(&event.actor)
        .bind(&event.event_type)
        .bind(&event.image_uuid)
        .bind(event.amount)
        .bind(&event.target)
        .bind(event.event_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn top_actor(&self, event_type: &str) -> Result<Option<String>> {
        let actor = sqlx::query_scalar::<_, String>(
            r#"
            SELECT actor
            FROM market_events
            WHERE event_type = $1
            GROUP BY actor
            ORDER BY COUNT(*) DESC, actor
            LIMIT 1
            "#,
        )
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(actor)
    }

    async fn money_earned(&self) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM market_events
            WHERE event_type = 'buy'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn uploads_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM market_events WHERE event_type = 'upload'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredEvent>> {
        let events = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT id, actor, event_type, image_uuid, amount, target, event_date
            FROM market_events
            ORDER BY event_date DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
