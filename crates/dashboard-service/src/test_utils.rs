//! 测试工具模块
//!
//! 事件仓储的内存实现与组装好的测试应用

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use shisha_shared::error::{Result, ShishaError};
use shisha_shared::events::MarketEvent;
use shisha_shared::kafka::ConsumerMessage;

use crate::consumer::EventHandler;
use crate::models::{NewEvent, StoredEvent};
use crate::repository::EventRepository;
use crate::routes;
use crate::state::AppState;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 内存事件表
#[derive(Clone, Default)]
pub struct InMemoryEventRepository {
    events: Arc<Mutex<Vec<StoredEvent>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的所有操作都返回数据库错误
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn events(&self) -> Vec<StoredEvent> {
        lock(&self.events).clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ShishaError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn insert(&self, event: &NewEvent) -> Result<StoredEvent> {
        self.check_available()?;
        let mut events = lock(&self.events);
        let stored = StoredEvent {
            id: events.len() as i64 + 1,
            actor: event.actor.clone(),
            event_type: event.event_type.clone(),
            image_uuid: event.image_uuid.clone(),
            amount: event.amount,
            target: event.target.clone(),
            event_date: event.event_date,
        };
        events.push(stored.clone());
        Ok(stored)
    }

    async fn top_actor(&self, event_type: &str) -> Result<Option<String>> {
        self.check_available()?;
        let events = lock(&self.events);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for event in events.iter().filter(|e| e.event_type == event_type) {
            *counts.entry(event.actor.as_str()).or_default() += 1;
        }

        // 次数倒序，并列时用户名升序
        let top = counts
            .into_iter()
            .max_by(|(a_name, a_count), (b_name, b_count)| {
                a_count.cmp(b_count).then_with(|| b_name.cmp(a_name))
            })
            .map(|(name, _)| name.to_string());
        Ok(top)
    }

    async fn money_earned(&self) -> Result<i64> {
        self.check_available()?;
        let total = lock(&self.events)
            .iter()
            .filter(|e| e.event_type == "buy")
            .filter_map(|e| e.amount)
            .sum();
        Ok(total)
    }

    async fn uploads_count(&self) -> Result<i64> {
        self.check_available()?;
        let count = lock(&self.events)
            .iter()
            .filter(|e| e.event_type == "upload")
            .count();
        Ok(count as i64)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredEvent>> {
        self.check_available()?;
        let mut events = lock(&self.events).clone();
        events.sort_by(|a, b| b.event_date.cmp(&a.event_date).then(b.id.cmp(&a.id)));
        events.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(events)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

/// 组装好的测试应用
#[derive(Clone)]
pub struct TestApp {
    pub repo: InMemoryEventRepository,
    pub handler: EventHandler,
    pub state: AppState,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let repo = InMemoryEventRepository::new();
        let shared: Arc<dyn EventRepository> = Arc::new(repo.clone());

        Self {
            handler: EventHandler::new(shared.clone()),
            state: AppState::new(shared),
            repo,
        }
    }

    pub fn router(&self) -> Router {
        routes::app(self.state.clone())
    }

    /// 以 Kafka 消息的形式投递事件
    pub async fn deliver(&self, event: &MarketEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.deliver_raw(&payload).await
    }

    pub async fn deliver_raw(&self, payload: &[u8]) -> Result<()> {
        let offset = self.repo.len() as i64;
        self.handler.handle(consumer_message(payload, offset)).await
    }

    /// 直接写入指定时间的事件
    pub async fn insert_at(&self, event: &MarketEvent, event_date: DateTime<Utc>) {
        let row = NewEvent::from_market_event(event, event_date);
        if let Err(e) = self.repo.insert(&row).await {
            panic!("写入测试事件失败: {e}");
        }
    }
}

pub fn consumer_message(payload: &[u8], offset: i64) -> ConsumerMessage {
    ConsumerMessage {
        topic: "shisha".to_string(),
        partition: 0,
        offset,
        key: None,
        payload: payload.to_vec(),
        timestamp: None,
    }
}
