//! 市场事件消费
//!
//! 每条消息解析为 [`MarketEvent`] 后写入 `market_events`。
//! 无法识别的消息记录日志后跳过；写库失败返回可重试错误，
//! 由消费循环退避重试直到成功，成功前不存储 offset。

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use shisha_shared::error::ShishaError;
use shisha_shared::events::MarketEvent;
use shisha_shared::kafka::ConsumerMessage;
use shisha_shared::observability::metrics::record_saved_event;
use tracing::{debug, warn};

use crate::models::NewEvent;
use crate::repository::EventRepository;

#[derive(Clone)]
pub struct EventHandler {
    repo: Arc<dyn EventRepository>,
}

impl EventHandler {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    pub async fn handle(&self, message: ConsumerMessage) -> Result<(), ShishaError> {
        let event = match serde_json::from_slice::<MarketEvent>(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                match unknown_type(&message.payload) {
                    Some(event_type) => warn!(
                        event_type = %event_type,
                        offset = message.offset,
                        "未知的事件类型，跳过"
                    ),
                    None => warn!(error = %e, offset = message.offset, "事件格式错误，跳过"),
                }
                return Ok(());
            }
        };

        let row = NewEvent::from_market_event(&event, Utc::now());
        let stored = self.repo.insert(&row).await?;
        record_saved_event(event.event_type());

        debug!(
            id = stored.id,
            actor = %stored.actor,
            event_type = %stored.event_type,
            "市场事件已入库"
        );
        Ok(())
    }
}

/// 载荷是合法 JSON 但 `type` 不在已知范围内时返回该类型
fn unknown_type(payload: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(payload).ok()?;
    let event_type = value.get("type")?.as_str()?;
    match event_type {
        "transfer" | "upload" | "buy" => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoredEvent;
    use crate::repository::MockEventRepository;

    fn message(payload: &str) -> ConsumerMessage {
        ConsumerMessage {
            topic: "shisha".into(),
            partition: 0,
            offset: 7,
            key: Some("alice".into()),
            payload: payload.as_bytes().to_vec(),
            timestamp: None,
        }
    }

    fn stored(row: &NewEvent) -> StoredEvent {
        StoredEvent {
            id: 1,
            actor: row.actor.clone(),
            event_type: row.event_type.clone(),
            image_uuid: row.image_uuid.clone(),
            amount: row.amount,
            target: row.target.clone(),
            event_date: row.event_date,
        }
    }

    #[tokio::test]
    async fn test_buy_event_is_stored() {
        let mut repo = MockEventRepository::new();
        repo.expect_insert()
            .withf(|row| {
                row.actor == "alice"
                    && row.event_type == "buy"
                    && row.amount == Some(25)
                    && row.image_uuid.as_deref() == Some("img-1")
            })
            .times(1)
            .returning(|row| Ok(stored(row)));

        let handler = EventHandler::new(Arc::new(repo));
        let result = handler
            .handle(message(
                r#"{"type":"buy","user":"alice","image_uuid":"img-1","amount":25}"#,
            ))
            .await;

        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_unknown_type_is_skipped() {
        let mut repo = MockEventRepository::new();
        repo.expect_insert().never();

        let handler = EventHandler::new(Arc::new(repo));
        let result = handler
            .handle(message(r#"{"type":"refund","user":"alice","amount":5}"#))
            .await;

        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_skipped() {
        let mut repo = MockEventRepository::new();
        repo.expect_insert().never();

        let handler = EventHandler::new(Arc::new(repo));
        tokio_test::assert_ok!(handler.handle(message("not json")).await);
    }

    #[tokio::test]
    async fn test_database_failure_is_retryable() {
        let mut repo = MockEventRepository::new();
        repo.expect_insert()
            .times(1)
            .returning(|_| Err(ShishaError::Database(sqlx::Error::PoolTimedOut)));

        let handler = EventHandler::new(Arc::new(repo));
        let err = handler
            .handle(message(r#"{"type":"upload","user":"alice","image_uuid":"u"}"#))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[test]
    fn test_unknown_type_detection() {
        assert_eq!(unknown_type(br#"{"type":"refund"}"#), Some("refund".to_string()));
        assert_eq!(unknown_type(br#"{"type":"buy"}"#), None);
        assert_eq!(unknown_type(b"garbage"), None);
    }
}
