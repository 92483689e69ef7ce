//! 市场事件发布
//!
//! 业务操作提交后发布事件。序列化在请求内同步完成，失败即返回错误；
//! 投递放到后台任务，请求不等待 broker 确认，投递失败只记录日志。

use shisha_shared::error::ShishaError;
use shisha_shared::events::MarketEvent;
use shisha_shared::kafka::KafkaProducer;
use tracing::{debug, warn};

/// 事件发布接口
#[cfg_attr(test, mockall::automock)]
pub trait EventPublisher: Send + Sync {
    /// 入队一个事件，不等待投递结果
    fn publish(&self, event: MarketEvent) -> Result<(), ShishaError>;
}

/// 基于 Kafka 的事件发布器
#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: KafkaProducer,
}

impl KafkaEventPublisher {
    pub fn new(producer: KafkaProducer) -> Self {
        Self { producer }
    }
}

impl EventPublisher for KafkaEventPublisher {
    fn publish(&self, event: MarketEvent) -> Result<(), ShishaError> {
        let payload = serde_json::to_vec(&event)?;
        let key = event.actor().to_string();
        let event_type = event.event_type();
        let producer = self.producer.clone();

        tokio::spawn(async move {
            match producer.send(&key, &payload).await {
                Ok((partition, offset)) => {
                    debug!(event_type, user = %key, partition, offset, "事件已投递");
                }
                Err(e) => {
                    warn!(event_type, user = %key, error = %e, "事件投递失败");
                }
            }
        });

        Ok(())
    }
}
