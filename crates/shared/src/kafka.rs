//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为 Producer/Consumer/Admin 三个抽象，
//! 统一消息序列化、错误映射和优雅关闭语义。

use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::ShishaError;

/// handler 可重试失败时的退避间隔
#[derive(Debug, Clone, Copy)]
struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    const DEFAULT: Self = Self {
        initial: Duration::from_millis(500),
        max: Duration::from_secs(30),
    };

    /// 第 `attempt` 次失败后的等待时间，指数增长并封顶
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// 一条消息处理结束后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// 已处理或为坏消息，存储 offset
    Commit,
    /// 重试期间收到关闭信号，不存储 offset
    Abandon,
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
}

impl ConsumerMessage {
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
            timestamp: msg.timestamp().to_millis(),
        }
    }

    /// 将负载视为 UTF-8 字符串返回
    pub fn payload_str(&self) -> Result<&str, ShishaError> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| ShishaError::Kafka(format!("负载非 UTF-8 编码: {e}")))
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, ShishaError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| ShishaError::Kafka(format!("负载反序列化失败: {e}")))
    }
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// `FutureProducer` 内部为 Arc 包装，克隆开销很小，可以直接移入后台发送任务。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaProducer {
    /// 根据配置创建生产者，消息统一发往 `config.topic`
    pub fn new(config: &KafkaConfig) -> Result<Self, ShishaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| ShishaError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, topic = %config.topic, "Kafka 生产者已初始化");
        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 发送原始字节消息
    pub async fn send(&self, key: &str, payload: &[u8]) -> Result<(i32, i64), ShishaError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| ShishaError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic = %self.topic,
            key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }

    /// 将值序列化为 JSON 后发送
    pub async fn send_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(i32, i64), ShishaError> {
        let payload = serde_json::to_vec(value)?;
        self.send(key, &payload).await
    }

    /// 健康检查：拉取 topic 元数据
    ///
    /// `fetch_metadata` 为阻塞调用，放到 blocking 线程池执行。
    pub async fn health_check(&self) -> Result<(), ShishaError> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();

        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), Duration::from_secs(3))
                .map(|_| ())
                .map_err(|e| ShishaError::Kafka(format!("获取元数据失败: {e}")))
        })
        .await
        .map_err(|e| ShishaError::Internal(format!("健康检查任务异常: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Topic 管理
// ---------------------------------------------------------------------------

/// 确保 topic 存在，不存在时以 1 分区 1 副本创建
pub async fn ensure_topic(config: &KafkaConfig) -> Result<(), ShishaError> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .create()
        .map_err(|e| ShishaError::Kafka(format!("创建管理客户端失败: {e}")))?;

    let topic = NewTopic::new(&config.topic, 1, TopicReplication::Fixed(1));
    let options = AdminOptions::new().operation_timeout(Some(Duration::from_secs(10)));

    let results = admin
        .create_topics(&[topic], &options)
        .await
        .map_err(|e| ShishaError::Kafka(format!("创建 topic 失败: {e}")))?;

    for result in results {
        match result {
            Ok(name) => info!(topic = %name, "Kafka topic 已创建"),
            Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                debug!(topic = %name, "Kafka topic 已存在")
            }
            Err((name, code)) => {
                return Err(ShishaError::Kafka(format!("创建 topic {name} 失败: {code}")));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 关闭自动存储 offset：只有 handler 成功处理后才存储该消息的 offset，
/// 再由自动提交周期性提交已存储的 offset。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self, ShishaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .create()
            .map_err(|e| ShishaError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            "Kafka 消费者已初始化"
        );
        Ok(Self { consumer })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), ShishaError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| ShishaError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 启动消费循环
    ///
    /// - handler 返回可重试错误时按指数退避反复重试，期间不拉取同一分区的后续消息，
    ///   因此不会有更晚的 offset 越过失败的消息被提交。
    /// - 不可重试错误视为坏消息，存储 offset 后跳过。
    /// - 关闭信号变为 `true` 时退出循环；正在重试的消息不存储 offset，重启后再次投递。
    pub async fn start<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), ShishaError>>,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!("Kafka 消费循环已启动");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                }

                msg_result = stream.next() => {
                    let Some(msg_result) = msg_result else {
                        warn!("Kafka 消息流意外结束");
                        break;
                    };

                    // BorrowedMessage 不是 Send，转换后立即释放
                    let msg = match msg_result {
                        Ok(borrowed_msg) => ConsumerMessage::from_borrowed(&borrowed_msg),
                        Err(e) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                            continue;
                        }
                    };

                    debug!(
                        topic = %msg.topic,
                        partition = msg.partition,
                        offset = msg.offset,
                        "收到 Kafka 消息"
                    );

                    match handle_with_retry(&handler, &msg, Backoff::DEFAULT, &mut shutdown).await {
                        Disposition::Commit => self.store_offset(&msg),
                        Disposition::Abandon => {
                            info!(offset = msg.offset, "收到关闭信号，放弃重试，Kafka 消费循环退出");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn store_offset(&self, msg: &ConsumerMessage) {
        // 存储的是下一条待消费消息的位置
        if let Err(e) = self
            .consumer
            .store_offset(&msg.topic, msg.partition, msg.offset + 1)
        {
            error!(error = %e, offset = msg.offset, "存储 Kafka offset 失败");
        }
    }
}

/// 处理单条消息，可重试错误一直重试到成功或收到关闭信号
async fn handle_with_retry<F, Fut>(
    handler: &F,
    msg: &ConsumerMessage,
    backoff: Backoff,
    shutdown: &mut watch::Receiver<bool>,
) -> Disposition
where
    F: Fn(ConsumerMessage) -> Fut,
    Fut: std::future::Future<Output = Result<(), ShishaError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let err = match handler(msg.clone()).await {
            Ok(()) => return Disposition::Commit,
            Err(e) if !e.is_retryable() => {
                error!(error = %e, offset = msg.offset, "Kafka 消息无法处理，跳过");
                return Disposition::Commit;
            }
            Err(e) => e,
        };

        let delay = backoff.delay(attempt);
        warn!(
            error = %err,
            attempt,
            offset = msg.offset,
            delay_ms = delay.as_millis() as u64,
            "处理 Kafka 消息失败，等待后重试"
        );

        if *shutdown.borrow() {
            return Disposition::Abandon;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown.changed() => {
                // 发送端已关闭同样视为关闭
                if changed.is_err() || *shutdown.borrow() {
                    return Disposition::Abandon;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn message(payload: &[u8]) -> ConsumerMessage {
        ConsumerMessage {
            topic: "shisha".to_string(),
            partition: 0,
            offset: 7,
            key: None,
            payload: payload.to_vec(),
            timestamp: None,
        }
    }

    #[test]
    fn test_consumer_message_deserialize() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Event {
            user: String,
            amount: i64,
        }

        let msg = message(br#"{"user":"alice","amount":10}"#);
        let event: Event = msg.deserialize_payload().unwrap();
        assert_eq!(
            event,
            Event {
                user: "alice".to_string(),
                amount: 10,
            }
        );
    }

    #[test]
    fn test_consumer_message_deserialize_invalid_json() {
        let msg = message(b"not json");
        let result: Result<serde_json::Value, _> = msg.deserialize_payload();
        assert!(result.is_err());
    }

    #[test]
    fn test_consumer_message_payload_str_invalid_utf8() {
        assert_eq!(message(b"hello").payload_str().unwrap(), "hello");
        assert!(message(&[0xFF, 0xFE]).payload_str().is_err());
    }

    const FAST: Backoff = Backoff {
        initial: Duration::from_millis(1),
        max: Duration::from_millis(4),
    };

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = Backoff::DEFAULT;
        assert_eq!(backoff.delay(1), Duration::from_millis(500));
        assert_eq!(backoff.delay(2), Duration::from_secs(1));
        assert_eq!(backoff.delay(4), Duration::from_secs(4));
        assert_eq!(backoff.delay(20), Duration::from_secs(30));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(30));
    }

    /// 前 `failures` 次返回可重试错误，之后成功
    fn flaky_handler(
        failures: u32,
        calls: Arc<AtomicU32>,
    ) -> impl Fn(ConsumerMessage) -> std::future::Ready<Result<(), ShishaError>> {
        move |_msg| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                std::future::ready(Err(ShishaError::Kafka("broker unavailable".to_string())))
            } else {
                std::future::ready(Ok(()))
            }
        }
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried_until_success() {
        let (_tx, mut rx) = watch::channel(false);
        let calls = Arc::new(AtomicU32::new(0));
        let handler = flaky_handler(6, calls.clone());

        let disposition = handle_with_retry(&handler, &message(b"{}"), FAST, &mut rx).await;

        assert_eq!(disposition, Disposition::Commit);
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_persistent_failure_is_not_committed_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let handler = move |_msg: ConsumerMessage| {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                let _ = tx.send(true);
            }
            std::future::ready(Err::<(), _>(ShishaError::Kafka("down".to_string())))
        };

        let disposition = handle_with_retry(&handler, &message(b"{}"), FAST, &mut rx).await;

        assert_eq!(disposition, Disposition::Abandon);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_skipped() {
        let (_tx, mut rx) = watch::channel(false);
        let handler = |_msg: ConsumerMessage| async {
            Err::<(), _>(ShishaError::Internal("bad message".to_string()))
        };

        let disposition = handle_with_retry(&handler, &message(b"{}"), FAST, &mut rx).await;
        assert_eq!(disposition, Disposition::Commit);
    }

    #[tokio::test]
    async fn test_success_is_committed() {
        let (_tx, mut rx) = watch::channel(false);
        let calls = Arc::new(AtomicU32::new(0));
        let handler = flaky_handler(0, calls.clone());

        let disposition = handle_with_retry(&handler, &message(b"{}"), FAST, &mut rx).await;
        assert_eq!(disposition, Disposition::Commit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
