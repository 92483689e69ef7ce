//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 业务错误（余额不足、重复购买等）由各服务自己的错误类型表达。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum ShishaError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // ==================== 缓存错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    // ==================== Kafka 错误 ====================
    #[error("Kafka 错误: {0}")]
    Kafka(String),

    // ==================== 对象存储错误 ====================
    #[error("对象存储错误: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("无效的对象存储地址: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ==================== 外部服务错误 ====================
    #[error("HTTP 下载失败: {0}")]
    Http(#[from] reqwest::Error),

    // ==================== 通用错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, ShishaError>;

impl ShishaError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::ObjectStore(_) => "OBJECT_STORE_ERROR",
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::Http(_) => "HTTP_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Redis(_) | Self::Kafka(_) | Self::ObjectStore(_) | Self::Http(_)
        )
    }

    /// 是否为唯一约束冲突
    ///
    /// PostgreSQL 唯一约束冲突的 SQLSTATE 为 23505，仓储层据此把插入失败
    /// 转换为"已存在"类业务错误。
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
