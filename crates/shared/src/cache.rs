//! Redis 缓存管理模块
//!
//! 上传去重依赖 Redis 中的内容哈希标记：键存在即表示同内容的图片已被上传过。

use crate::config::RedisConfig;
use crate::error::{Result, ShishaError};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{info, instrument};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(ShishaError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(ShishaError::from)
    }

    /// 检查键是否存在
    #[instrument(skip(self))]
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    /// 设置不过期的值
    #[instrument(skip(self, value))]
    pub async fn set_persistent(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    /// 仅在键不存在时设置，返回是否设置成功
    ///
    /// 基于 Redis SET NX 实现，用于并发上传同一内容时只放行一个请求。
    #[instrument(skip(self, value))]
    pub async fn set_nx_persistent(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(result.is_some())
    }

    /// 删除值
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// 缓存键生成器
pub struct CacheKey;

impl CacheKey {
    /// 图片内容哈希标记
    pub fn content_hash(hash: &str) -> String {
        format!("image:hash:{}", hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_generation() {
        assert_eq!(CacheKey::content_hash("abc123"), "image:hash:abc123");
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_set_nx_only_once() {
        let cache = Cache::new(&RedisConfig::default()).unwrap();
        let key = CacheKey::content_hash("test-set-nx");
        cache.delete(&key).await.unwrap();

        assert!(cache.set_nx_persistent(&key, "1").await.unwrap());
        assert!(!cache.set_nx_persistent(&key, "1").await.unwrap());
        assert!(cache.exists(&key).await.unwrap());

        cache.delete(&key).await.unwrap();
    }
}
