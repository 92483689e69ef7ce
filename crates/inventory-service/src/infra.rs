//! 基础设施适配接口
//!
//! 服务层通过这些 trait 访问对象存储、内容哈希索引和外部下载，
//! 生产环境由 shared 中的客户端实现，测试使用内存实现。

use async_trait::async_trait;
use bytes::Bytes;
use shisha_shared::cache::{Cache, CacheKey};
use shisha_shared::database::Database;
use shisha_shared::error::ShishaError;
use shisha_shared::kafka::KafkaProducer;
use shisha_shared::storage::{Bucket, ObjectStorage};

type InfraResult<T> = std::result::Result<T, ShishaError>;

/// 图片二进制存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: Bucket, key: &str, data: Bytes) -> InfraResult<()>;

    async fn delete(&self, bucket: Bucket, key: &str) -> InfraResult<()>;

    /// 预签名下载地址（已按配置改写对外主机）
    async fn presigned_get(&self, bucket: Bucket, key: &str) -> InfraResult<String>;
}

#[async_trait]
impl BlobStore for ObjectStorage {
    async fn put(&self, bucket: Bucket, key: &str, data: Bytes) -> InfraResult<()> {
        ObjectStorage::put(self, bucket, key, data).await
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> InfraResult<()> {
        ObjectStorage::delete(self, bucket, key).await
    }

    async fn presigned_get(&self, bucket: Bucket, key: &str) -> InfraResult<String> {
        ObjectStorage::presigned_get(self, bucket, key).await
    }
}

/// 内容哈希索引，记录已上传内容的 hash → uuid
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentIndex: Send + Sync {
    async fn contains(&self, hash: &str) -> InfraResult<bool>;

    /// 登记哈希，已存在时返回 false
    async fn claim(&self, hash: &str, image_uuid: &str) -> InfraResult<bool>;

    async fn release(&self, hash: &str) -> InfraResult<()>;
}

#[async_trait]
impl ContentIndex for Cache {
    async fn contains(&self, hash: &str) -> InfraResult<bool> {
        self.exists(&CacheKey::content_hash(hash)).await
    }

    async fn claim(&self, hash: &str, image_uuid: &str) -> InfraResult<bool> {
        self.set_nx_persistent(&CacheKey::content_hash(hash), image_uuid)
            .await
    }

    async fn release(&self, hash: &str) -> InfraResult<()> {
        self.delete(&CacheKey::content_hash(hash)).await
    }
}

/// 依赖可达性检查，供 `/ready` 使用
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> InfraResult<()>;
}

#[async_trait]
impl HealthCheck for Database {
    async fn check(&self) -> InfraResult<()> {
        self.health_check().await
    }
}

#[async_trait]
impl HealthCheck for Cache {
    async fn check(&self) -> InfraResult<()> {
        self.health_check().await
    }
}

#[async_trait]
impl HealthCheck for KafkaProducer {
    async fn check(&self) -> InfraResult<()> {
        self.health_check().await
    }
}

/// 远程图片下载，用于付费图片目录初始化
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> InfraResult<Bytes>;
}

/// 基于 reqwest 的下载实现
#[derive(Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> InfraResult<Bytes> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}
