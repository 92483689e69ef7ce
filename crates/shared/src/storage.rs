//! 对象存储模块
//!
//! 基于 object_store 的 S3 兼容实现（MinIO），管理付费图片与用户图片两个 bucket，
//! 提供写入、删除和预签名下载地址生成。
//!
//! 配置了 `public_host` 时，预签名地址直接以对外地址签名：SigV4 签名包含 host，
//! 签名后再替换主机会导致校验失败。

use std::time::Duration;

use axum::http::Method;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::StorageConfig;
use crate::error::{Result, ShishaError};

/// 存储桶
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// 付费图片，对象键为 `<hash>.jpg`
    Premium,
    /// 用户上传图片，对象键为 `<uuid>/<原始文件名>`
    User,
}

/// 一对 bucket 客户端
#[derive(Clone)]
struct BucketPair {
    premium: AmazonS3,
    user: AmazonS3,
}

impl BucketPair {
    fn new(config: &StorageConfig, endpoint: &str) -> Result<Self> {
        Ok(Self {
            premium: build_store(config, endpoint, &config.premium_bucket)?,
            user: build_store(config, endpoint, &config.user_bucket)?,
        })
    }

    fn get(&self, bucket: Bucket) -> &AmazonS3 {
        match bucket {
            Bucket::Premium => &self.premium,
            Bucket::User => &self.user,
        }
    }
}

fn build_store(config: &StorageConfig, endpoint: &str, bucket: &str) -> Result<AmazonS3> {
    AmazonS3Builder::new()
        .with_endpoint(endpoint)
        .with_bucket_name(bucket)
        .with_region(&config.region)
        .with_access_key_id(&config.access_key)
        .with_secret_access_key(&config.secret_key)
        .with_allow_http(config.allow_http)
        .build()
        .map_err(ShishaError::from)
}

/// S3 兼容对象存储客户端
#[derive(Clone)]
pub struct ObjectStorage {
    /// 读写使用内部地址
    stores: BucketPair,
    /// 预签名使用对外地址，未配置时与 `stores` 相同
    signers: BucketPair,
    signing_endpoint: String,
    presign_expiry: Duration,
}

impl ObjectStorage {
    /// 创建两个 bucket 的客户端（不会发起网络请求）
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let stores = BucketPair::new(config, &config.endpoint)?;

        let public_host = config.public_host.as_deref().filter(|h| !h.is_empty());
        let (signers, signing_endpoint) = match public_host {
            Some(host) => {
                let endpoint = public_endpoint(&config.endpoint, host)?;
                (BucketPair::new(config, &endpoint)?, endpoint)
            }
            None => (stores.clone(), config.endpoint.clone()),
        };

        info!(
            endpoint = %config.endpoint,
            signing_endpoint = %signing_endpoint,
            premium_bucket = %config.premium_bucket,
            user_bucket = %config.user_bucket,
            "Object storage client created"
        );

        Ok(Self {
            stores,
            signers,
            signing_endpoint,
            presign_expiry: Duration::from_secs(config.presign_expiry_secs),
        })
    }

    /// 预签名地址所用的端点
    pub fn signing_endpoint(&self) -> &str {
        &self.signing_endpoint
    }

    /// 写入对象
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn put(&self, bucket: Bucket, key: &str, data: Bytes) -> Result<()> {
        let path = Path::from(key);
        self.stores.get(bucket).put(&path, PutPayload::from(data)).await?;
        debug!(?bucket, key, "Object stored");
        Ok(())
    }

    /// 删除对象
    #[instrument(skip(self))]
    pub async fn delete(&self, bucket: Bucket, key: &str) -> Result<()> {
        let path = Path::from(key);
        self.stores.get(bucket).delete(&path).await?;
        Ok(())
    }

    /// 生成预签名下载地址
    pub async fn presigned_get(&self, bucket: Bucket, key: &str) -> Result<String> {
        let path = Path::from(key);
        let url = self
            .signers
            .get(bucket)
            .signed_url(Method::GET, &path, self.presign_expiry)
            .await?;
        Ok(url.to_string())
    }

    /// 健康检查：列举两个 bucket 的根目录
    pub async fn health_check(&self) -> Result<()> {
        self.stores.premium.list_with_delimiter(None).await?;
        self.stores.user.list_with_delimiter(None).await?;
        Ok(())
    }
}

/// 内部端点换成对外主机后的端点，保留协议
fn public_endpoint(endpoint: &str, host: &str) -> Result<String> {
    let url = override_host(Url::parse(endpoint)?, host)?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// 将 URL 的主机（及端口）替换为 `host`，路径与查询串保持不变
///
/// `host` 可带端口（`cdn.example.com:8443`），不带端口时移除原端口。
pub fn override_host(mut url: Url, host: &str) -> Result<Url> {
    let (hostname, port) = match host.rsplit_once(':') {
        Some((name, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| ShishaError::Internal(format!("无效的端口 {port}: {e}")))?;
            (name, Some(port))
        }
        None => (host, None),
    };

    url.set_host(Some(hostname))?;
    url.set_port(port)
        .map_err(|_| ShishaError::Internal(format!("无法为 {url} 设置端口")))?;

    Ok(url)
}
