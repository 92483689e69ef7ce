//! 上传服务
//!
//! 用户上传图片：按内容 SHA-256 去重，写入 user-images，上传者获得 1 金币。
//!
//! ## 上传流程
//!
//! 1. 计算内容哈希 -> 2. 索引预检（已存在返回 409）
//!    -> 3. 登记哈希（SET NX，并发同内容只放行一个）
//!    -> 4. 写入对象 -> 5. 事务内奖励金币并写入图片记录
//!    -> 6. 发布上传事件
//!
//! 第 4、5 步失败时撤销之前的步骤（释放哈希、删除对象）。

use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use shisha_shared::events::MarketEvent;
use shisha_shared::observability::metrics;
use shisha_shared::storage::Bucket;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::outcome_label;
use crate::error::{InventoryError, Result};
use crate::events::EventPublisher;
use crate::infra::{BlobStore, ContentIndex};
use crate::models::{Image, NewImage, User};
use crate::repository::ImageRepository;

/// 每次成功上传的金币奖励
pub const UPLOAD_REWARD: i64 = 1;

/// 上传的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub data: Bytes,
}

/// 内容哈希：SHA-256 小写十六进制
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// 上传服务
pub struct UploadService {
    images: Arc<dyn ImageRepository>,
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn ContentIndex>,
    publisher: Arc<dyn EventPublisher>,
}

impl UploadService {
    pub fn new(
        images: Arc<dyn ImageRepository>,
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn ContentIndex>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            images,
            blobs,
            index,
            publisher,
        }
    }

    /// 上传图片并奖励上传者
    #[instrument(
        skip(self, user, file),
        fields(username = %user.username, file = %file.name, size = file.data.len())
    )]
    pub async fn upload(&self, user: &User, file: UploadedFile) -> Result<Image> {
        let result = self.store(user, file).await;
        metrics::record_image_upload(outcome_label(&result));
        let image = result?;

        self.publisher.publish(MarketEvent::Upload {
            user: image.username.clone(),
            image_uuid: image.uuid.to_string(),
        })?;

        info!(username = %image.username, uuid = %image.uuid, hash = %image.hash, "图片上传成功");
        Ok(image)
    }

    async fn store(&self, user: &User, file: UploadedFile) -> Result<Image> {
        if file.name.trim().is_empty() {
            return Err(InventoryError::Validation("File name is required".to_string()));
        }

        let hash = content_hash(&file.data);
        if self.index.contains(&hash).await? {
            return Err(InventoryError::ImageExists);
        }

        let uuid = Uuid::new_v4();
        if !self.index.claim(&hash, &uuid.to_string()).await? {
            return Err(InventoryError::ImageExists);
        }

        let new_image = NewImage {
            uuid,
            name: file.name,
            username: user.username.clone(),
            hash,
        };
        let key = new_image.object_key();

        if let Err(e) = self.blobs.put(Bucket::User, &key, file.data).await {
            self.release_hash(&new_image.hash).await;
            return Err(e.into());
        }

        match self.images.create_uploaded_image(&new_image, UPLOAD_REWARD).await {
            Ok(image) => Ok(image),
            Err(e) => {
                self.release_hash(&new_image.hash).await;
                if let Err(delete_err) = self.blobs.delete(Bucket::User, &key).await {
                    warn!(key = %key, error = %delete_err, "撤销上传时删除对象失败");
                }
                Err(e)
            }
        }
    }

    async fn release_hash(&self, hash: &str) {
        if let Err(e) = self.index.release(hash).await {
            warn!(hash, error = %e, "撤销上传时释放哈希失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MockEventPublisher;
    use crate::infra::{MockBlobStore, MockContentIndex};
    use crate::repository::MockImageRepository;
    use chrono::Utc;
    use shisha_shared::error::ShishaError;

    fn alice() -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            password_hash: String::new(),
            coins: 100,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn file() -> UploadedFile {
        UploadedFile {
            name: "cat.jpg".to_string(),
            data: Bytes::from_static(b"meow"),
        }
    }

    #[test]
    fn test_content_hash_is_lowercase_sha256() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_duplicate_content_is_rejected_before_any_write() {
        let mut index = MockContentIndex::new();
        index.expect_contains().returning(|_| Ok(true));
        index.expect_claim().never();
        let mut blobs = MockBlobStore::new();
        blobs.expect_put().never();

        let svc = UploadService::new(
            Arc::new(MockImageRepository::new()),
            Arc::new(blobs),
            Arc::new(index),
            Arc::new(MockEventPublisher::new()),
        );

        let err = svc.upload(&alice(), file()).await.unwrap_err();
        assert!(matches!(err, InventoryError::ImageExists));
    }

    #[tokio::test]
    async fn test_lost_claim_race_is_conflict() {
        let mut index = MockContentIndex::new();
        index.expect_contains().returning(|_| Ok(false));
        index.expect_claim().returning(|_, _| Ok(false));
        let mut blobs = MockBlobStore::new();
        blobs.expect_put().never();

        let svc = UploadService::new(
            Arc::new(MockImageRepository::new()),
            Arc::new(blobs),
            Arc::new(index),
            Arc::new(MockEventPublisher::new()),
        );

        let err = svc.upload(&alice(), file()).await.unwrap_err();
        assert!(matches!(err, InventoryError::ImageExists));
    }

    #[tokio::test]
    async fn test_database_failure_compensates_blob_and_hash() {
        let mut index = MockContentIndex::new();
        index.expect_contains().returning(|_| Ok(false));
        let claimed = Arc::new(std::sync::Mutex::new(String::new()));
        let claimed_by_index = claimed.clone();
        index.expect_claim().returning(move |_, uuid| {
            *claimed_by_index.lock().unwrap() = uuid.to_string();
            Ok(true)
        });
        index.expect_release().times(1).returning(|_| Ok(()));

        // 只能删除本次写入的对象，不能波及其他用户的同名文件
        let mut blobs = MockBlobStore::new();
        let claimed_by_put = claimed.clone();
        blobs
            .expect_put()
            .withf(move |bucket, key, _| {
                *bucket == Bucket::User
                    && *key == format!("{}/cat.jpg", claimed_by_put.lock().unwrap())
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let claimed_by_delete = claimed.clone();
        blobs
            .expect_delete()
            .withf(move |bucket, key| {
                *bucket == Bucket::User
                    && *key == format!("{}/cat.jpg", claimed_by_delete.lock().unwrap())
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut images = MockImageRepository::new();
        images
            .expect_create_uploaded_image()
            .returning(|_, _| Err(InventoryError::Internal("db down".to_string())));

        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().never();

        let svc = UploadService::new(
            Arc::new(images),
            Arc::new(blobs),
            Arc::new(index),
            Arc::new(publisher),
        );

        let err = svc.upload(&alice(), file()).await.unwrap_err();
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn test_blob_failure_releases_hash() {
        let mut index = MockContentIndex::new();
        index.expect_contains().returning(|_| Ok(false));
        index.expect_claim().returning(|_, _| Ok(true));
        index.expect_release().times(1).returning(|_| Ok(()));

        let mut blobs = MockBlobStore::new();
        blobs
            .expect_put()
            .returning(|_, _, _| Err(ShishaError::Internal("minio down".to_string())));

        let mut images = MockImageRepository::new();
        images.expect_create_uploaded_image().never();

        let svc = UploadService::new(
            Arc::new(images),
            Arc::new(blobs),
            Arc::new(index),
            Arc::new(MockEventPublisher::new()),
        );

        assert!(svc.upload(&alice(), file()).await.is_err());
    }
}
