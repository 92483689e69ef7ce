//! 付费图片目录初始化
//!
//! 启动时按顺序下载预置图片，内容哈希已登记的跳过，
//! 其余写入 premium-images（对象键 `<hash>.jpg`）并入库。
//! 任一下载或写入失败即中止，由调用方决定是否终止启动。

use std::sync::Arc;

use shisha_shared::config::PremiumConfig;
use shisha_shared::storage::Bucket;
use tracing::{info, instrument};
use uuid::Uuid;

use super::upload::content_hash;
use crate::error::{InventoryError, Result};
use crate::infra::{BlobStore, ContentIndex, ImageFetcher};
use crate::models::{NewPremiumImage, premium_object_key};
use crate::repository::ImageRepository;

/// 付费图片初始化器
pub struct PremiumSeeder {
    images: Arc<dyn ImageRepository>,
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn ContentIndex>,
    fetcher: Arc<dyn ImageFetcher>,
    config: PremiumConfig,
}

impl PremiumSeeder {
    pub fn new(
        images: Arc<dyn ImageRepository>,
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn ContentIndex>,
        fetcher: Arc<dyn ImageFetcher>,
        config: PremiumConfig,
    ) -> Self {
        Self {
            images,
            blobs,
            index,
            fetcher,
            config,
        }
    }

    /// 执行初始化，返回新入库的图片数量
    #[instrument(skip(self), fields(count = self.config.seed_urls.len()))]
    pub async fn seed(&self) -> Result<usize> {
        let mut created = 0;

        for (i, url) in self.config.seed_urls.iter().enumerate() {
            let data = self.fetcher.fetch(url).await?;
            let hash = content_hash(&data);

            if self.index.contains(&hash).await? {
                info!(url = %url, hash = %hash, "付费图片已存在，跳过");
                continue;
            }

            let uuid = Uuid::new_v4();
            self.blobs
                .put(Bucket::Premium, &premium_object_key(&hash), data)
                .await?;

            let image = NewPremiumImage {
                uuid,
                name: format!("Cool shishka №{}", i + 1),
                hash: hash.clone(),
                price: self.config.price,
            };

            let owner = match self.images.create_premium_image(&image).await {
                Ok(stored) => {
                    created += 1;
                    stored.uuid
                }
                // 数据库已有记录但索引丢失（如 Redis 被清空），按已有记录补登索引
                Err(InventoryError::ImageExists) => {
                    let existing = self
                        .images
                        .get_premium_image_by_hash(&hash)
                        .await?
                        .ok_or_else(|| {
                            InventoryError::Internal(format!("付费图片 {hash} 冲突但查不到记录"))
                        })?;
                    info!(hash = %hash, uuid = %existing.uuid, "付费图片记录已存在，补登内容索引");
                    existing.uuid
                }
                Err(e) => return Err(e),
            };

            self.index.claim(&hash, &owner.to_string()).await?;
        }

        info!(created, "付费图片初始化完成");
        Ok(created)
    }
}
