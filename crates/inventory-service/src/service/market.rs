//! 市场服务
//!
//! 图片列表、付费图片购买与已购查询。列表中的下载地址为预签名 URL，
//! 对外主机按存储配置改写。
//!
//! ## 购买流程
//!
//! 1. 重复购买检查 -> 2. 图片存在 -> 3. 用户存在 -> 4. 余额预检
//!    -> 5. 事务内条件扣款并写入购买记录 -> 6. 发布购买事件

use std::sync::Arc;

use shisha_shared::events::MarketEvent;
use shisha_shared::observability::metrics;
use shisha_shared::storage::Bucket;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::outcome_label;
use crate::dto::{PremiumImageDto, PurchaseRequest, PurchasedImageDto, UrlResponse, UserImageDto};
use crate::error::{InventoryError, Result};
use crate::events::EventPublisher;
use crate::infra::BlobStore;
use crate::models::Purchase;
use crate::repository::{ImageRepository, PurchaseRepository, UserRepository};

/// 市场服务
pub struct MarketService {
    users: Arc<dyn UserRepository>,
    images: Arc<dyn ImageRepository>,
    purchases: Arc<dyn PurchaseRepository>,
    blobs: Arc<dyn BlobStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl MarketService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        images: Arc<dyn ImageRepository>,
        purchases: Arc<dyn PurchaseRepository>,
        blobs: Arc<dyn BlobStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            users,
            images,
            purchases,
            blobs,
            publisher,
        }
    }

    /// 所有用户上传的图片，任一地址签名失败即整体失败
    pub async fn user_images(&self) -> Result<Vec<UserImageDto>> {
        let images = self.images.list_images().await?;

        let mut items = Vec::with_capacity(images.len());
        for image in images {
            let url = self
                .blobs
                .presigned_get(Bucket::User, &image.object_key())
                .await?;
            items.push(UserImageDto {
                id: image.id,
                name: image.name,
                uploaded_at: image.uploaded_at,
                url,
                owner: image.username,
            });
        }

        Ok(items)
    }

    /// 付费图片目录，签名失败的条目跳过
    pub async fn premium_images(&self) -> Result<Vec<PremiumImageDto>> {
        let images = self.images.list_premium_images().await?;

        let mut items = Vec::with_capacity(images.len());
        for image in images {
            let url = match self
                .blobs
                .presigned_get(Bucket::Premium, &image.object_key())
                .await
            {
                Ok(url) => url,
                Err(e) => {
                    warn!(image_id = image.id, error = %e, "付费图片签名失败，跳过");
                    continue;
                }
            };
            items.push(PremiumImageDto {
                id: image.id,
                name: image.name,
                uploaded_at: image.uploaded_at,
                url,
                price: image.price,
            });
        }

        Ok(items)
    }

    /// 购买付费图片
    #[instrument(skip(self, request), fields(username = %request.user_name, image_id = request.image_id))]
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<Purchase> {
        let result = self.execute_purchase(&request).await;
        metrics::record_premium_purchase(outcome_label(&result));
        let (purchase, price) = result?;

        self.publisher.publish(MarketEvent::Buy {
            user: purchase.username.clone(),
            image_uuid: purchase.image_uuid.to_string(),
            amount: price,
        })?;

        info!(
            username = %purchase.username,
            image_id = purchase.image_id,
            price,
            "付费图片购买成功"
        );
        Ok(purchase)
    }

    async fn execute_purchase(&self, request: &PurchaseRequest) -> Result<(Purchase, i64)> {
        request.validate()?;

        if self
            .purchases
            .has_purchased(&request.user_name, request.image_id)
            .await?
        {
            return Err(InventoryError::AlreadyPurchased);
        }

        let image = self
            .images
            .get_premium_image(request.image_id)
            .await?
            .ok_or(InventoryError::ImageNotFound)?;

        let user = self
            .users
            .find_by_username(&request.user_name)
            .await?
            .ok_or(InventoryError::UserNotFound)?;

        if user.coins < image.price {
            return Err(InventoryError::InsufficientCoins);
        }

        let purchase = self.purchases.purchase(&user.username, &image).await?;
        Ok((purchase, image.price))
    }

    /// 用户已购图片，按购买时间排序
    pub async fn purchased_images(&self, username: &str) -> Result<Vec<PurchasedImageDto>> {
        let purchases = self.purchases.list_purchases(username).await?;

        let mut items = Vec::with_capacity(purchases.len());
        for purchase in purchases {
            let url = self
                .blobs
                .presigned_get(Bucket::Premium, &purchase.object_key())
                .await?;
            items.push(PurchasedImageDto {
                id: purchase.id,
                name: purchase.image_name,
                url,
                buytime: purchase.created_at,
            });
        }

        Ok(items)
    }

    /// 用户已购付费图片 ID（字符串形式）
    pub async fn purchased_image_ids(&self, username: &str) -> Result<Vec<String>> {
        let ids = self.purchases.list_purchased_image_ids(username).await?;
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    /// 按 UUID 获取付费图片的下载地址
    pub async fn premium_image_url(&self, image_uuid: &str) -> Result<UrlResponse> {
        let uuid = Uuid::parse_str(image_uuid).map_err(|_| InventoryError::ImageNotFound)?;

        let image = self
            .images
            .get_premium_image_by_uuid(uuid)
            .await?
            .ok_or(InventoryError::ImageNotFound)?;

        let url = self
            .blobs
            .presigned_get(Bucket::Premium, &image.object_key())
            .await?;

        Ok(UrlResponse { url })
    }
}
