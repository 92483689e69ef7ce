//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，便于 mock 测试和内存实现

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Image, NewImage, NewPremiumImage, PremiumImage, Purchase, User};

/// 用户账户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 创建用户，用户名冲突时返回 `UsernameTaken`
    async fn create_user(&self, username: &str, password_hash: &str, coins: i64) -> Result<User>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// 单事务内完成扣减与增加
    ///
    /// 扣减带 `coins >= amount` 条件，不满足时返回 `InsufficientCoins` 且不产生任何修改。
    async fn transfer_coins(&self, from: &str, to: &str, amount: i64) -> Result<()>;
}

/// 图片仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// 单事务内为上传者增加 `reward` 金币并写入图片记录
    async fn create_uploaded_image(&self, image: &NewImage, reward: i64) -> Result<Image>;

    async fn list_images(&self) -> Result<Vec<Image>>;

    async fn list_premium_images(&self) -> Result<Vec<PremiumImage>>;

    async fn get_premium_image(&self, id: i64) -> Result<Option<PremiumImage>>;

    async fn get_premium_image_by_uuid(&self, uuid: Uuid) -> Result<Option<PremiumImage>>;

    async fn get_premium_image_by_hash(&self, hash: &str) -> Result<Option<PremiumImage>>;

    /// 写入付费图片，哈希冲突时返回 `ImageExists`
    async fn create_premium_image(&self, image: &NewPremiumImage) -> Result<PremiumImage>;
}

/// 购买记录仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn has_purchased(&self, username: &str, image_id: i64) -> Result<bool>;

    /// 单事务内按图片价格扣款并写入购买记录
    ///
    /// 余额不足返回 `InsufficientCoins`，重复购买（唯一索引冲突）返回 `AlreadyPurchased`。
    async fn purchase(&self, username: &str, image: &PremiumImage) -> Result<Purchase>;

    async fn list_purchases(&self, username: &str) -> Result<Vec<Purchase>>;

    async fn list_purchased_image_ids(&self, username: &str) -> Result<Vec<i64>>;
}
