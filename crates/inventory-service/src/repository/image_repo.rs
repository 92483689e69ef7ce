//! 图片仓储
//!
//! 免费图片写入与上传奖励在同一事务内完成

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::map_unique_violation;
use super::traits::ImageRepository;
use crate::error::{InventoryError, Result};
use crate::models::{Image, NewImage, NewPremiumImage, PremiumImage};

pub struct PgImageRepository {
    pool: PgPool,
}

impl PgImageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn create_uploaded_image(&self, image: &NewImage, reward: i64) -> Result<Image> {
        let mut tx = self.pool.begin().await?;

        let credited = sqlx::query(
            r#"
            UPDATE users
            SET coins = coins + $1, updated_at = NOW()
            WHERE username = $2
            "#,
        )
        .bind(reward)
        .bind(&image.username)
        .execute(&mut *tx)
        .await?;

        if credited.rows_affected() == 0 {
            return Err(InventoryError::UserNotFound);
        }

        let created = sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (uuid, name, username, hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, uuid, name, username, hash, uploaded_at, created_at
            "#,
        )
        .bind(image.uuid)
        .bind(&image.name)
        .bind(&image.username)
        .bind(&image.hash)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(
            r#"
            SELECT id, uuid, name, username, hash, uploaded_at, created_at
            FROM images
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    async fn list_premium_images(&self) -> Result<Vec<PremiumImage>> {
        let images = sqlx::query_as::<_, PremiumImage>(
            r#"
            SELECT id, uuid, name, hash, price, uploaded_at, created_at
            FROM premium_images
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    async fn get_premium_image(&self, id: i64) -> Result<Option<PremiumImage>> {
        let image = sqlx::query_as::<_, PremiumImage>(
            r#"
            SELECT id, uuid, name, hash, price, uploaded_at, created_at
            FROM premium_images
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(image)
    }

    async fn get_premium_image_by_uuid(&self, uuid: Uuid) -> Result<Option<PremiumImage>> {
        let image = sqlx::query_as::<_, PremiumImage>(
            r#"
            SELECT id, uuid, name, hash, price, uploaded_at, created_at
            FROM premium_images
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(image)
    }

    async fn get_premium_image_by_hash(&self, hash: &str) -> Result<Option<PremiumImage>> {
        let image = sqlx::query_as::<_, PremiumImage>(
            r#"
            SELECT id, uuid, name, hash, price, uploaded_at, created_at
            FROM premium_images
            WHERE hash = $1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(image)
    }

    async fn create_premium_image(&self, image: &NewPremiumImage) -> Result<PremiumImage> {
        sqlx::query_as::<_, PremiumImage>(
            r#"
            INSERT INTO premium_images (uuid, name, hash, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, uuid, name, hash, price, uploaded_at, created_at
            "#,
        )
        .bind(image.uuid)
        .bind(&image.name)
        .bind(&image.hash)
        .bind(image.price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, InventoryError::ImageExists))
    }
}
