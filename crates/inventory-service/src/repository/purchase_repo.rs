//! 购买记录仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::map_unique_violation;
use super::traits::PurchaseRepository;
use crate::error::{InventoryError, Result};
use crate::models::{PremiumImage, Purchase};

pub struct PgPurchaseRepository {
    pool: PgPool,
}

impl PgPurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseRepository for PgPurchaseRepository {
    async fn has_purchased(&self, username: &str, image_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM purchases WHERE username = $1 AND image_id = $2
            )
            "#,
        )
        .bind(username)
        .bind(image_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn purchase(&self, username: &str, image: &PremiumImage) -> Result<Purchase> {
        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query(
            r#"
            UPDATE users
            SET coins = coins - $1, updated_at = NOW()
            WHERE username = $2 AND coins >= $1
            "#,
        )
        .bind(image.price)
        .bind(username)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            return Err(InventoryError::InsufficientCoins);
        }

        // 唯一索引兜底并发的重复购买，冲突时事务回滚、扣款撤销
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (username, image_id, image_uuid, image_name, hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, image_id, image_uuid, image_name, hash, created_at
            "#,
        )
        .bind(username)
        .bind(image.id)
        .bind(image.uuid)
        .bind(&image.name)
        .bind(&image.hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, InventoryError::AlreadyPurchased))?;

        tx.commit().await?;
        Ok(purchase)
    }

    async fn list_purchases(&self, username: &str) -> Result<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT id, username, image_id, image_uuid, image_name, hash, created_at
            FROM purchases
            WHERE username = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }

    async fn list_purchased_image_ids(&self, username: &str) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT image_id FROM purchases
            WHERE username = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
