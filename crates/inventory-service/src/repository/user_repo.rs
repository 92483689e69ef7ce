//! 用户账户仓储
//!
//! 转账在单事务内完成，扣减语句带余额条件，保证余额永不为负

use async_trait::async_trait;
use sqlx::PgPool;

use super::map_unique_violation;
use super::traits::UserRepository;
use crate::error::{InventoryError, Result};
use crate::models::User;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, username: &str, password_hash: &str, coins: i64) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, coins)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, coins, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(coins)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, InventoryError::UsernameTaken))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, coins, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn transfer_coins(&self, from: &str, to: &str, amount: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // 按用户名顺序锁定双方行，避免相向转账互相死锁
        let locked: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT username FROM users
            WHERE username = ANY($1)
            ORDER BY username
            FOR UPDATE
            "#,
        )
        .bind(vec![from.to_string(), to.to_string()])
        .fetch_all(&mut *tx)
        .await?;

        if !locked.iter().any(|name| name == from) {
            return Err(InventoryError::UserNotFound);
        }
        if !locked.iter().any(|name| name == to) {
            return Err(InventoryError::RecipientNotFound);
        }

        let debited = sqlx::query(
            r#"
            UPDATE users
            SET coins = coins - $1, updated_at = NOW()
            WHERE username = $2 AND coins >= $1
            "#,
        )
        .bind(amount)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            return Err(InventoryError::InsufficientCoins);
        }

        sqlx::query(
            r#"
            UPDATE users
            SET coins = coins + $1, updated_at = NOW()
            WHERE username = $2
            "#,
        )
        .bind(amount)
        .bind(to)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
