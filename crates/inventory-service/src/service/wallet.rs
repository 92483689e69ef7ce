//! 钱包服务
//!
//! 账户注册与登录、余额查询和用户间转账。
//!
//! ## 转账流程
//!
//! 1. 金额校验 -> 2. 双方存在性 -> 3. 余额预检
//!    -> 4. 事务内条件扣减与增加 -> 5. 发布转账事件

use std::sync::Arc;

use shisha_shared::events::MarketEvent;
use shisha_shared::observability::metrics;
use tracing::{info, instrument};
use validator::Validate;

use super::outcome_label;
use crate::auth::{JwtManager, hash_password, verify_password};
use crate::dto::{LoginRequest, LoginResponse, RegisterRequest, TransferRequest};
use crate::error::{InventoryError, Result};
use crate::events::EventPublisher;
use crate::repository::UserRepository;

/// 新用户初始金币
pub const INITIAL_COINS: i64 = 100;

/// 钱包服务
pub struct WalletService {
    users: Arc<dyn UserRepository>,
    publisher: Arc<dyn EventPublisher>,
    jwt: JwtManager,
    bcrypt_cost: u32,
}

impl WalletService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        publisher: Arc<dyn EventPublisher>,
        jwt: JwtManager,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            publisher,
            jwt,
            bcrypt_cost,
        }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// 注册新用户，初始余额 100
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<()> {
        request.validate()?;

        let cost = self.bcrypt_cost;
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| InventoryError::Internal(format!("密码哈希任务异常: {e}")))??;

        self.users
            .create_user(&request.username, &password_hash, INITIAL_COINS)
            .await?;

        info!(username = %request.username, "用户注册成功");
        Ok(())
    }

    /// 登录，返回 Token 与当前余额
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        request.validate()?;

        let user = self
            .users
            .find_by_username(&request.username)
            .await?
            .ok_or_else(|| InventoryError::Unauthorized("User not found".to_string()))?;

        let password = request.password;
        let password_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| InventoryError::Internal(format!("密码校验任务异常: {e}")))??;

        if !valid {
            return Err(InventoryError::IncorrectPassword);
        }

        let (token, _) = self.jwt.generate_token(&user.username)?;
        Ok(LoginResponse {
            token,
            coins: user.coins,
        })
    }

    /// 查询余额
    pub async fn balance(&self, username: &str) -> Result<i64> {
        if username.is_empty() {
            return Err(InventoryError::Validation("username is required".to_string()));
        }

        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(InventoryError::UserNotFound)?;

        Ok(user.coins)
    }

    /// 用户间转账
    #[instrument(skip(self, request), fields(from = %request.from_username, to = %request.to_username, amount = request.amount))]
    pub async fn transfer(&self, request: TransferRequest) -> Result<()> {
        let result = self.execute_transfer(&request).await;
        metrics::record_coin_transfer(outcome_label(&result));
        result?;

        self.publisher.publish(MarketEvent::Transfer {
            user: request.from_username.clone(),
            target: request.to_username.clone(),
            amount: request.amount,
        })?;

        info!(
            from = %request.from_username,
            to = %request.to_username,
            amount = request.amount,
            "转账成功"
        );
        Ok(())
    }

    async fn execute_transfer(&self, request: &TransferRequest) -> Result<()> {
        if request.amount <= 0 {
            return Err(InventoryError::Validation(
                "Amount must be greater than zero".to_string(),
            ));
        }
        request.validate()?;
        if request.from_username == request.to_username {
            return Err(InventoryError::Validation(
                "Cannot transfer coins to yourself".to_string(),
            ));
        }

        let sender = self
            .users
            .find_by_username(&request.from_username)
            .await?
            .ok_or(InventoryError::UserNotFound)?;

        self.users
            .find_by_username(&request.to_username)
            .await?
            .ok_or(InventoryError::RecipientNotFound)?;

        if sender.coins < request.amount {
            return Err(InventoryError::InsufficientCoins);
        }

        self.users
            .transfer_coins(&request.from_username, &request.to_username, request.amount)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::events::MockEventPublisher;
    use crate::models::User;
    use crate::repository::MockUserRepository;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn user(username: &str, coins: i64) -> User {
        User {
            id: 1,
            username: username.to_string(),
            password_hash: hash_password("secret", 4).unwrap(),
            coins,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(users: MockUserRepository, publisher: MockEventPublisher) -> WalletService {
        WalletService::new(
            Arc::new(users),
            Arc::new(publisher),
            JwtManager::new(JwtConfig::default()),
            4,
        )
    }

    fn transfer(from: &str, to: &str, amount: i64) -> TransferRequest {
        TransferRequest {
            from_username: from.to_string(),
            to_username: to.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn test_register_presets_balance() {
        let mut users = MockUserRepository::new();
        users
            .expect_create_user()
            .withf(|name, hash, coins| name == "alice" && hash.starts_with("$2") && *coins == 100)
            .times(1)
            .returning(|name, _, coins| Ok(user(name, coins)));

        let svc = service(users, MockEventPublisher::new());
        svc.register(RegisterRequest {
            username: "alice".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_register_rejects_empty_username() {
        let svc = service(MockUserRepository::new(), MockEventPublisher::new());
        let err = svc
            .register(RegisterRequest {
                username: String::new(),
                password: "secret".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .returning(|name| Ok(Some(user(name, 100))));

        let svc = service(users, MockEventPublisher::new());
        let err = svc
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::IncorrectPassword));
    }

    #[tokio::test]
    async fn test_login_unknown_user_is_unauthorized() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_username().returning(|_| Ok(None));

        let svc = service(users, MockEventPublisher::new());
        let err = svc
            .login(LoginRequest {
                username: "ghost".to_string(),
                password: "x".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "User not found");
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected_before_lookup() {
        // 未设置任何期望，出现仓储调用即 panic
        let svc = service(MockUserRepository::new(), MockEventPublisher::new());

        for amount in [0, -5] {
            let err = svc.transfer(transfer("alice", "bob", amount)).await.unwrap_err();
            assert_eq!(err.to_string(), "Amount must be greater than zero");
        }
    }

    #[tokio::test]
    async fn test_transfer_insufficient_coins_does_not_mutate() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .with(eq("alice"))
            .returning(|name| Ok(Some(user(name, 5))));
        users
            .expect_find_by_username()
            .with(eq("bob"))
            .returning(|name| Ok(Some(user(name, 0))));
        users.expect_transfer_coins().never();

        let svc = service(users, MockEventPublisher::new());
        let err = svc.transfer(transfer("alice", "bob", 10)).await.unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientCoins));
    }

    #[tokio::test]
    async fn test_transfer_publishes_event_after_commit() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .returning(|name| Ok(Some(user(name, 100))));
        users
            .expect_transfer_coins()
            .with(eq("alice"), eq("bob"), eq(30_i64))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .with(eq(MarketEvent::Transfer {
                user: "alice".to_string(),
                target: "bob".to_string(),
                amount: 30,
            }))
            .times(1)
            .returning(|_| Ok(()));

        let svc = service(users, publisher);
        tokio_test::assert_ok!(svc.transfer(transfer("alice", "bob", 30)).await);
    }

    #[tokio::test]
    async fn test_transfer_to_missing_recipient() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .with(eq("alice"))
            .returning(|name| Ok(Some(user(name, 100))));
        users
            .expect_find_by_username()
            .with(eq("ghost"))
            .returning(|_| Ok(None));

        let svc = service(users, MockEventPublisher::new());
        let err = svc.transfer(transfer("alice", "ghost", 1)).await.unwrap_err();
        assert!(matches!(err, InventoryError::RecipientNotFound));
    }
}
