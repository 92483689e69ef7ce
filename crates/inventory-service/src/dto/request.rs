//! 请求 DTO 定义
//!
//! 字段名保持与前端约定一致（snake_case），不做重命名

use serde::Deserialize;
use validator::Validate;

/// 注册请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// 登录请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// 转账请求
///
/// 金额为正的校验在服务层完成，保证先于任何用户查询
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(length(min = 1, message = "Sender is required"))]
    pub from_username: String,
    #[validate(length(min = 1, message = "Recipient is required"))]
    pub to_username: String,
    pub amount: i64,
}

/// 余额查询参数
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub username: String,
}

/// 购买付费图片请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PurchaseRequest {
    pub image_id: i64,
    #[validate(length(min = 1, message = "User name is required"))]
    pub user_name: String,
}
