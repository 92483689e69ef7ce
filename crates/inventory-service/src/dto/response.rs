//! 响应 DTO 定义

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 通用消息响应 `{"message": "..."}`
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 登录响应
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub coins: i64,
}

/// 余额响应
#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// 用户上传图片列表项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserImageDto {
    pub id: i64,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    pub url: String,
    pub owner: String,
}

/// 付费图片列表项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumImageDto {
    pub id: i64,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    pub url: String,
    pub price: i64,
}

/// 已购图片列表项，`id` 为购买记录 ID
#[derive(Debug, Clone, Serialize)]
pub struct PurchasedImageDto {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub buytime: DateTime<Utc>,
}

/// 单个下载地址响应
#[derive(Debug, Clone, Serialize)]
pub struct UrlResponse {
    pub url: String,
}
