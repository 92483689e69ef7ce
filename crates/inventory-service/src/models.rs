//! 数据库实体模型

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// 用户账户
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    /// 金币余额，数据库约束保证非负
    pub coins: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 用户上传的免费图片
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Image {
    pub id: i64,
    pub uuid: Uuid,
    /// 原始文件名
    pub name: String,
    pub username: String,
    pub hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Image {
    /// user-images 中的对象键
    pub fn object_key(&self) -> String {
        user_object_key(&self.uuid, &self.name)
    }
}

/// 付费图片
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PremiumImage {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub hash: String,
    pub price: i64,
    pub uploaded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PremiumImage {
    /// premium-images 中的对象键
    pub fn object_key(&self) -> String {
        premium_object_key(&self.hash)
    }
}

/// 购买记录
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Purchase {
    pub id: i64,
    pub username: String,
    pub image_id: i64,
    pub image_uuid: Uuid,
    pub image_name: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn object_key(&self) -> String {
        premium_object_key(&self.hash)
    }
}

/// 待写入的上传图片
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub uuid: Uuid,
    pub name: String,
    pub username: String,
    pub hash: String,
}

impl NewImage {
    pub fn object_key(&self) -> String {
        user_object_key(&self.uuid, &self.name)
    }
}

/// 待写入的付费图片
#[derive(Debug, Clone, PartialEq)]
pub struct NewPremiumImage {
    pub uuid: Uuid,
    pub name: String,
    pub hash: String,
    pub price: i64,
}

pub fn premium_object_key(hash: &str) -> String {
    format!("{hash}.jpg")
}

/// 不同用户可以上传同名文件，以图片 uuid 作前缀隔开
pub fn user_object_key(uuid: &Uuid, name: &str) -> String {
    format!("{uuid}/{name}")
}
