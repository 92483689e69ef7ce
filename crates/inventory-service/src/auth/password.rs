//! 密码处理
//!
//! 使用 bcrypt 生成与校验密码哈希

use bcrypt::{hash, verify};

use crate::error::InventoryError;

/// 对密码进行哈希处理，`cost` 为 bcrypt 工作因子（4..=31）
pub fn hash_password(password: &str, cost: u32) -> Result<String, InventoryError> {
    hash(password, cost)
        .map_err(|e| InventoryError::Internal(format!("密码哈希失败: {}", e)))
}

/// 验证密码
pub fn verify_password(password: &str, hash: &str) -> Result<bool, InventoryError> {
    verify(password, hash).map_err(|e| InventoryError::Internal(format!("密码验证失败: {}", e)))
}
