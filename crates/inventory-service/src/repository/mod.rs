//! 数据库仓储层
//!
//! - 仓储只负责数据持久化，不包含业务校验
//! - 需要原子性的多表写入（转账、上传入账、购买）在单个仓储方法内以事务完成
//! - 定义 trait 接口以支持 mock 测试

mod image_repo;
mod purchase_repo;
mod traits;
mod user_repo;

pub use image_repo::PgImageRepository;
pub use purchase_repo::PgPurchaseRepository;
pub use traits::*;
pub use user_repo::PgUserRepository;

use shisha_shared::error::ShishaError;

use crate::error::InventoryError;

/// 将唯一约束冲突转换为指定的业务错误，其余错误原样上抛
fn map_unique_violation(err: sqlx::Error, on_conflict: InventoryError) -> InventoryError {
    let err = ShishaError::from(err);
    if err.is_unique_violation() {
        on_conflict
    } else {
        InventoryError::Infrastructure(err)
    }
}
