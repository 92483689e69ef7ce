//! 服务层
//!
//! 实现钱包、上传、市场业务逻辑，协调仓储层、对象存储、内容索引与事件发布。
//!
//! ## 模块结构
//!
//! - `wallet`: 注册、登录、余额、转账
//! - `upload`: 用户图片上传与去重
//! - `market`: 图片列表、付费图片购买与已购查询
//! - `premium_seed`: 启动时初始化付费图片目录

pub mod market;
pub mod premium_seed;
pub mod upload;
pub mod wallet;

pub use market::MarketService;
pub use premium_seed::PremiumSeeder;
pub use upload::{UploadService, UploadedFile};
pub use wallet::WalletService;

use crate::error::Result;

/// 指标标签：成功为 "success"，失败为错误码
fn outcome_label<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.error_code(),
    }
}
