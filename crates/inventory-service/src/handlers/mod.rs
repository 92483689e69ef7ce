//! HTTP 处理器
//!
//! 处理器只负责提取参数与组装响应，业务逻辑位于服务层

pub mod auth;
pub mod extract;
pub mod health;
pub mod images;
pub mod upload;
pub mod wallet;
