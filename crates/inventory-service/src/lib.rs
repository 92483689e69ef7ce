//! 库存服务
//!
//! 金币钱包与图片市场 HTTP API：注册登录、余额与转账、图片上传、
//! 付费图片购买与已购查询。成功的转账、上传、购买会发布市场事件。
//!
//! ## 模块结构
//!
//! - `auth`: JWT 与密码处理
//! - `repository`: PostgreSQL 仓储
//! - `infra`: 对象存储、内容索引、下载等基础设施适配
//! - `events`: 市场事件发布
//! - `service`: 业务逻辑
//! - `middleware`: 认证闸门
//! - `handlers` / `routes`: HTTP 层

pub mod auth;
pub mod dto;
pub mod error;
pub mod events;
pub mod handlers;
pub mod infra;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod test_utils;

pub use error::{InventoryError, Result};
pub use state::{AppState, ServiceDeps};
