//! 看板服务
//!
//! 消费库存服务发布的市场事件并写入 PostgreSQL，对外提供统计查询：
//! 购买最多与上传最多的用户、累计收入、上传总数以及最近事件。

pub mod consumer;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod test_utils;

pub use error::{DashboardError, Result};
pub use state::AppState;
