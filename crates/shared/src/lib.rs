//! 共享库
//!
//! 包含库存服务与看板服务共用的配置、错误处理、数据库连接、缓存、Kafka、
//! 对象存储以及可观测性等基础设施代码。

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod kafka;
pub mod observability;
pub mod storage;
pub mod test_utils;
