//! HTTP 处理器

pub mod health;
pub mod stats;
