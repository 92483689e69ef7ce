//! 中间件模块
//!
//! 提供基于请求体用户名的认证闸门

mod auth_gate;

pub use auth_gate::auth_gate;
