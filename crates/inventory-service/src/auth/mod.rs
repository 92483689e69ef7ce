//! 登录凭证：bcrypt 密码哈希与登录后签发的 JWT

mod jwt;
mod password;

pub use jwt::{Claims, JwtConfig, JwtManager};
pub use password::{hash_password, verify_password};
