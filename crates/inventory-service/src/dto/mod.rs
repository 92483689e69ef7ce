//! 请求与响应 DTO

pub mod request;
pub mod response;

pub use request::{BalanceQuery, LoginRequest, PurchaseRequest, RegisterRequest, TransferRequest};
pub use response::{
    BalanceResponse, LoginResponse, MessageResponse, PremiumImageDto, PurchasedImageDto,
    UrlResponse, UserImageDto,
};
