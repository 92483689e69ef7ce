//! 库存服务错误类型定义
//!
//! 每类错误映射到唯一的 HTTP 状态码，响应体为 `{"error": "...", "code": "..."}`。
//! 基础设施错误的细节只记录日志，不返回给调用方。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shisha_shared::error::ShishaError;

/// 库存服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    // 参数错误
    #[error("{0}")]
    Validation(String),
    #[error("Request body too large")]
    PayloadTooLarge,

    // 认证错误
    #[error("{0}")]
    Unauthorized(String),
    #[error("Incorrect password")]
    IncorrectPassword,

    // 余额不足
    #[error("Insufficient coins")]
    InsufficientCoins,

    // 资源不存在
    #[error("User not found")]
    UserNotFound,
    #[error("Recipient not found")]
    RecipientNotFound,
    #[error("Image not found")]
    ImageNotFound,

    // 冲突
    #[error("Username already exists")]
    UsernameTaken,
    #[error("This image already exists")]
    ImageExists,
    #[error("You have already purchased this image")]
    AlreadyPurchased,

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("基础设施错误: {0}")]
    Infrastructure(#[from] ShishaError),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl InventoryError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized(_) | Self::IncorrectPassword => StatusCode::UNAUTHORIZED,
            Self::InsufficientCoins => StatusCode::PAYMENT_REQUIRED,
            Self::UserNotFound | Self::RecipientNotFound | Self::ImageNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::UsernameTaken | Self::ImageExists | Self::AlreadyPurchased => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Infrastructure(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::IncorrectPassword => "INVALID_CREDENTIALS",
            Self::InsufficientCoins => "INSUFFICIENT_COINS",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::RecipientNotFound => "RECIPIENT_NOT_FOUND",
            Self::ImageNotFound => "IMAGE_NOT_FOUND",
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::ImageExists => "IMAGE_EXISTS",
            Self::AlreadyPurchased => "ALREADY_PURCHASED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Infrastructure(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为系统级错误
    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if self.is_internal() {
            tracing::error!(error = %self, code = self.error_code(), "请求处理失败");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "error": message,
            "code": self.error_code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for InventoryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, InventoryError>;
