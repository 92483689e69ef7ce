//! 看板服务错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shisha_shared::error::ShishaError;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("{0}")]
    Validation(String),

    #[error("基础设施错误: {0}")]
    Infrastructure(#[from] ShishaError),
}

impl DashboardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Infrastructure(e) => e.code(),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Infrastructure(_) => {
                tracing::error!(error = %self, code = self.error_code(), "请求处理失败");
                "Internal server error".to_string()
            }
            Self::Validation(msg) => msg.clone(),
        };

        let body = json!({
            "error": message,
            "code": self.error_code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<sqlx::Error> for DashboardError {
    fn from(err: sqlx::Error) -> Self {
        Self::Infrastructure(ShishaError::Database(err))
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
