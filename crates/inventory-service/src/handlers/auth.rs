//! 注册与登录处理器

use axum::{Json, extract::State};

use super::extract::JsonBody;

use crate::dto::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest};
use crate::error::Result;
use crate::state::AppState;

/// 用户注册
///
/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Json<MessageResponse>> {
    state.wallet.register(req).await?;
    Ok(Json(MessageResponse::new("User registered successfully")))
}

/// 用户登录
///
/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let response = state.wallet.login(req).await?;
    Ok(Json(response))
}
