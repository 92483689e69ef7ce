//! 余额与转账处理器

use axum::{Json, extract::State};

use super::extract::{JsonBody, QueryParams};

use crate::dto::{BalanceQuery, BalanceResponse, MessageResponse, TransferRequest};
use crate::error::Result;
use crate::state::AppState;

/// 查询余额
///
/// GET /api/balance?username=
pub async fn balance(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BalanceQuery>,
) -> Result<Json<BalanceResponse>> {
    let balance = state.wallet.balance(&query.username).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// 用户间转账
///
/// POST /api/transfer
pub async fn transfer(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TransferRequest>,
) -> Result<Json<MessageResponse>> {
    state.wallet.transfer(req).await?;
    Ok(Json(MessageResponse::new("Transfer successful")))
}
