//! 图片列表与购买处理器

use axum::{
    Json,
    extract::{Path, State},
};

use super::extract::JsonBody;

use crate::dto::{
    MessageResponse, PremiumImageDto, PurchaseRequest, PurchasedImageDto, UrlResponse,
    UserImageDto,
};
use crate::error::Result;
use crate::state::AppState;

/// 所有用户上传的图片
///
/// GET /api/user-images
pub async fn user_images(State(state): State<AppState>) -> Result<Json<Vec<UserImageDto>>> {
    Ok(Json(state.market.user_images().await?))
}

/// 付费图片目录
///
/// GET /api/prem-images
pub async fn premium_images(State(state): State<AppState>) -> Result<Json<Vec<PremiumImageDto>>> {
    Ok(Json(state.market.premium_images().await?))
}

/// 购买付费图片
///
/// POST /api/purchase
pub async fn purchase(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PurchaseRequest>,
) -> Result<Json<MessageResponse>> {
    state.market.purchase(req).await?;
    Ok(Json(MessageResponse::new("Image purchased successfully")))
}

/// 用户已购图片
///
/// GET /api/purchased/{userName}
pub async fn purchased_images(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<PurchasedImageDto>>> {
    Ok(Json(state.market.purchased_images(&username).await?))
}

/// 用户已购图片 ID
///
/// GET /api/purchased/ids/{userName}
pub async fn purchased_image_ids(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.market.purchased_image_ids(&username).await?))
}

/// 付费图片下载地址
///
/// GET /api/prem-images/url/{imageUUID}
pub async fn premium_image_url(
    State(state): State<AppState>,
    Path(image_uuid): Path<String>,
) -> Result<Json<UrlResponse>> {
    Ok(Json(state.market.premium_image_url(&image_uuid).await?))
}
