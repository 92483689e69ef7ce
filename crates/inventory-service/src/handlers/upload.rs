//! 图片上传处理器
//!
//! 位于认证闸门之后，闸门已将 `User` 注入请求扩展

use axum::{
    Extension, Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};

use crate::dto::MessageResponse;
use crate::error::{InventoryError, Result};
use crate::models::User;
use crate::service::UploadedFile;
use crate::state::AppState;

/// 上传图片
///
/// POST /api/upload（multipart: username, file）
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>> {
    let mut multipart = multipart
        .map_err(|e| InventoryError::Validation(format!("Failed to upload file: {e}")))?;

    let file = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| InventoryError::Validation("Failed to upload file".to_string()))?;

    state.uploads.upload(&user, file).await?;
    Ok(Json(MessageResponse::new("File uploaded successfully")))
}

/// 读取名为 `file` 的字段，其余字段忽略
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(UploadedFile { name, data }));
    }

    Ok(None)
}

fn multipart_error(e: MultipartError) -> InventoryError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        InventoryError::PayloadTooLarge
    } else {
        InventoryError::Validation(format!("Failed to read file: {}", e.body_text()))
    }
}
