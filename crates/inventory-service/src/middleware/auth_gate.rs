//! 认证闸门中间件
//!
//! 缓冲请求体，从 JSON、multipart 或表单中读取 `username`，
//! 确认用户存在后将 `User` 注入请求扩展，再原样回放请求体给后续处理器。
//!
//! 携带 `Authorization: Bearer` 时额外校验 Token，其 `username` 必须与请求体一致。

use axum::{
    Form, Json,
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, State},
    http::{Extensions, HeaderMap, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use crate::error::{InventoryError, Result};
use crate::state::AppState;

const UNAUTHORIZED: &str = "Unauthorized";
const MALFORMED_BODY: &str = "Unauthorized. JSON Problem";

/// 闸门关心的请求体字段，`file` 仅为兼容客户端而接受
#[derive(Debug, Default, Deserialize)]
struct GateBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    #[allow(dead_code)]
    file: Option<serde_json::Value>,
}

/// 认证闸门
pub async fn auth_gate(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

async fn authenticate(state: &AppState, request: Request<Body>) -> Result<Request<Body>> {
    let (mut parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, state.upload_body_limit)
        .await
        .map_err(|_| InventoryError::PayloadTooLarge)?;

    let username = extract_username(&parts.headers, &parts.extensions, &bytes).await?;
    if username.is_empty() {
        return Err(InventoryError::Unauthorized(UNAUTHORIZED.to_string()));
    }

    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| InventoryError::Unauthorized(UNAUTHORIZED.to_string()))?;

    if let Some(token) = bearer_token(&parts.headers) {
        let claims = state.jwt().verify_token(token)?;
        if claims.username != user.username {
            debug!(
                body_user = %user.username,
                token_user = %claims.username,
                "Token 与请求体用户不一致"
            );
            return Err(InventoryError::Unauthorized(UNAUTHORIZED.to_string()));
        }
    }

    parts.extensions.insert(user);
    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// 按 Content-Type 解析请求体中的用户名
///
/// 回放请求保留原扩展，使路由上配置的 `DefaultBodyLimit` 对 multipart 解析同样生效
async fn extract_username(
    headers: &HeaderMap,
    extensions: &Extensions,
    bytes: &Bytes,
) -> Result<String> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let malformed = || InventoryError::Unauthorized(MALFORMED_BODY.to_string());
    let replay = || {
        let mut request = Request::new(Body::from(bytes.clone()));
        *request.headers_mut() = headers.clone();
        *request.extensions_mut() = extensions.clone();
        request
    };

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(replay(), &())
            .await
            .map_err(|_| malformed())?;

        while let Some(field) = multipart.next_field().await.map_err(|_| malformed())? {
            if field.name() == Some("username") {
                return field.text().await.map_err(|_| malformed());
            }
        }
        Ok(String::new())
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(body) = Form::<GateBody>::from_request(replay(), &())
            .await
            .map_err(|_| malformed())?;
        Ok(body.username)
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<GateBody>::from_request(replay(), &())
            .await
            .map_err(|_| malformed())?;
        Ok(body.username)
    } else {
        Err(malformed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_username_from_json() {
        let body = Bytes::from_static(br#"{"username":"alice","file":"cat.jpg"}"#);
        let username = extract_username(&headers("application/json"), &Extensions::new(), &body)
            .await
            .unwrap();
        assert_eq!(username, "alice");
    }

    #[tokio::test]
    async fn test_username_from_multipart() {
        let body = Bytes::from(
            "--XYZ\r\n\
             Content-Disposition: form-data; name=\"username\"\r\n\r\n\
             bob\r\n\
             --XYZ\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"a.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\n\
             data\r\n\
             --XYZ--\r\n",
        );
        let headers = headers("multipart/form-data; boundary=XYZ");
        let username = extract_username(&headers, &Extensions::new(), &body)
            .await
            .unwrap();
        assert_eq!(username, "bob");
    }

    #[tokio::test]
    async fn test_missing_username_is_empty() {
        let body = Bytes::from_static(b"{}");
        let username = extract_username(&headers("application/json"), &Extensions::new(), &body)
            .await
            .unwrap();
        assert!(username.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_unauthorized() {
        let body = Bytes::from_static(b"{not json");
        let err = extract_username(&headers("application/json"), &Extensions::new(), &body)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MALFORMED_BODY);
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
