//! 全局 HTTP 中间件：请求 span、请求指标与 `x-request-id`

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, info_span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::logging::parent_context;
use super::metrics;

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// 为请求创建 span 并记录耗时
///
/// 指标按路由模板打标签，`/api/purchased/{userName}` 不会因用户名膨胀。
pub async fn http_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| path.clone(), |matched| matched.as_str().to_string());

    let span = info_span!(
        "http_request",
        %method,
        %path,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );
    let _ = span.set_parent(parent_context(request.headers()));

    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let elapsed = started.elapsed();

    let status = response.status().as_u16();
    span.record("status", status);
    span.record("latency_ms", elapsed.as_millis() as u64);
    metrics::record_http_request(method.as_str(), &route, status, elapsed.as_secs_f64());

    response
}

/// 沿用调用方的 `x-request-id`，缺失时生成 UUID，并回写到响应头
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

#[derive(Clone, Debug)]
pub struct RequestId(pub String);
