//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use shisha_shared::observability::middleware as obs_middleware;
use tower_http::cors::CorsLayer;

use crate::middleware::auth_gate;
use crate::{handlers, state::AppState};

/// 账户与钱包路由
fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/transfer", post(handlers::wallet::transfer))
        .route("/balance", get(handlers::wallet::balance))
}

/// 图片相关路由
///
/// 上传需经过认证闸门，请求体上限在闸门之前生效
fn image_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(handlers::upload::upload)
                .layer::<_, std::convert::Infallible>(middleware::from_fn_with_state(state.clone(), auth_gate))
                .layer(DefaultBodyLimit::max(state.upload_body_limit)),
        )
        .route("/user-images", get(handlers::images::user_images))
        .route("/prem-images", get(handlers::images::premium_images))
        .route(
            "/prem-images/url/{imageUUID}",
            get(handlers::images::premium_image_url),
        )
        .route("/purchase", post(handlers::images::purchase))
        .route(
            "/purchased/{userName}",
            get(handlers::images::purchased_images),
        )
        .route(
            "/purchased/ids/{userName}",
            get(handlers::images::purchased_image_ids),
        )
}

/// 构建 API 路由
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(wallet_routes())
        .merge(image_routes(state))
}

/// 构建完整应用：API、探针与全局中间件
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(&state))
        .route("/live", get(handlers::health::live))
        .route("/ready", get(handlers::health::ready))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
