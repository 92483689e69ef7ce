//! 看板服务路由级测试
//!
//! 事件经由消费者处理器写入内存仓储，再通过 `oneshot` 查询统计接口。

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::Value;
use shisha_dashboard_service::test_utils::TestApp;
use shisha_shared::events::MarketEvent;
use tower::ServiceExt;

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn upload(user: &str) -> MarketEvent {
    MarketEvent::Upload {
        user: user.into(),
        image_uuid: format!("{user}-image"),
    }
}

fn buy(user: &str, amount: i64) -> MarketEvent {
    MarketEvent::Buy {
        user: user.into(),
        image_uuid: "premium-1".into(),
        amount,
    }
}

fn transfer(user: &str, target: &str) -> MarketEvent {
    MarketEvent::Transfer {
        user: user.into(),
        target: target.into(),
        amount: 5,
    }
}

#[tokio::test]
async fn test_empty_dashboard() {
    let app = TestApp::new();

    let (status, json) = get(app.router(), "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["topBuyer"], Value::Null);
    assert_eq!(json["topUploader"], Value::Null);
    assert_eq!(json["moneyEarned"], 0);
    assert_eq!(json["uploadsCount"], 0);
    assert_eq!(json["lastEvents"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_stats_aggregate_consumed_events() {
    let app = TestApp::new();

    for event in [
        upload("alice"),
        upload("alice"),
        upload("bob"),
        buy("bob", 25),
        buy("bob", 25),
        buy("carol", 25),
        transfer("carol", "alice"),
    ] {
        app.deliver(&event).await.unwrap();
    }

    let (status, json) = get(app.router(), "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["topBuyer"], "bob");
    assert_eq!(json["topUploader"], "alice");
    assert_eq!(json["moneyEarned"], 75);
    assert_eq!(json["uploadsCount"], 3);
    assert_eq!(json["lastEvents"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_unknown_and_malformed_messages_are_skipped() {
    let app = TestApp::new();

    app.deliver_raw(br#"{"type":"refund","user":"alice","amount":5}"#)
        .await
        .unwrap();
    app.deliver_raw(b"{broken").await.unwrap();
    app.deliver(&upload("alice")).await.unwrap();

    assert_eq!(app.repo.len(), 1);
    let (_, json) = get(app.router(), "/api/stats").await;
    assert_eq!(json["uploadsCount"], 1);
}

#[tokio::test]
async fn test_database_failure_is_reported_for_retry() {
    let app = TestApp::new();
    app.repo.set_unavailable(true);

    let err = app.deliver(&upload("alice")).await.unwrap_err();
    assert!(err.is_retryable());

    app.repo.set_unavailable(false);
    assert!(app.repo.is_empty());
}

#[tokio::test]
async fn test_last_events_are_newest_first_and_capped() {
    let app = TestApp::new();
    let start = Utc::now() - Duration::minutes(30);

    for i in 0..12 {
        app.insert_at(&upload(&format!("user{i}")), start + Duration::minutes(i))
            .await;
    }

    let (_, json) = get(app.router(), "/api/stats").await;
    let events = json["lastEvents"].as_array().unwrap();
    assert_eq!(events.len(), 10);
    assert_eq!(events[0]["actor"], "user11");
    assert_eq!(events[0]["eventType"], "upload");
    assert!(events[0]["eventDate"].is_string());
    assert_eq!(events[9]["actor"], "user2");
}

#[tokio::test]
async fn test_recent_events_limit() {
    let app = TestApp::new();
    for i in 0..5 {
        app.deliver(&buy(&format!("user{i}"), 25)).await.unwrap();
    }

    let (status, json) = get(app.router(), "/api/events/recent?limit=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 3);

    let (status, json) = get(app.router(), "/api/events/recent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 5);

    let (status, json) = get(app.router(), "/api/events/recent?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (status, json) = get(app.router(), "/api/events/recent?limit=ten").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_stats_database_failure_returns_500() {
    let app = TestApp::new();
    app.repo.set_unavailable(true);

    let (status, json) = get(app.router(), "/api/stats").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Internal server error");
}

#[tokio::test]
async fn test_health_and_ready_endpoints() {
    let app = TestApp::new();

    let (status, json) = get(app.router(), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["service"], "shisha-dashboard-service");

    let (status, json) = get(app.router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["checks"]["database"], "ok");

    app.repo.set_unavailable(true);
    let (status, json) = get(app.router(), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["checks"]["database"], "fail");
}
