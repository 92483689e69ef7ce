//! Prometheus 指标
//!
//! 指标在独立端口的 `/metrics` 上暴露，业务代码只调用下方的 `record_*` 函数。
//! 结果类标签取 "success" 或错误码。

use std::net::SocketAddr;

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::ObservabilityConfig;

/// (名称, 说明)
const COUNTERS: &[(&str, &str)] = &[
    ("http_requests_total", "HTTP 请求数"),
    ("coin_transfers_total", "金币转账次数"),
    ("image_uploads_total", "图片上传次数"),
    ("premium_purchases_total", "付费图片购买次数"),
    ("saved_events_total", "看板已入库的市场事件数"),
];

/// 后台导出任务，drop 时终止
pub struct MetricsExporter {
    task: JoinHandle<()>,
}

impl Drop for MetricsExporter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MetricsExporter {
    /// 安装全局 recorder 并在 `metrics_port` 上启动导出服务
    pub async fn start(config: &ObservabilityConfig) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .add_global_label("service", config.service_name.clone())
            .install_recorder()?;

        for (name, help) in COUNTERS {
            metrics::describe_counter!(*name, *help);
        }
        metrics::describe_histogram!(
            "http_request_duration_seconds",
            metrics::Unit::Seconds,
            "HTTP 请求耗时"
        );

        let app = Router::new().route("/metrics", get(move || std::future::ready(handle.render())));
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "指标导出服务已启动");

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "指标导出服务异常退出");
            }
        });

        Ok(Self { task })
    }
}

/// `route` 为路由模板，如 `/api/purchased/{userName}`
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let (method, route, status) = (method.to_string(), route.to_string(), status.to_string());
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status.clone()
    )
    .record(duration_secs);
    metrics::counter!(
        "http_requests_total",
        "method" => method,
        "route" => route,
        "status" => status
    )
    .increment(1);
}

fn record_outcome(name: &'static str, status: &str) {
    metrics::counter!(name, "status" => status.to_string()).increment(1);
}

pub fn record_coin_transfer(status: &str) {
    record_outcome("coin_transfers_total", status);
}

pub fn record_image_upload(status: &str) {
    record_outcome("image_uploads_total", status);
}

pub fn record_premium_purchase(status: &str) {
    record_outcome("premium_purchases_total", status);
}

/// 看板每写入一条事件调用一次
pub fn record_saved_event(event_type: &str) {
    metrics::counter!("saved_events_total", "event_type" => event_type.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_http_request("POST", "/api/transfer", 402, 0.02);
        record_coin_transfer("INSUFFICIENT_COINS");
        record_image_upload("success");
        record_premium_purchase("ALREADY_PURCHASED");
        record_saved_event("upload");
    }

    #[test]
    fn test_every_business_counter_is_described() {
        let names: Vec<&str> = COUNTERS.iter().map(|(name, _)| *name).collect();
        for expected in [
            "coin_transfers_total",
            "image_uploads_total",
            "premium_purchases_total",
            "saved_events_total",
        ] {
            assert!(names.contains(&expected), "缺少指标说明: {expected}");
        }
    }
}
