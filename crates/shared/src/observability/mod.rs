//! 日志、追踪与指标
//!
//! 两个服务在 `main` 开头调用 [`init`]，返回的守卫需存活到进程退出。

pub mod logging;
pub mod metrics;
pub mod middleware;

use anyhow::Result;
use serde::Deserialize;

/// `[observability]` 配置段，`service_name` 由 `AppConfig::load` 回填
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub service_name: String,
    /// OTLP gRPC 端点，未配置时只输出本地日志
    pub otlp_endpoint: Option<String>,
    /// 追踪采样比例，取值 0.0 ~ 1.0
    pub trace_sample_ratio: f64,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    /// `RUST_LOG` 未设置时使用的过滤规则
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "shisha".to_string(),
            otlp_endpoint: None,
            trace_sample_ratio: 1.0,
            metrics_enabled: true,
            metrics_port: 9090,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// 持有追踪 provider 与指标导出任务，drop 时刷新未发送的 span
pub struct ObservabilityGuard {
    _logging: logging::LoggingGuard,
    _metrics: Option<metrics::MetricsExporter>,
}

pub async fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let logging = logging::init(config)?;

    let metrics = if config.metrics_enabled {
        Some(metrics::MetricsExporter::start(config).await?)
    } else {
        None
    };

    ::tracing::info!(
        service = %config.service_name,
        otlp = config.otlp_endpoint.is_some(),
        metrics = config.metrics_enabled,
        "可观测性已初始化"
    );

    Ok(ObservabilityGuard {
        _logging: logging,
        _metrics: metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: ObservabilityConfig = serde_json::from_value(serde_json::json!({
            "metrics_port": 9091,
            "json_logs": true
        }))
        .unwrap();

        assert_eq!(config.metrics_port, 9091);
        assert!(config.json_logs);
        assert!(config.metrics_enabled);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.trace_sample_ratio, 1.0);
    }
}
