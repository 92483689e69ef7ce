//! 看板服务入口
//!
//! HTTP 服务与 Kafka 消费循环在同一进程内运行，收到关闭信号后
//! 先停止 HTTP 服务，再通过 watch 通道通知消费循环退出。

use std::sync::Arc;

use shisha_dashboard_service::{
    AppState, consumer::EventHandler, repository::PgEventRepository, routes,
};
use shisha_shared::{
    config::AppConfig,
    database::Database,
    kafka::{self, KafkaConsumer},
    observability,
};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

const SERVICE_NAME: &str = "shisha-dashboard-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(&config.observability).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let db = Database::connect(&config.database).await?;
    let mut migrator = sqlx::migrate!("./migrations");
    db.run_migrations(&mut migrator).await?;

    let repo = Arc::new(PgEventRepository::new(db.pool().clone()));

    kafka::ensure_topic(&config.kafka).await?;
    let consumer = KafkaConsumer::new(&config.kafka)?;
    consumer.subscribe(&[config.kafka.topic.as_str()])?;

    let handler = EventHandler::new(repo.clone());
    let app = routes::app(AppState::new(repo));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        // HTTP 服务退出后通知消费循环
        let _ = shutdown_tx.send(true);
        result
    };

    let consuming = consumer.start(shutdown_rx, move |message| {
        let handler = handler.clone();
        async move { handler.handle(message).await }
    });

    let (served, ()) = tokio::join!(server, consuming);
    served?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
