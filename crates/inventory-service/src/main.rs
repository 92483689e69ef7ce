//! 库存服务入口
//!
//! 启动顺序：配置 -> 可观测性 -> 数据库与迁移 -> Kafka topic -> Redis -> 对象存储
//! -> 付费图片初始化 -> HTTP 服务。任一步骤失败即终止进程。

use std::sync::Arc;

use shisha_inventory_service::{
    AppState, ServiceDeps,
    events::KafkaEventPublisher,
    infra::{HealthCheck, HttpImageFetcher},
    repository::{PgImageRepository, PgPurchaseRepository, PgUserRepository},
    routes,
    service::PremiumSeeder,
};
use shisha_shared::{
    cache::Cache,
    config::AppConfig,
    database::Database,
    kafka::{self, KafkaProducer},
    observability,
    storage::ObjectStorage,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

const SERVICE_NAME: &str = "shisha-inventory-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(&config.observability).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());
    if config.is_production() && config.auth.jwt_secret == "your_secret_key" {
        warn!("生产环境仍在使用默认 JWT 密钥，请设置 SHISHA_AUTH_JWT_SECRET");
    }

    // 数据库与迁移
    let db = Database::connect(&config.database).await?;
    let mut migrator = sqlx::migrate!("./migrations");
    db.run_migrations(&mut migrator).await?;

    // Kafka：确保 topic 存在后再创建生产者
    kafka::ensure_topic(&config.kafka).await?;
    let producer = KafkaProducer::new(&config.kafka)?;

    // Redis
    let cache = Cache::new(&config.redis)?;
    cache.health_check().await?;

    // 对象存储：bucket 需预先创建
    let storage = ObjectStorage::new(&config.storage)?;
    storage.health_check().await?;

    let users = Arc::new(PgUserRepository::new(db.pool().clone()));
    let images = Arc::new(PgImageRepository::new(db.pool().clone()));
    let purchases = Arc::new(PgPurchaseRepository::new(db.pool().clone()));
    let blobs = Arc::new(storage);
    let index = Arc::new(cache.clone());

    if config.premium.seed_on_startup {
        let seeder = PremiumSeeder::new(
            images.clone(),
            blobs.clone(),
            index.clone(),
            Arc::new(HttpImageFetcher::default()),
            config.premium.clone(),
        );
        let created = seeder.seed().await?;
        info!(created, "付费图片目录已就绪");
    }

    let health_checks: Vec<(&'static str, Arc<dyn HealthCheck>)> = vec![
        ("database", Arc::new(db.clone()) as Arc<dyn HealthCheck>),
        ("redis", Arc::new(cache) as Arc<dyn HealthCheck>),
        ("kafka", Arc::new(producer.clone()) as Arc<dyn HealthCheck>),
    ];

    let state = AppState::new(
        ServiceDeps {
            users,
            images,
            purchases,
            blobs,
            index,
            publisher: Arc::new(KafkaEventPublisher::new(producer)),
            health_checks,
        },
        &config,
    );

    let app = routes::app(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
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
