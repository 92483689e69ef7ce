//! 应用状态定义
//!
//! 包含 Axum 路由共享的服务实例与依赖检查项

use std::sync::Arc;

use shisha_shared::config::AppConfig;

use crate::auth::{JwtConfig, JwtManager};
use crate::events::EventPublisher;
use crate::infra::{BlobStore, ContentIndex, HealthCheck};
use crate::repository::{ImageRepository, PurchaseRepository, UserRepository};
use crate::service::{MarketService, UploadService, WalletService};

/// multipart 封装开销的余量，叠加在文件大小上限之上
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// 构造应用状态所需的依赖
pub struct ServiceDeps {
    pub users: Arc<dyn UserRepository>,
    pub images: Arc<dyn ImageRepository>,
    pub purchases: Arc<dyn PurchaseRepository>,
    pub blobs: Arc<dyn BlobStore>,
    pub index: Arc<dyn ContentIndex>,
    pub publisher: Arc<dyn EventPublisher>,
    /// `/ready` 逐项检查的依赖（名称, 检查器）
    pub health_checks: Vec<(&'static str, Arc<dyn HealthCheck>)>,
}

/// Axum 应用共享状态
///
/// 服务实例通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub wallet: Arc<WalletService>,
    pub uploads: Arc<UploadService>,
    pub market: Arc<MarketService>,
    /// 认证闸门按请求体中的用户名查询用户
    pub users: Arc<dyn UserRepository>,
    pub health_checks: Arc<Vec<(&'static str, Arc<dyn HealthCheck>)>>,
    /// 上传请求体上限（字节）
    pub upload_body_limit: usize,
}

impl AppState {
    pub fn new(deps: ServiceDeps, config: &AppConfig) -> Self {
        let jwt = JwtManager::new(JwtConfig::from(&config.auth));

        let wallet = WalletService::new(
            deps.users.clone(),
            deps.publisher.clone(),
            jwt,
            config.auth.bcrypt_cost,
        );
        let uploads = UploadService::new(
            deps.images.clone(),
            deps.blobs.clone(),
            deps.index.clone(),
            deps.publisher.clone(),
        );
        let market = MarketService::new(
            deps.users.clone(),
            deps.images,
            deps.purchases,
            deps.blobs,
            deps.publisher,
        );

        Self {
            wallet: Arc::new(wallet),
            uploads: Arc::new(uploads),
            market: Arc::new(market),
            users: deps.users,
            health_checks: Arc::new(deps.health_checks),
            upload_body_limit: config.upload.max_file_bytes + MULTIPART_OVERHEAD_BYTES,
        }
    }

    pub fn jwt(&self) -> &JwtManager {
        self.wallet.jwt()
    }
}
