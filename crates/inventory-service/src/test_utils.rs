//! 测试工具模块
//!
//! 提供仓储与基础设施的内存实现，以及组装好的测试应用，
//! 供单元测试与 `tests/` 下的路由级测试使用。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use chrono::Utc;
use shisha_shared::config::AppConfig;
use shisha_shared::error::ShishaError;
use shisha_shared::events::MarketEvent;
use shisha_shared::storage::Bucket;
use uuid::Uuid;

use crate::error::{InventoryError, Result};
use crate::events::EventPublisher;
use crate::infra::{BlobStore, ContentIndex, HealthCheck};
use crate::models::{Image, NewImage, NewPremiumImage, PremiumImage, Purchase, User};
use crate::repository::{ImageRepository, PurchaseRepository, UserRepository};
use crate::state::{AppState, ServiceDeps};
use crate::{auth, routes};

type InfraResult<T> = std::result::Result<T, ShishaError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ==================== 内存仓储 ====================

#[derive(Default)]
struct MarketTables {
    users: HashMap<String, User>,
    images: Vec<Image>,
    premium_images: Vec<PremiumImage>,
    purchases: Vec<Purchase>,
    next_id: i64,
}

impl MarketTables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// 内存数据库，同时实现用户、图片、购买三个仓储
///
/// 所有写操作在同一把锁内完成，语义上等同于数据库事务
#[derive(Clone, Default)]
pub struct InMemoryMarket {
    tables: Arc<Mutex<MarketTables>>,
}

impl InMemoryMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入用户（密码哈希使用最低 bcrypt 代价）
    pub fn insert_user(&self, username: &str, password: &str, coins: i64) -> User {
        let password_hash = auth::hash_password(password, 4).unwrap_or_default();
        let mut tables = lock(&self.tables);
        let user = User {
            id: tables.next_id(),
            username: username.to_string(),
            password_hash,
            coins,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.users.insert(username.to_string(), user.clone());
        user
    }

    /// 直接写入付费图片
    pub fn insert_premium_image(&self, name: &str, hash: &str, price: i64) -> PremiumImage {
        let mut tables = lock(&self.tables);
        let image = PremiumImage {
            id: tables.next_id(),
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            hash: hash.to_string(),
            price,
            uploaded_at: Utc::now(),
            created_at: Utc::now(),
        };
        tables.premium_images.push(image.clone());
        image
    }

    pub fn coins(&self, username: &str) -> Option<i64> {
        lock(&self.tables).users.get(username).map(|u| u.coins)
    }

    pub fn image_count(&self) -> usize {
        lock(&self.tables).images.len()
    }

    /// 已上传图片，按写入顺序
    pub fn images(&self) -> Vec<Image> {
        lock(&self.tables).images.clone()
    }

    pub fn purchase_count(&self, username: &str) -> usize {
        lock(&self.tables)
            .purchases
            .iter()
            .filter(|p| p.username == username)
            .count()
    }
}

#[async_trait]
impl UserRepository for InMemoryMarket {
    async fn create_user(&self, username: &str, password_hash: &str, coins: i64) -> Result<User> {
        let mut tables = lock(&self.tables);
        if tables.users.contains_key(username) {
            return Err(InventoryError::UsernameTaken);
        }
        let user = User {
            id: tables.next_id(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            coins,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(lock(&self.tables).users.get(username).cloned())
    }

    async fn transfer_coins(&self, from: &str, to: &str, amount: i64) -> Result<()> {
        let mut tables = lock(&self.tables);
        if !tables.users.contains_key(to) {
            return Err(InventoryError::RecipientNotFound);
        }
        let sender = tables
            .users
            .get_mut(from)
            .ok_or(InventoryError::UserNotFound)?;
        if sender.coins < amount {
            return Err(InventoryError::InsufficientCoins);
        }
        sender.coins -= amount;
        if let Some(recipient) = tables.users.get_mut(to) {
            recipient.coins += amount;
        }
        Ok(())
    }
}

#[async_trait]
impl ImageRepository for InMemoryMarket {
    async fn create_uploaded_image(&self, image: &NewImage, reward: i64) -> Result<Image> {
        let mut tables = lock(&self.tables);
        let id = tables.next_id();
        let user = tables
            .users
            .get_mut(&image.username)
            .ok_or(InventoryError::UserNotFound)?;
        user.coins += reward;

        let created = Image {
            id,
            uuid: image.uuid,
            name: image.name.clone(),
            username: image.username.clone(),
            hash: image.hash.clone(),
            uploaded_at: Utc::now(),
            created_at: Utc::now(),
        };
        tables.images.push(created.clone());
        Ok(created)
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        Ok(lock(&self.tables).images.clone())
    }

    async fn list_premium_images(&self) -> Result<Vec<PremiumImage>> {
        Ok(lock(&self.tables).premium_images.clone())
    }

    async fn get_premium_image(&self, id: i64) -> Result<Option<PremiumImage>> {
        Ok(lock(&self.tables)
            .premium_images
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn get_premium_image_by_uuid(&self, uuid: Uuid) -> Result<Option<PremiumImage>> {
        Ok(lock(&self.tables)
            .premium_images
            .iter()
            .find(|i| i.uuid == uuid)
            .cloned())
    }

    async fn get_premium_image_by_hash(&self, hash: &str) -> Result<Option<PremiumImage>> {
        Ok(lock(&self.tables)
            .premium_images
            .iter()
            .find(|i| i.hash == hash)
            .cloned())
    }

    async fn create_premium_image(&self, image: &NewPremiumImage) -> Result<PremiumImage> {
        let mut tables = lock(&self.tables);
        if tables.premium_images.iter().any(|i| i.hash == image.hash) {
            return Err(InventoryError::ImageExists);
        }
        let created = PremiumImage {
            id: tables.next_id(),
            uuid: image.uuid,
            name: image.name.clone(),
            hash: image.hash.clone(),
            price: image.price,
            uploaded_at: Utc::now(),
            created_at: Utc::now(),
        };
        tables.premium_images.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl PurchaseRepository for InMemoryMarket {
    async fn has_purchased(&self, username: &str, image_id: i64) -> Result<bool> {
        Ok(lock(&self.tables)
            .purchases
            .iter()
            .any(|p| p.username == username && p.image_id == image_id))
    }

    async fn purchase(&self, username: &str, image: &PremiumImage) -> Result<Purchase> {
        let mut tables = lock(&self.tables);
        if tables
            .purchases
            .iter()
            .any(|p| p.username == username && p.image_id == image.id)
        {
            return Err(InventoryError::AlreadyPurchased);
        }

        let id = tables.next_id();
        let user = tables
            .users
            .get_mut(username)
            .ok_or(InventoryError::InsufficientCoins)?;
        if user.coins < image.price {
            return Err(InventoryError::InsufficientCoins);
        }
        user.coins -= image.price;

        let purchase = Purchase {
            id,
            username: username.to_string(),
            image_id: image.id,
            image_uuid: image.uuid,
            image_name: image.name.clone(),
            hash: image.hash.clone(),
            created_at: Utc::now(),
        };
        tables.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn list_purchases(&self, username: &str) -> Result<Vec<Purchase>> {
        Ok(lock(&self.tables)
            .purchases
            .iter()
            .filter(|p| p.username == username)
            .cloned()
            .collect())
    }

    async fn list_purchased_image_ids(&self, username: &str) -> Result<Vec<i64>> {
        Ok(lock(&self.tables)
            .purchases
            .iter()
            .filter(|p| p.username == username)
            .map(|p| p.image_id)
            .collect())
    }
}

// ==================== 内存基础设施 ====================

/// 内存对象存储，签名地址形如 `http://<host>/<bucket>/<key>?X-Amz-Signature=test`
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
    host: String,
    fail_puts: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn new(host: &str) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            host: host.to_string(),
            fail_puts: AtomicBool::new(false),
        }
    }

    fn object_id(bucket: Bucket, key: &str) -> String {
        match bucket {
            Bucket::Premium => format!("premium-images/{key}"),
            Bucket::User => format!("user-images/{key}"),
        }
    }

    /// 之后的写入全部失败
    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn contains(&self, bucket: Bucket, key: &str) -> bool {
        lock(&self.objects).contains_key(&Self::object_id(bucket, key))
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("localhost:9000")
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bucket: Bucket, key: &str, data: Bytes) -> InfraResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ShishaError::Internal("对象存储不可用".to_string()));
        }
        lock(&self.objects).insert(Self::object_id(bucket, key), data);
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> InfraResult<()> {
        lock(&self.objects).remove(&Self::object_id(bucket, key));
        Ok(())
    }

    async fn presigned_get(&self, bucket: Bucket, key: &str) -> InfraResult<String> {
        Ok(format!(
            "http://{}/{}?X-Amz-Signature=test",
            self.host,
            Self::object_id(bucket, key)
        ))
    }
}

/// 内存内容哈希索引
#[derive(Default)]
pub struct InMemoryContentIndex {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryContentIndex {
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentIndex for InMemoryContentIndex {
    async fn contains(&self, hash: &str) -> InfraResult<bool> {
        Ok(lock(&self.entries).contains_key(hash))
    }

    async fn claim(&self, hash: &str, image_uuid: &str) -> InfraResult<bool> {
        let mut entries = lock(&self.entries);
        if entries.contains_key(hash) {
            return Ok(false);
        }
        entries.insert(hash.to_string(), image_uuid.to_string());
        Ok(true)
    }

    async fn release(&self, hash: &str) -> InfraResult<()> {
        lock(&self.entries).remove(hash);
        Ok(())
    }
}

/// 记录已发布事件的发布器
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<MarketEvent> {
        lock(&self.events).clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: MarketEvent) -> std::result::Result<(), ShishaError> {
        lock(&self.events).push(event);
        Ok(())
    }
}

/// 固定结果的依赖检查
pub struct StaticHealth(pub bool);

#[async_trait]
impl HealthCheck for StaticHealth {
    async fn check(&self) -> InfraResult<()> {
        if self.0 {
            Ok(())
        } else {
            Err(ShishaError::Internal("unreachable".to_string()))
        }
    }
}

// ==================== 测试应用 ====================

/// 测试配置：低 bcrypt 代价，1 MiB 上传上限
pub fn test_app_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.bcrypt_cost = 4;
    config.upload.max_file_bytes = 1024 * 1024;
    config
}

/// 组装好内存依赖的测试应用
pub struct TestApp {
    pub market: InMemoryMarket,
    pub blobs: Arc<InMemoryBlobStore>,
    pub index: Arc<InMemoryContentIndex>,
    pub publisher: Arc<RecordingPublisher>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_health(true)
    }

    /// 依赖检查结果可控的测试应用
    pub fn with_health(healthy: bool) -> Self {
        Self::build(Arc::new(InMemoryBlobStore::default()), None, healthy)
    }

    /// 使用指定对象存储构建，列表接口的签名地址由该存储生成
    pub fn with_blob_store(blob_store: Arc<dyn BlobStore>) -> Self {
        Self::build(Arc::new(InMemoryBlobStore::default()), Some(blob_store), true)
    }

    fn build(
        blobs: Arc<InMemoryBlobStore>,
        override_store: Option<Arc<dyn BlobStore>>,
        healthy: bool,
    ) -> Self {
        let market = InMemoryMarket::new();
        let index = Arc::new(InMemoryContentIndex::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let blob_store: Arc<dyn BlobStore> =
            override_store.unwrap_or_else(|| blobs.clone() as Arc<dyn BlobStore>);

        let state = AppState::new(
            ServiceDeps {
                users: Arc::new(market.clone()),
                images: Arc::new(market.clone()),
                purchases: Arc::new(market.clone()),
                blobs: blob_store,
                index: index.clone(),
                publisher: publisher.clone(),
                health_checks: vec![
                    ("database", Arc::new(StaticHealth(true)) as Arc<dyn HealthCheck>),
                    ("redis", Arc::new(StaticHealth(healthy)) as Arc<dyn HealthCheck>),
                    ("kafka", Arc::new(StaticHealth(true)) as Arc<dyn HealthCheck>),
                ],
            },
            &test_app_config(),
        );

        Self {
            market,
            blobs,
            index,
            publisher,
            state,
        }
    }

    pub fn router(&self) -> Router {
        routes::app(self.state.clone())
    }

    /// 为用户签发 Token
    pub fn token_for(&self, username: &str) -> String {
        self.state
            .jwt()
            .generate_token(username)
            .map(|(token, _)| token)
            .unwrap_or_default()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== 请求构造 ====================

/// multipart 请求体构造，返回 (content-type, body)
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "shisha-test-boundary";
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
