//! PostgreSQL 仓储集成测试
//!
//! 验证转账、上传入账、购买在真实数据库中的事务语义。
//!
//! ## 运行方式
//!
//! ```bash
//! TEST_DATABASE_URL=postgres://... cargo test --test repository_test -- --ignored
//! ```

use shisha_inventory_service::InventoryError;
use shisha_inventory_service::models::{NewImage, NewPremiumImage};
use shisha_inventory_service::repository::{
    ImageRepository, PgImageRepository, PgPurchaseRepository, PgUserRepository,
    PurchaseRepository, UserRepository,
};
use shisha_shared::database::Database;
use shisha_shared::test_utils::{test_database_config, test_username};
use uuid::Uuid;

async fn setup() -> Database {
    let db = Database::connect(&test_database_config())
        .await
        .expect("数据库连接失败");
    let mut migrator = sqlx::migrate!("./migrations");
    db.run_migrations(&mut migrator).await.expect("迁移失败");
    db
}

#[tokio::test]
#[ignore] // 需要 PostgreSQL
async fn test_transfer_is_guarded_and_atomic() {
    let db = setup().await;
    let users = PgUserRepository::new(db.pool().clone());
    let (alice, bob) = (test_username(), test_username());
    users.create_user(&alice, "x", 10).await.unwrap();
    users.create_user(&bob, "x", 0).await.unwrap();

    let err = users.transfer_coins(&alice, &bob, 11).await.unwrap_err();
    assert!(matches!(err, InventoryError::InsufficientCoins));

    users.transfer_coins(&alice, &bob, 10).await.unwrap();
    assert_eq!(users.find_by_username(&alice).await.unwrap().unwrap().coins, 0);
    assert_eq!(users.find_by_username(&bob).await.unwrap().unwrap().coins, 10);

    let err = users.transfer_coins(&alice, "missing-user", 1).await.unwrap_err();
    assert!(matches!(err, InventoryError::RecipientNotFound));
}

#[tokio::test]
#[ignore] // 需要 PostgreSQL
async fn test_duplicate_username() {
    let db = setup().await;
    let users = PgUserRepository::new(db.pool().clone());
    let name = test_username();

    users.create_user(&name, "x", 100).await.unwrap();
    let err = users.create_user(&name, "x", 100).await.unwrap_err();
    assert!(matches!(err, InventoryError::UsernameTaken));
}

#[tokio::test]
#[ignore] // 需要 PostgreSQL
async fn test_upload_credits_uploader() {
    let db = setup().await;
    let users = PgUserRepository::new(db.pool().clone());
    let images = PgImageRepository::new(db.pool().clone());
    let name = test_username();
    users.create_user(&name, "x", 100).await.unwrap();

    let image = images
        .create_uploaded_image(
            &NewImage {
                uuid: Uuid::new_v4(),
                name: format!("{name}.jpg"),
                username: name.clone(),
                hash: Uuid::new_v4().simple().to_string(),
            },
            1,
        )
        .await
        .unwrap();

    assert_eq!(image.username, name);
    assert_eq!(users.find_by_username(&name).await.unwrap().unwrap().coins, 101);
}

#[tokio::test]
#[ignore] // 需要 PostgreSQL
async fn test_purchase_debits_once() {
    let db = setup().await;
    let users = PgUserRepository::new(db.pool().clone());
    let images = PgImageRepository::new(db.pool().clone());
    let purchases = PgPurchaseRepository::new(db.pool().clone());
    let name = test_username();
    users.create_user(&name, "x", 30).await.unwrap();

    let image = images
        .create_premium_image(&NewPremiumImage {
            uuid: Uuid::new_v4(),
            name: "Cool shishka №1".to_string(),
            hash: Uuid::new_v4().simple().to_string(),
            price: 25,
        })
        .await
        .unwrap();

    purchases.purchase(&name, &image).await.unwrap();
    let err = purchases.purchase(&name, &image).await.unwrap_err();
    // 第二次购买时余额已不足 25，条件扣款先于唯一索引生效
    assert!(matches!(err, InventoryError::InsufficientCoins));

    assert_eq!(users.find_by_username(&name).await.unwrap().unwrap().coins, 5);
    assert!(purchases.has_purchased(&name, image.id).await.unwrap());
    assert_eq!(
        purchases.list_purchased_image_ids(&name).await.unwrap(),
        vec![image.id]
    );
}
