//! PostgreSQL 事件仓储测试
//!
//! 需要可用的数据库：`DATABASE_URL=... cargo test -- --ignored`

use chrono::Utc;
use shisha_dashboard_service::models::NewEvent;
use shisha_dashboard_service::repository::{EventRepository, PgEventRepository};
use shisha_shared::database::Database;
use shisha_shared::events::MarketEvent;
use shisha_shared::test_utils::{test_database_config, test_username};

async fn setup() -> PgEventRepository {
    let db = Database::connect(&test_database_config()).await.unwrap();
    let mut migrator = sqlx::migrate!("./migrations");
    db.run_migrations(&mut migrator).await.unwrap();
    PgEventRepository::new(db.pool().clone())
}

#[tokio::test]
#[ignore]
async fn test_insert_and_aggregate() {
    let repo = setup().await;
    let buyer = test_username();
    let before = repo.money_earned().await.unwrap();

    for _ in 0..3 {
        let event = MarketEvent::Buy {
            user: buyer.clone(),
            image_uuid: "premium".into(),
            amount: 25,
        };
        repo.insert(&NewEvent::from_market_event(&event, Utc::now()))
            .await
            .unwrap();
    }

    assert_eq!(repo.money_earned().await.unwrap(), before + 75);

    let recent = repo.recent(3).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent.iter().all(|e| e.actor == buyer));
    assert!(recent[0].event_date >= recent[2].event_date);
}

#[tokio::test]
#[ignore]
async fn test_ping() {
    let repo = setup().await;
    repo.ping().await.unwrap();
}
