//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `oddhay_test`)
//!   `TEST_DB_PASSWORD` (default: `oddhay_test`)
//!   `TEST_DB_NAME` (default: `oddhay_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use oddhay_common::IdGenerator;
use oddhay_db::entities::push_subscription::DeviceType;
use oddhay_db::entities::user::{self, UserRole};
use oddhay_db::entities::{notification_log, push_subscription};
use oddhay_db::repositories::{
    NotificationLogRepository, PushSubscriptionRepository, UserRepository,
};
use oddhay_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;

fn subscription_model(
    id: &str,
    user_id: &str,
    endpoint: &str,
    p256dh: &str,
) -> push_subscription::ActiveModel {
    push_subscription::ActiveModel {
        id: Set(id.to_string()),
        user_id: Set(user_id.to_string()),
        endpoint: Set(endpoint.to_string()),
        p256dh: Set(p256dh.to_string()),
        auth: Set("auth-secret".to_string()),
        user_agent: Set(None),
        device_type: Set(DeviceType::Unknown),
        is_active: Set(true),
        last_used_at: Set(Utc::now().into()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
}

async fn seed_user(repo: &UserRepository, username: &str) -> user::Model {
    let id_gen = IdGenerator::new();
    repo.create(user::ActiveModel {
        id: Set(id_gen.generate()),
        username: Set(username.to_string()),
        username_lower: Set(username.to_lowercase()),
        token: Set(Some(id_gen.generate_token())),
        name: Set(None),
        role: Set(UserRole::Student),
        class_level: Set(Some("Class 6".to_string())),
        created_at: Set(Utc::now().into()),
    })
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn subscribe_twice_keeps_one_row_with_latest_keys() {
    let db = TestDatabase::new().await.unwrap();
    db.cleanup().await.unwrap();
    // `DatabaseConnection` is not `Clone` when sea-orm's `mock` feature is
    // enabled (it is, for the unit tests), so move the connection out.
    let conn = Arc::new(db.conn);

    let users = UserRepository::new(Arc::clone(&conn));
    let subs = PushSubscriptionRepository::new(Arc::clone(&conn));
    let user = seed_user(&users, "alice").await;

    let endpoint = "https://push.example/ep-1";
    subs.upsert(subscription_model("sub-1", &user.id, endpoint, "key-old"))
        .await
        .unwrap();
    subs.upsert(subscription_model("sub-2", &user.id, endpoint, "key-new"))
        .await
        .unwrap();

    let active = subs.find_active_by_user(&user.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].p256dh, "key-new");
    assert!(active[0].is_active);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn deactivate_unknown_endpoint_is_a_noop() {
    let db = TestDatabase::new().await.unwrap();
    // `DatabaseConnection` is not `Clone` when sea-orm's `mock` feature is
    // enabled (it is, for the unit tests), so move the connection out.
    let conn = Arc::new(db.conn);
    let subs = PushSubscriptionRepository::new(conn);

    // Never seen and already-inactive endpoints both succeed silently
    subs.deactivate_by_endpoint("https://push.example/never-seen")
        .await
        .unwrap();
    subs.deactivate_by_endpoint("https://push.example/never-seen")
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn log_page_returns_newest_first_with_totals() {
    let db = TestDatabase::new().await.unwrap();
    db.cleanup().await.unwrap();
    // `DatabaseConnection` is not `Clone` when sea-orm's `mock` feature is
    // enabled (it is, for the unit tests), so move the connection out.
    let conn = Arc::new(db.conn);

    let users = UserRepository::new(Arc::clone(&conn));
    let logs = NotificationLogRepository::new(Arc::clone(&conn));
    let user = seed_user(&users, "bob").await;
    let id_gen = IdGenerator::new();

    for i in 0..3_i64 {
        logs.create(notification_log::ActiveModel {
            id: Set(id_gen.generate()),
            user_id: Set(user.id.clone()),
            title: Set(format!("title {i}")),
            body: Set("body".to_string()),
            notification_type: Set(notification_log::NotificationType::Custom),
            icon: Set(None),
            url: Set(None),
            data: Set(None),
            priority: Set(notification_log::Priority::Normal),
            campaign: Set(None),
            status: Set(notification_log::DeliveryStatus::Pending),
            sent_at: Set(None),
            clicked_at: Set(None),
            error: Set(None),
            // Distinct timestamps so the ordering assertion is stable
            created_at: Set((Utc::now() + chrono::Duration::seconds(i)).into()),
        })
        .await
        .unwrap();
    }

    let (rows, total) = logs.find_page(Some(&user.id), 1, 2).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(total, 3);

    // Newest first
    assert_eq!(rows[0].title, "title 2");
    assert_eq!(rows[1].title, "title 1");
}
