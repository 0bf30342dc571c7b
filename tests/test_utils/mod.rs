//! Test utilities shared by the integration tests.
//!
//! In-memory SQLite databases with migrations applied, connection fixtures,
//! and wiremock helpers standing in for the provider APIs.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use changefeed::config::{AppConfig, DedupPolicy, RateLimitPolicyConfig};
use changefeed::connectors::Registry;
use changefeed::models::{change_event, connection};
use changefeed::repositories::ConnectionRepository;
use changefeed::sync_executor::SyncEngine;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// `sqlite::memory:` pools hold a single connection, so every test sees one
/// shared database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Inserts a connection row through the repository.
pub async fn insert_connection(
    db: &DatabaseConnection,
    provider_slug: &str,
    config: JsonValue,
    enabled: bool,
) -> Result<connection::Model> {
    let model = ConnectionRepository::new(db)
        .create(&format!("{provider_slug} test"), provider_slug, config, enabled)
        .await?;
    Ok(model)
}

/// Configuration pointing the GitHub and GitLab adapters at `server`, with
/// rate-limit backoff collapsed to zero so retries do not sleep.
pub fn test_config(server: &MockServer) -> AppConfig {
    AppConfig {
        http_timeout_seconds: 5,
        github_api_base: server.uri(),
        gitlab_api_base: format!("{}/api/v4", server.uri()),
        rate_limit_policy: RateLimitPolicyConfig {
            base_seconds: 0,
            max_seconds: 0,
            jitter_factor: 0.0,
            max_retries: 2,
            ..RateLimitPolicyConfig::default()
        },
        ..AppConfig::default()
    }
}

pub fn with_dedup(mut config: AppConfig, policy: DedupPolicy) -> AppConfig {
    config.dedup_policy = policy;
    config
}

/// Engine wired with every built-in adapter.
pub fn engine(db: &DatabaseConnection, config: &AppConfig) -> SyncEngine {
    let registry = Registry::from_config(config).expect("registry builds");
    SyncEngine::new(db.clone(), Arc::new(registry), config)
}

/// Lowest-priority catch-all: any GET not matched by a test-specific mock
/// returns an empty JSON array.
pub async fn mount_empty_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .with_priority(10)
        .mount(server)
        .await;
}

/// Stored events of one connection ordered by event id.
pub async fn stored_events(
    db: &DatabaseConnection,
    connection_id: Uuid,
) -> Result<Vec<change_event::Model>> {
    let events = change_event::Entity::find()
        .filter(change_event::Column::ConnectionId.eq(connection_id))
        .order_by_asc(change_event::Column::EventId)
        .all(db)
        .await?;
    Ok(events)
}

pub async fn reload_connection(
    db: &DatabaseConnection,
    connection_id: Uuid,
) -> Result<connection::Model> {
    ConnectionRepository::new(db)
        .find_by_id(connection_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("connection {connection_id} missing"))
}
