//! Connection repository for database operations
//!
//! The sync engine only reads connections and stamps `last_sync`; `create`
//! exists for the CLI and tests.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::connection::{self, Entity as Connection};

/// Repository for connection database operations
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> ConnectionRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<connection::Model>, DbErr> {
        Connection::find_by_id(id).one(self.db).await
    }

    /// Enabled connections ordered by name.
    pub async fn list_enabled(&self) -> Result<Vec<connection::Model>, DbErr> {
        Connection::find()
            .filter(connection::Column::Enabled.eq(true))
            .order_by_asc(connection::Column::Name)
            .order_by_asc(connection::Column::Id)
            .all(self.db)
            .await
    }

    /// Record a successful sync completion.
    pub async fn mark_synced(&self, id: Uuid) -> Result<(), DbErr> {
        let now = Utc::now().fixed_offset();
        connection::ActiveModel {
            id: Set(id),
            last_sync: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(self.db)
        .await?;
        Ok(())
    }

    pub async fn create(
        &self,
        name: &str,
        provider_slug: &str,
        config: JsonValue,
        enabled: bool,
    ) -> Result<connection::Model, DbErr> {
        let now = Utc::now().fixed_offset();
        connection::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            provider_slug: Set(provider_slug.to_string()),
            config: Set(config),
            enabled: Set(enabled),
            tags: Set(None),
            last_sync: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db)
        .await
    }
}
