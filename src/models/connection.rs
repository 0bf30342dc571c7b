//! Connection entity model
//!
//! A configured integration instance of one provider type. Rows are managed
//! by an external admin surface; the sync engine only reads them and stamps
//! `last_sync` after a successful run.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "connections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human readable label
    pub name: String,

    /// Connection type; must match a registered adapter
    pub provider_slug: String,

    /// Provider settings document (token, repos, branches, base_url, ...)
    #[sea_orm(column_type = "JsonBinary")]
    pub config: JsonValue,

    pub enabled: bool,

    /// Free-form comma separated tags
    pub tags: Option<String>,

    /// Completion time of the last successful sync
    pub last_sync: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::change_event::Entity")]
    ChangeEvents,
}

impl Related<super::change_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChangeEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
