//! Change event repository
//!
//! Append-only store keyed by `(connection_id, event_id)`. The unique index on
//! that pair is the authoritative dedup guard; the existence check in
//! [`TargetBatch::needs_processing`] only saves enrichment calls.

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::config::DedupPolicy;
use crate::connectors::SyncCounts;
use crate::error::is_unique_violation;
use crate::events::NewChangeEvent;
use crate::models::change_event::{self, Entity as ChangeEvent};

/// Result of [`ChangeEventRepository::upsert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: bool,
}

/// What happened to one event handed to [`TargetBatch::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Inserted,
    Refreshed,
    Duplicate,
}

/// Repository over any connection or transaction handle.
pub struct ChangeEventRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ChangeEventRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn exists(&self, connection_id: Uuid, event_id: &str) -> Result<bool, DbErr> {
        let count = ChangeEvent::find()
            .filter(change_event::Column::ConnectionId.eq(connection_id))
            .filter(change_event::Column::EventId.eq(event_id))
            .count(self.conn)
            .await?;
        Ok(count > 0)
    }

    /// Insert `event` unless a row with the same key already exists.
    ///
    /// Existing rows are left untouched. Losing a concurrent insert race is
    /// reported as `inserted: false`, never as an error.
    pub async fn upsert_if_absent(&self, event: &NewChangeEvent) -> Result<UpsertOutcome, DbErr> {
        let model = event
            .into_active_model(Utc::now())
            .map_err(|e| DbErr::Json(e.to_string()))?;

        let result = ChangeEvent::insert(model)
            .on_conflict(
                OnConflict::columns([
                    change_event::Column::ConnectionId,
                    change_event::Column::EventId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await;

        match result {
            Ok(rows) => Ok(UpsertOutcome { inserted: rows > 0 }),
            Err(DbErr::RecordNotInserted) => Ok(UpsertOutcome { inserted: false }),
            Err(err) if is_unique_violation(&err) => Ok(UpsertOutcome { inserted: false }),
            Err(err) => Err(err),
        }
    }

    /// Rewrite the mutable fields of an existing row. Returns whether a row
    /// matched. Only used under [`DedupPolicy::Refresh`].
    pub async fn refresh(&self, event: &NewChangeEvent) -> Result<bool, DbErr> {
        let description = event
            .description_payload()
            .map_err(|e| DbErr::Json(e.to_string()))?;
        let metadata = event
            .metadata_payload()
            .map_err(|e| DbErr::Json(e.to_string()))?;

        let result = ChangeEvent::update_many()
            .col_expr(change_event::Column::Title, Expr::value(event.title.clone()))
            .col_expr(change_event::Column::Description, Expr::value(description))
            .col_expr(change_event::Column::Status, Expr::value(event.status.clone()))
            .col_expr(
                change_event::Column::Timestamp,
                Expr::value(event.timestamp.fixed_offset()),
            )
            .col_expr(change_event::Column::Metadata, Expr::value(metadata))
            .filter(change_event::Column::ConnectionId.eq(event.connection_id))
            .filter(change_event::Column::EventId.eq(event.event_id.as_str()))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Events of one connection, newest first.
    pub async fn list_for_connection(
        &self,
        connection_id: Uuid,
    ) -> Result<Vec<change_event::Model>, DbErr> {
        ChangeEvent::find()
            .filter(change_event::Column::ConnectionId.eq(connection_id))
            .order_by_desc(change_event::Column::Timestamp)
            .order_by_asc(change_event::Column::EventId)
            .all(self.conn)
            .await
    }

    pub async fn count_for_connection(&self, connection_id: Uuid) -> Result<u64, DbErr> {
        ChangeEvent::find()
            .filter(change_event::Column::ConnectionId.eq(connection_id))
            .count(self.conn)
            .await
    }
}

/// Events staged for one target inside its own transaction.
///
/// Dropping a batch without calling [`TargetBatch::commit`] rolls the
/// transaction back.
pub struct TargetBatch {
    txn: DatabaseTransaction,
    connection_id: Uuid,
    policy: DedupPolicy,
    counts: SyncCounts,
}

impl TargetBatch {
    pub fn new(txn: DatabaseTransaction, connection_id: Uuid, policy: DedupPolicy) -> Self {
        Self {
            txn,
            connection_id,
            policy,
            counts: SyncCounts::default(),
        }
    }

    /// Count one upstream item, whether or not it is stored.
    pub fn record_fetched(&mut self) {
        self.counts.fetched += 1;
    }

    /// False when the item is already stored and will not be rewritten, so
    /// the adapter can skip its enrichment calls.
    pub async fn needs_processing(&self, event_id: &str) -> Result<bool, DbErr> {
        match self.policy {
            DedupPolicy::Refresh => Ok(true),
            DedupPolicy::InsertOnly => {
                let repo = ChangeEventRepository::new(&self.txn);
                Ok(!repo.exists(self.connection_id, event_id).await?)
            }
        }
    }

    pub async fn stage(&mut self, event: &NewChangeEvent) -> Result<StageOutcome, DbErr> {
        let repo = ChangeEventRepository::new(&self.txn);

        if repo.upsert_if_absent(event).await?.inserted {
            self.counts.stored += 1;
            return Ok(StageOutcome::Inserted);
        }

        if self.policy == DedupPolicy::Refresh && repo.refresh(event).await? {
            self.counts.refreshed += 1;
            return Ok(StageOutcome::Refreshed);
        }

        Ok(StageOutcome::Duplicate)
    }

    pub fn counts(&self) -> SyncCounts {
        self.counts
    }

    pub async fn commit(self) -> Result<SyncCounts, DbErr> {
        self.txn.commit().await?;
        Ok(self.counts)
    }

    /// Discard staged rows. The fetched count survives since those upstream
    /// calls did happen.
    pub async fn rollback(self) -> Result<SyncCounts, DbErr> {
        self.txn.rollback().await?;
        Ok(SyncCounts {
            fetched: self.counts.fetched,
            ..SyncCounts::default()
        })
    }
}
