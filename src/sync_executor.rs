//! Sync orchestrator
//!
//! Resolves a connection to its adapter, checks the credential, runs the
//! adapter's per-target fetch loop and stamps `last_sync` when the run
//! completes. Every outcome is reported as a [`SyncReport`]; nothing here
//! panics or propagates errors to the caller.

use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{AppConfig, DedupPolicy, SyncLimits};
use crate::connectors::{ConnectionSettings, Registry, SyncContext, SyncCounts};
use crate::error::SyncError;
use crate::models::connection;
use crate::repositories::ConnectionRepository;

/// Reason attached to runs that never started.
pub const SKIP_REASON: &str = "disabled or not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Skipped,
    Error,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Skipped => "skipped",
            SyncStatus::Error => "error",
        }
    }
}

/// Outcome of one run, returned to whoever triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub fetched: u64,
    pub stored: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub refreshed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl SyncReport {
    pub fn success(counts: SyncCounts) -> Self {
        Self {
            status: SyncStatus::Success,
            fetched: counts.fetched,
            stored: counts.stored,
            refreshed: counts.refreshed,
            reason: None,
            error: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Skipped,
            fetched: 0,
            stored: 0,
            refreshed: 0,
            reason: Some(reason.into()),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            fetched: 0,
            stored: 0,
            refreshed: 0,
            reason: None,
            error: Some(message.into()),
        }
    }
}

/// Runs connections against the registered adapters.
#[derive(Clone)]
pub struct SyncEngine {
    db: DatabaseConnection,
    registry: Arc<Registry>,
    limits: SyncLimits,
    dedup: DedupPolicy,
    concurrency: usize,
}

impl SyncEngine {
    pub fn new(db: DatabaseConnection, registry: Arc<Registry>, config: &AppConfig) -> Self {
        Self {
            db,
            registry,
            limits: config.sync.clone(),
            dedup: config.dedup_policy,
            concurrency: config.sync_concurrency.max(1),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Sync one connection end to end.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn run_sync(&self, connection_id: Uuid) -> SyncReport {
        let connections = ConnectionRepository::new(&self.db);

        let connection = match connections.find_by_id(connection_id).await {
            Ok(Some(connection)) if connection.enabled => connection,
            Ok(_) => {
                info!("Connection disabled or not found; skipping");
                record_run("unknown", SyncStatus::Skipped);
                return SyncReport::skipped(SKIP_REASON);
            }
            Err(err) => return self.report_failure("unknown", SyncError::from(err)),
        };

        let provider = connection.provider_slug.clone();
        let started = Instant::now();

        let counts = match self.execute(&connection).await {
            Ok(counts) => counts,
            Err(err) => return self.report_failure(&provider, err),
        };

        if let Err(err) = connections.mark_synced(connection.id).await {
            return self.report_failure(&provider, SyncError::from(err));
        }

        counter!("changefeed_events_stored_total", "provider" => provider.clone())
            .increment(counts.stored);
        record_run(&provider, SyncStatus::Success);
        info!(
            provider = %provider,
            fetched = counts.fetched,
            stored = counts.stored,
            refreshed = counts.refreshed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync completed"
        );

        SyncReport::success(counts)
    }

    async fn execute(&self, connection: &connection::Model) -> Result<SyncCounts, SyncError> {
        let adapter = self
            .registry
            .get(&connection.provider_slug)
            .map_err(|_| SyncError::UnknownProvider {
                provider: connection.provider_slug.clone(),
            })?;

        let settings = ConnectionSettings::from_config(adapter.display_name(), &connection.config)
            .and_then(|settings| adapter.validate_settings(&settings).map(|()| settings))
            .map_err(|err| SyncError::Configuration(err.to_string()))?;

        let ctx = SyncContext {
            db: &self.db,
            connection_id: connection.id,
            settings: &settings,
            limits: &self.limits,
            dedup: self.dedup,
        };

        adapter.test_connection(&ctx).await.map_err(|err| {
            SyncError::Connectivity(format!(
                "Failed to connect to {}: {err}",
                adapter.display_name()
            ))
        })?;

        adapter.fetch_and_normalize(&ctx).await
    }

    fn report_failure(&self, provider: &str, err: SyncError) -> SyncReport {
        warn!(provider, kind = err.kind(), error = %err, "Sync failed");
        record_run(provider, SyncStatus::Error);
        SyncReport::failed(err.to_string())
    }

    /// Sync every enabled connection, at most `sync_concurrency` at a time.
    #[instrument(skip(self), fields(concurrency = self.concurrency))]
    pub async fn sync_all(&self) -> Result<Vec<(Uuid, SyncReport)>, SyncError> {
        let connections = ConnectionRepository::new(&self.db).list_enabled().await?;
        let count = connections.len();
        if connections.is_empty() {
            info!("No enabled connections to sync");
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(count);
        for connection in connections {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                engine.run_sync(connection.id).await
            });
            handles.push((connection.id, handle));
        }

        let mut reports = Vec::with_capacity(count);
        for (connection_id, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(err) => {
                    error!(%connection_id, error = %err, "Sync task aborted");
                    SyncReport::failed(format!("sync task aborted: {err}"))
                }
            };
            reports.push((connection_id, report));
        }

        info!(connections = count, "Completed sync of all enabled connections");
        Ok(reports)
    }
}

fn record_run(provider: &str, status: SyncStatus) {
    counter!(
        "changefeed_sync_runs_total",
        "provider" => provider.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
}
