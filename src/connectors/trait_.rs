//! Source adapter contract
//!
//! Every provider implements [`SourceAdapter`]. The provided
//! [`SourceAdapter::fetch_and_normalize`] drives the shared target loop: one
//! transaction per target, committed when the target completes and rolled
//! back when it fails, so earlier targets keep their events.

use std::ops::AddAssign;

use async_trait::async_trait;
use metrics::counter;
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{DedupPolicy, SyncLimits};
use crate::connectors::settings::ConnectionSettings;
use crate::error::SyncError;
use crate::repositories::change_event::TargetBatch;

/// Adapter-level errors.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Non-success response from the provider
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// Credential rejected
    #[error("authentication error: {details}")]
    Authentication { details: String },

    /// Still rate limited after exhausting retries
    #[error("rate limit exceeded{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    /// Transport failure (DNS, TLS, timeout)
    #[error("network error: {details}")]
    Network { details: String },

    /// Body did not match the expected shape
    #[error("malformed response: {details}")]
    MalformedResponse { details: String },

    /// Connection settings unusable for this provider
    #[error("{details}")]
    Configuration { details: String },

    /// Staging events for the current target failed
    #[error("store error: {0}")]
    Store(#[from] DbErr),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|secs| format!(" (retry after: {secs}s)"))
        .unwrap_or_default()
}

impl ConnectorError {
    pub fn configuration(details: impl Into<String>) -> Self {
        Self::Configuration {
            details: details.into(),
        }
    }

    pub fn malformed(details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            details: details.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404, .. })
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::malformed(err.to_string())
        } else {
            Self::Network {
                details: err.to_string(),
            }
        }
    }
}

/// One repository or project processed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Human readable scope used in event ids and metadata (`owner/repo`, `group/project`, `KEY`)
    pub name: String,
    /// Identifier used in API paths; equal to `name` unless the provider has numeric ids
    pub locator: String,
    /// Owning account or group
    pub owner: String,
    /// Browser URL of the repository or project, when known
    pub web_url: Option<String>,
}

impl Target {
    pub fn new(name: impl Into<String>, locator: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            owner: owner.into(),
            web_url: None,
        }
    }

    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.web_url = Some(web_url.into());
        self
    }
}

/// Fetched and stored counters for a run or a single target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    /// Upstream items seen, including those filtered out or already stored
    pub fetched: u64,
    /// New rows inserted
    pub stored: u64,
    /// Existing rows rewritten under [`DedupPolicy::Refresh`]
    pub refreshed: u64,
}

impl AddAssign for SyncCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.fetched += rhs.fetched;
        self.stored += rhs.stored;
        self.refreshed += rhs.refreshed;
    }
}

/// Everything an adapter needs for one run of one connection.
#[derive(Debug, Clone, Copy)]
pub struct SyncContext<'a> {
    pub db: &'a DatabaseConnection,
    pub connection_id: Uuid,
    pub settings: &'a ConnectionSettings,
    pub limits: &'a SyncLimits,
    pub dedup: DedupPolicy,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provider slug matched against `connections.provider_slug`.
    fn provider(&self) -> &'static str;

    /// Name used in user-facing messages ("GitHub").
    fn display_name(&self) -> &'static str;

    /// Reject settings this provider cannot work with before any network call.
    fn validate_settings(&self, _settings: &ConnectionSettings) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Cheap authenticated call proving the credential works.
    async fn test_connection(&self, ctx: &SyncContext<'_>) -> Result<(), ConnectorError>;

    /// Explicitly configured targets, or a bounded default set from the account.
    async fn discover_targets(&self, ctx: &SyncContext<'_>) -> Result<Vec<Target>, ConnectorError>;

    /// Fetch every entity kind of one target and stage its events in `batch`.
    async fn sync_target(
        &self,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError>;

    /// Run all targets with per-target commit and failure isolation.
    async fn fetch_and_normalize(&self, ctx: &SyncContext<'_>) -> Result<SyncCounts, SyncError> {
        let provider = self.provider();
        let targets = self.discover_targets(ctx).await?;
        info!(
            connection_id = %ctx.connection_id,
            provider,
            targets = targets.len(),
            "Resolved sync targets"
        );

        let mut totals = SyncCounts::default();
        for target in &targets {
            let txn = ctx.db.begin().await?;
            let mut batch = TargetBatch::new(txn, ctx.connection_id, ctx.dedup);

            match self.sync_target(ctx, target, &mut batch).await {
                Ok(()) => {
                    let counts = batch.commit().await?;
                    info!(
                        connection_id = %ctx.connection_id,
                        provider,
                        target = %target.name,
                        fetched = counts.fetched,
                        stored = counts.stored,
                        "Committed target"
                    );
                    totals += counts;
                }
                Err(err) => {
                    let counts = batch.rollback().await?;
                    warn!(
                        connection_id = %ctx.connection_id,
                        provider,
                        target = %target.name,
                        error = %err,
                        "Target failed; staged events rolled back"
                    );
                    counter!("changefeed_target_failures_total", "provider" => provider)
                        .increment(1);
                    totals += counts;
                }
            }
        }

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate() {
        let mut totals = SyncCounts::default();
        totals += SyncCounts {
            fetched: 3,
            stored: 2,
            refreshed: 0,
        };
        totals += SyncCounts {
            fetched: 4,
            stored: 1,
            refreshed: 1,
        };
        assert_eq!(
            totals,
            SyncCounts {
                fetched: 7,
                stored: 3,
                refreshed: 1
            }
        );
    }

    #[test]
    fn rate_limit_message_includes_hint() {
        let err = ConnectorError::RateLimited {
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "rate limit exceeded (retry after: 30s)");
        let err = ConnectorError::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "rate limit exceeded");
    }

    #[test]
    fn not_found_detection() {
        let err = ConnectorError::Http {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
    }
}
