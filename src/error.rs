//! Error taxonomy at the orchestrator boundary.
//!
//! Adapter-level failures are [`ConnectorError`]s; anything that aborts a
//! whole sync run is a [`SyncError`] and ends up as the `error` string of the
//! run report.

use sea_orm::DbErr;
use thiserror::Error;

use crate::connectors::ConnectorError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid connection settings; raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The initial credential check failed.
    #[error("{0}")]
    Connectivity(String),

    /// The connection type has no registered adapter.
    #[error("module not found")]
    UnknownProvider { provider: String },

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    /// Failure outside any single target, such as target discovery.
    #[error("upstream error: {0}")]
    Upstream(#[from] ConnectorError),
}

impl SyncError {
    /// Short label used for metrics and structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            SyncError::Configuration(_) => "configuration",
            SyncError::Connectivity(_) => "connectivity",
            SyncError::UnknownProvider { .. } => "unknown_provider",
            SyncError::Database(_) => "database",
            SyncError::Upstream(_) => "upstream",
        }
    }
}

/// True when `error` reports a unique constraint violation (Postgres 23505,
/// SQLite 1555/2067).
pub fn is_unique_violation(error: &DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_reports_module_not_found() {
        let err = SyncError::UnknownProvider {
            provider: "bitbucket".to_string(),
        };
        assert_eq!(err.to_string(), "module not found");
        assert_eq!(err.kind(), "unknown_provider");
    }

    #[test]
    fn non_sqlx_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&DbErr::RecordNotInserted));
        assert!(!is_unique_violation(&DbErr::Custom("boom".to_string())));
    }
}
