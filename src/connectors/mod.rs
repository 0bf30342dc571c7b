//! Connectors module
//!
//! This module provides the source adapter layer:
//! - The `SourceAdapter` trait every provider implements
//! - Provider metadata and the registry used for lookup by connection type
//! - Shared HTTP client, pagination and connection settings
//! - GitHub, GitLab and Jira adapters

pub mod github;
pub mod gitlab;
pub mod http;
pub mod jira;
pub mod metadata;
pub mod pagination;
pub mod registry;
pub mod settings;
pub mod trait_;

use tracing::warn;

use crate::events::EventKind;

pub use github::{GITHUB_PROVIDER, GitHubAdapter, register_github_adapter};
pub use gitlab::{GITLAB_PROVIDER, GitLabAdapter, register_gitlab_adapter};
pub use jira::{JIRA_PROVIDER, JiraAdapter, register_jira_adapter};
pub use metadata::{AuthType, ProviderMetadata};
pub use registry::{Registry, RegistryError};
pub use settings::ConnectionSettings;
pub use trait_::{ConnectorError, SourceAdapter, SyncContext, SyncCounts, Target};

/// Value of an optional enrichment call, or its default when the call failed.
pub(crate) fn degrade<T: Default>(
    result: Result<T, ConnectorError>,
    enrichment: &str,
    event_id: &str,
) -> T {
    result.unwrap_or_else(|err| {
        warn!(event_id, enrichment, error = %err, "Enrichment failed; using defaults");
        T::default()
    })
}

/// Log and swallow a failed secondary kind so the rest of the target proceeds.
///
/// Store errors still propagate: the target transaction can no longer be
/// trusted once a write failed.
pub(crate) fn tolerate_kind_failure(
    result: Result<(), ConnectorError>,
    target: &Target,
    kind: EventKind,
) -> Result<(), ConnectorError> {
    match result {
        Err(err @ ConnectorError::Store(_)) => Err(err),
        Err(err) => {
            warn!(target = %target.name, kind = %kind, error = %err, "Skipping entity kind");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
