//! Provider metadata types
//!
//! Describes each registered provider: how it authenticates and which event
//! kinds it produces.

use serde::Serialize;

use crate::events::EventKind;

/// Credential scheme a provider expects for its token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// GitLab personal access token header
    PrivateToken,
    /// Basic authentication (email + API token)
    Basic,
}

/// Metadata about a provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetadata {
    /// Slug matched against `connections.provider_slug`
    pub name: String,
    pub display_name: String,
    pub auth_type: AuthType,
    /// Event kinds this provider emits
    pub entity_kinds: Vec<String>,
    /// Whether an alternate (self-hosted) API base URL is honored
    pub supports_enterprise: bool,
}

impl ProviderMetadata {
    pub fn new(
        name: &str,
        display_name: &str,
        auth_type: AuthType,
        entity_kinds: Vec<EventKind>,
        supports_enterprise: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            auth_type,
            entity_kinds: entity_kinds
                .into_iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
            supports_enterprise,
        }
    }
}
