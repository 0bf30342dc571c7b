//! Provider registry
//!
//! Static map from connection type to adapter, built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::connectors::{ConnectorError, ProviderMetadata, SourceAdapter};

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider '{name}' not found")]
    ProviderNotFound { name: String },
}

/// Registered adapters and their metadata
#[derive(Clone, Default)]
pub struct Registry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
    metadata: HashMap<String, ProviderMetadata>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConnectorError> {
        let mut registry = Self::new();

        crate::connectors::github::register_github_adapter(
            &mut registry,
            Arc::new(crate::connectors::GitHubAdapter::new(config)?),
        );
        crate::connectors::gitlab::register_gitlab_adapter(
            &mut registry,
            Arc::new(crate::connectors::GitLabAdapter::new(config)?),
        );
        crate::connectors::jira::register_jira_adapter(
            &mut registry,
            Arc::new(crate::connectors::JiraAdapter::new(config)?),
        );

        Ok(registry)
    }

    /// Register a provider with its adapter and metadata
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>, metadata: ProviderMetadata) {
        let name = metadata.name.clone();
        self.adapters.insert(name.clone(), adapter);
        self.metadata.insert(name, metadata);
    }

    /// Adapter for a connection type
    pub fn get(&self, name: &str) -> Result<Arc<dyn SourceAdapter>, RegistryError> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Get metadata for all providers, sorted by name for stable ordering
    pub fn list_metadata(&self) -> Vec<ProviderMetadata> {
        let mut metadata: Vec<_> = self.metadata.values().cloned().collect();
        metadata.sort_by(|a, b| a.name.cmp(&b.name));
        metadata
    }

    pub fn get_metadata(&self, name: &str) -> Result<&ProviderMetadata, RegistryError> {
        self.metadata
            .get(name)
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: name.to_string(),
            })
    }
}
