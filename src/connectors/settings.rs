//! Per-connection settings parsed from the connection's JSON config.

use std::fmt;

use serde_json::Value as JsonValue;

use crate::connectors::ConnectorError;

/// Recognized connection configuration keys.
///
/// List-valued keys accept either a comma separated string or a JSON array.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    token: String,
    /// Explicit repositories or projects; empty means discovery
    pub targets: Vec<String>,
    /// Branch allowlist; empty means no filtering
    pub branches: Vec<String>,
    /// Poll interval in seconds, consumed by external schedulers only
    pub poll_interval: Option<u64>,
    pub enterprise: bool,
    pub base_url: Option<String>,
    /// Basic auth user for providers that need one (Jira Cloud)
    pub email: Option<String>,
}

impl ConnectionSettings {
    /// Parse `config`; `provider_label` names the provider in error messages.
    pub fn from_config(provider_label: &str, config: &JsonValue) -> Result<Self, ConnectorError> {
        if !config.is_object() {
            return Err(ConnectorError::configuration(format!(
                "{provider_label} connection config must be a JSON object"
            )));
        }

        let token = first_string(config, &["token"]).ok_or_else(|| {
            ConnectorError::configuration(format!("No {provider_label} token configured"))
        })?;

        let targets = ["repos", "projects"]
            .iter()
            .map(|key| string_list(config.get(*key)))
            .find(|list| !list.is_empty())
            .unwrap_or_default();

        let poll_interval = config.get("poll_interval").and_then(|value| match value {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        Ok(Self {
            token,
            targets,
            branches: string_list(config.get("branches")),
            poll_interval,
            enterprise: ["isEnterprise", "is_enterprise"]
                .iter()
                .any(|key| flag(config.get(*key))),
            base_url: first_string(config, &["base_url", "baseUrl"])
                .map(|url| url.trim_end_matches('/').to_string()),
            email: first_string(config, &["email"]),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The alternate base URL when the enterprise flag is set, else `default`.
    pub fn api_base<'a>(&'a self, default: &'a str) -> &'a str {
        match (&self.base_url, self.enterprise) {
            (Some(base_url), true) => base_url,
            _ => default,
        }
    }

    pub fn has_branch_filter(&self) -> bool {
        !self.branches.is_empty()
    }

    /// Whether an item on `branch` passes the allowlist.
    pub fn branch_allowed(&self, branch: Option<&str>) -> bool {
        if !self.has_branch_filter() {
            return true;
        }
        branch.is_some_and(|b| self.branches.iter().any(|allowed| allowed == b))
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("token", &"[REDACTED]")
            .field("targets", &self.targets)
            .field("branches", &self.branches)
            .field("poll_interval", &self.poll_interval)
            .field("enterprise", &self.enterprise)
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .finish()
    }
}

fn first_string(config: &JsonValue, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| config.get(*key).and_then(JsonValue::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(JsonValue::String(raw)) => raw.split(',').map(str::to_string).collect(),
        Some(JsonValue::Array(values)) => values
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn flag(value: Option<&JsonValue>) -> bool {
    match value {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        }
        _ => false,
    }
}
