//! Jira adapter
//!
//! Issues per project through the REST v2 search endpoint, paged with
//! `startAt`/`maxResults`. Jira has no public default host, so every
//! connection names its site in `base_url`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::connectors::http::{ApiClient, AuthScheme, RetryPolicy, build_http_client};
use crate::connectors::pagination::MAX_PAGE_SIZE;
use crate::connectors::settings::ConnectionSettings;
use crate::connectors::{
    AuthType, ConnectorError, ProviderMetadata, Registry, SourceAdapter, SyncContext, Target,
    degrade,
};
use crate::events::{
    DescriptionDetail, EventDescription, EventKind, EventMetadata, IssueMetadata, NewChangeEvent,
    event_key, tagged_title,
};
use crate::repositories::TargetBatch;

pub const JIRA_PROVIDER: &str = "jira";

const SEARCH_FIELDS: &str =
    "summary,description,status,issuetype,priority,assignee,reporter,labels,created,updated";

/// Jira source adapter
#[derive(Debug, Clone)]
pub struct JiraAdapter {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl JiraAdapter {
    pub fn new(config: &AppConfig) -> Result<Self, ConnectorError> {
        Ok(Self {
            http: build_http_client(
                Duration::from_secs(config.http_timeout_seconds),
                "application/json",
            )?,
            retry: RetryPolicy::for_provider(&config.rate_limit_policy, JIRA_PROVIDER),
        })
    }

    fn site(settings: &ConnectionSettings) -> Result<&str, ConnectorError> {
        settings
            .base_url
            .as_deref()
            .ok_or_else(|| ConnectorError::configuration("Jira connections require a base_url"))
    }

    fn client(&self, settings: &ConnectionSettings) -> Result<ApiClient, ConnectorError> {
        let auth = match &settings.email {
            Some(email) => AuthScheme::Basic {
                username: email.clone(),
                password: settings.token().to_string(),
            },
            None => AuthScheme::Bearer(settings.token().to_string()),
        };
        ApiClient::new(
            self.http.clone(),
            JIRA_PROVIDER,
            Self::site(settings)?,
            auth,
            self.retry,
        )
    }

    async fn sync_issues(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let site = Self::site(ctx.settings)?;
        let cap = ctx.limits.per_kind_limit;
        let jql = project_issues_jql(&target.locator);
        let mut start_at = 0usize;
        let mut seen = 0usize;

        while seen < cap {
            let page_size = (cap - seen).min(MAX_PAGE_SIZE).to_string();
            let offset = start_at.to_string();
            let url = client.url(
                "/rest/api/2/search",
                &[
                    ("jql", jql.as_str()),
                    ("startAt", offset.as_str()),
                    ("maxResults", page_size.as_str()),
                    ("fields", SEARCH_FIELDS),
                ],
            )?;
            let page: JiraSearchPage = client.get_json(url).await?;
            if page.issues.is_empty() {
                break;
            }
            start_at += page.issues.len();

            for raw in page.issues {
                if seen >= cap {
                    break;
                }
                seen += 1;
                let issue: JiraIssue = match serde_json::from_value(raw) {
                    Ok(issue) => issue,
                    Err(err) => {
                        warn!(project = %target.name, error = %err, "Skipping malformed issue");
                        continue;
                    }
                };

                batch.record_fetched();
                let event_id = event_key(EventKind::Issue, &target.name, &issue.id);
                if !batch.needs_processing(&event_id).await? {
                    continue;
                }

                let comments: JiraCommentPage = degrade(
                    client
                        .get_json(client.url(
                            &format!("/rest/api/2/issue/{}/comment", issue.key),
                            &[("maxResults", "0")],
                        )?)
                        .await,
                    "issue comments",
                    &event_id,
                );

                let event = normalize_issue(
                    ctx.connection_id,
                    &target.name,
                    site,
                    &issue,
                    comments.total,
                );
                batch.stage(&event).await?;
            }

            if page.total.is_some_and(|total| start_at as u64 >= total) {
                break;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for JiraAdapter {
    fn provider(&self) -> &'static str {
        JIRA_PROVIDER
    }

    fn display_name(&self) -> &'static str {
        "Jira"
    }

    fn validate_settings(&self, settings: &ConnectionSettings) -> Result<(), ConnectorError> {
        Self::site(settings).map(|_| ())
    }

    async fn test_connection(&self, ctx: &SyncContext<'_>) -> Result<(), ConnectorError> {
        let client = self.client(ctx.settings)?;
        let myself: JiraUser = client.get_json(client.url("/rest/api/2/myself", &[])?).await?;
        debug!(user = ?myself.display_name, "Jira credential verified");
        Ok(())
    }

    async fn discover_targets(&self, ctx: &SyncContext<'_>) -> Result<Vec<Target>, ConnectorError> {
        let client = self.client(ctx.settings)?;
        let site = Self::site(ctx.settings)?;

        if !ctx.settings.targets.is_empty() {
            let mut targets = Vec::with_capacity(ctx.settings.targets.len());
            for key in &ctx.settings.targets {
                let lookup: Result<JiraProject, _> =
                    match client.url(&format!("/rest/api/2/project/{key}"), &[]) {
                        Ok(url) => client.get_json(url).await,
                        Err(err) => Err(err),
                    };
                match lookup {
                    Ok(project) => targets.push(project.into_target(site)),
                    Err(err) => warn!(project = %key, error = %err, "Skipping inaccessible project"),
                }
            }
            return Ok(targets);
        }

        let projects: Vec<JiraProject> =
            client.get_json(client.url("/rest/api/2/project", &[])?).await?;
        Ok(projects
            .into_iter()
            .take(ctx.limits.discovery_limit)
            .map(|project| project.into_target(site))
            .collect())
    }

    #[instrument(skip_all, fields(connection_id = %ctx.connection_id, target = %target.name))]
    async fn sync_target(
        &self,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let client = self.client(ctx.settings)?;
        self.sync_issues(&client, ctx, target, batch).await
    }
}

/// Register the Jira adapter with its metadata.
pub fn register_jira_adapter(registry: &mut Registry, adapter: Arc<JiraAdapter>) {
    let metadata = ProviderMetadata::new(
        JIRA_PROVIDER,
        "Jira",
        AuthType::Basic,
        vec![EventKind::Issue],
        true,
    );
    registry.register(adapter, metadata);
}

/// Jira timestamps look like `2025-01-01T10:00:00.000+0000`, which is not RFC 3339.
fn parse_jira_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn normalize_issue(
    connection_id: Uuid,
    project: &str,
    site: &str,
    issue: &JiraIssue,
    comment_count: Option<u64>,
) -> NewChangeEvent {
    let fields = &issue.fields;
    let timestamp = [fields.updated.as_deref(), fields.created.as_deref()]
        .into_iter()
        .flatten()
        .find_map(parse_jira_datetime)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let mut description = EventDescription::new(
        fields.description.clone().unwrap_or_default(),
        fields.labels.clone(),
    );
    if let Some(comment_count) = comment_count {
        description = description.with_detail(DescriptionDetail::Comments { comment_count });
    }

    NewChangeEvent {
        connection_id,
        source: JIRA_PROVIDER.to_string(),
        kind: EventKind::Issue,
        event_id: event_key(EventKind::Issue, project, &issue.id),
        title: tagged_title(
            EventKind::Issue,
            format!("{}: {}", issue.key, fields.summary.as_deref().unwrap_or_default()),
        ),
        description,
        author: fields
            .reporter
            .as_ref()
            .and_then(|u| u.display_name.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        timestamp,
        url: format!("{site}/browse/{}", issue.key),
        status: fields
            .status
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        metadata: EventMetadata::Issue(IssueMetadata {
            project: project.to_string(),
            issue_key: issue.key.clone(),
            issue_type: fields.issuetype.as_ref().map(|t| t.name.clone()),
            priority: fields.priority.as_ref().map(|p| p.name.clone()),
            assignee: fields.assignee.as_ref().and_then(|u| u.display_name.clone()),
            comment_count,
        }),
    }
}

// Jira REST v2 response types

#[derive(Debug, Deserialize)]
struct JiraUser {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JiraProject {
    key: String,
}

impl JiraProject {
    fn into_target(self, site: &str) -> Target {
        let web_url = format!("{site}/browse/{}", self.key);
        Target::new(self.key.clone(), self.key.clone(), self.key).with_web_url(web_url)
    }
}

#[derive(Debug, Deserialize)]
struct JiraSearchPage {
    total: Option<u64>,
    #[serde(default)]
    issues: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    id: String,
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Deserialize)]
struct JiraNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct JiraFields {
    summary: Option<String>,
    description: Option<String>,
    status: Option<JiraNamed>,
    issuetype: Option<JiraNamed>,
    priority: Option<JiraNamed>,
    assignee: Option<JiraUser>,
    reporter: Option<JiraUser>,
    #[serde(default)]
    labels: Vec<String>,
    created: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JiraCommentPage {
    total: Option<u64>,
}

/// JQL selecting a project's issues, newest update first.
fn project_issues_jql(project_key: &str) -> String {
    let quoted = project_key.replace('\\', "\\\\").replace('"', "\\\"");
    format!("project = \"{quoted}\" ORDER BY updated DESC")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn project_key_is_quoted_in_jql() {
        assert_eq!(
            project_issues_jql("OPS"),
            r#"project = "OPS" ORDER BY updated DESC"#
        );
        assert_eq!(
            project_issues_jql(r#"OPS" OR project = "SEC\"#),
            r#"project = "OPS\" OR project = \"SEC\\" ORDER BY updated DESC"#
        );
    }

    #[test]
    fn parses_jira_offset_timestamps() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(
            parse_jira_datetime("2025-01-01T10:00:00.000+0200"),
            Some(expected)
        );
        assert_eq!(parse_jira_datetime("2025-01-01T08:00:00Z"), Some(expected));
        assert_eq!(parse_jira_datetime("yesterday"), None);
    }

    #[test]
    fn issue_normalization() {
        let issue: JiraIssue = serde_json::from_value(json!({
            "id": "10042",
            "key": "OPS-7",
            "fields": {
                "summary": "Rotate certificates",
                "description": null,
                "status": {"name": "In Progress"},
                "issuetype": {"name": "Task"},
                "priority": {"name": "High"},
                "assignee": {"displayName": "Sam"},
                "reporter": {"displayName": "Kim"},
                "labels": ["infra"],
                "created": "2025-02-01T09:00:00.000+0000",
                "updated": "2025-02-03T09:00:00.000+0000"
            }
        }))
        .unwrap();

        let event = normalize_issue(Uuid::nil(), "OPS", "https://acme.atlassian.net", &issue, Some(4));
        assert_eq!(event.event_id, "issue-OPS-10042");
        assert_eq!(event.title, "[Issue] OPS-7: Rotate certificates");
        assert_eq!(event.status, "In Progress");
        assert_eq!(event.author, "Kim");
        assert_eq!(event.url, "https://acme.atlassian.net/browse/OPS-7");
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap()
        );

        let description = event.description_payload().unwrap();
        assert_eq!(description["labels"], json!(["infra"]));
        assert_eq!(description["comment_count"], 4);
        let metadata = event.metadata_payload().unwrap();
        assert_eq!(metadata["priority"], "High");
        assert_eq!(metadata["assignee"], "Sam");
    }

    #[test]
    fn missing_dates_fall_back_to_epoch() {
        let issue: JiraIssue = serde_json::from_value(json!({
            "id": "1",
            "key": "OPS-1",
            "fields": {}
        }))
        .unwrap();

        let event = normalize_issue(Uuid::nil(), "OPS", "https://x", &issue, None);
        assert_eq!(event.timestamp, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(event.author, "unknown");
        assert!(event.description_payload().unwrap().get("comment_count").is_none());
    }
}
