//! Canonical change event model.
//!
//! Adapters map provider-native payloads into [`NewChangeEvent`]. Per-kind
//! metadata stays strongly typed in [`EventMetadata`] until the storage
//! boundary, where [`NewChangeEvent::into_active_model`] flattens it into the
//! generic JSON payload columns.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::change_event;

/// Kind of upstream occurrence a change event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PullRequest,
    MergeRequest,
    Release,
    WorkflowRun,
    Pipeline,
    Commit,
    RegistryImage,
    Issue,
}

impl EventKind {
    /// Prefix placed in front of every title of this kind.
    pub const fn title_tag(self) -> &'static str {
        match self {
            EventKind::PullRequest => "[PR]",
            EventKind::MergeRequest => "[MR]",
            EventKind::Release => "[Release]",
            EventKind::WorkflowRun => "[Workflow]",
            EventKind::Pipeline => "[Pipeline]",
            EventKind::Commit => "[Commit]",
            EventKind::RegistryImage => "[Image]",
            EventKind::Issue => "[Issue]",
        }
    }

    /// Leading segment of the dedup key.
    pub const fn key_prefix(self) -> &'static str {
        match self {
            EventKind::PullRequest => "pr",
            EventKind::MergeRequest => "mr",
            EventKind::Release => "release",
            EventKind::WorkflowRun => "workflow",
            EventKind::Pipeline => "pipeline",
            EventKind::Commit => "commit",
            EventKind::RegistryImage => "registry",
            EventKind::Issue => "issue",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::PullRequest => "pull_request",
            EventKind::MergeRequest => "merge_request",
            EventKind::Release => "release",
            EventKind::WorkflowRun => "workflow_run",
            EventKind::Pipeline => "pipeline",
            EventKind::Commit => "commit",
            EventKind::RegistryImage => "registry_image",
            EventKind::Issue => "issue",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every kind, in a stable order.
pub const ALL_EVENT_KINDS: &[EventKind] = &[
    EventKind::PullRequest,
    EventKind::MergeRequest,
    EventKind::Release,
    EventKind::WorkflowRun,
    EventKind::Pipeline,
    EventKind::Commit,
    EventKind::RegistryImage,
    EventKind::Issue,
];

/// Derive the dedup key `<prefix>-<scope>-<upstream id>`.
///
/// `scope` is the repository full name, project path, project key or image
/// name the item belongs to. The result depends only on its inputs, so the
/// same upstream item always maps to the same key across runs.
pub fn event_key(kind: EventKind, scope: &str, upstream_id: impl fmt::Display) -> String {
    format!("{}-{}-{}", kind.key_prefix(), scope, upstream_id)
}

/// Build a title from the kind tag and a human readable summary.
pub fn tagged_title(kind: EventKind, summary: impl fmt::Display) -> String {
    format!("{} {}", kind.title_tag(), summary)
}

/// Summary of a CI job that did not succeed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedJob {
    pub name: String,
    pub conclusion: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Registry facts rendered inside an image event description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSummary {
    pub registry: String,
    pub image: String,
    pub digest_short: String,
    /// Human readable size; absent when the registry did not report one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Kind-specific part of a description.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DescriptionDetail {
    FilesChanged { files_changed: Vec<String> },
    FailedJobs { failed_jobs: Vec<FailedJob> },
    Assets { assets: Vec<String> },
    Image { metadata: ImageSummary },
    Comments { comment_count: u64 },
}

/// Structured description stored with every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDescription {
    pub text: String,
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub detail: Option<DescriptionDetail>,
    /// Reserved for cross-event correlation; always empty.
    related_events: Vec<String>,
}

impl EventDescription {
    pub fn new(text: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            text: text.into(),
            labels,
            detail: None,
            related_events: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: DescriptionDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn related_events(&self) -> &[String] {
        &self.related_events
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestMetadata {
    pub repository: String,
    pub pr_number: u64,
    pub merged: Option<bool>,
    pub mergeable: Option<bool>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub changed_files: Option<u64>,
    pub base_branch: String,
    pub head_branch: String,
    pub reviewers: Vec<String>,
    pub approved_count: u32,
    pub changes_requested_count: u32,
    pub comments: Option<u64>,
    pub review_comments: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseMetadata {
    pub repository: String,
    pub tag_name: String,
    pub prerelease: bool,
    pub draft: bool,
}

/// CI run metadata shared by GitHub workflow runs and GitLab pipelines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub repository: String,
    pub workflow_id: Option<u64>,
    pub run_number: Option<u64>,
    pub run_attempt: Option<u64>,
    pub event: Option<String>,
    pub branch: Option<String>,
    pub commit_sha: String,
    pub conclusion: Option<String>,
    pub duration_seconds: Option<i64>,
    pub failed_jobs_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitMetadata {
    pub repository: String,
    pub branch: String,
    pub sha: String,
    pub additions: u64,
    pub deletions: u64,
    pub total_changes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub registry: String,
    pub package: String,
    pub image: String,
    pub tags: Vec<String>,
    pub digest: String,
    /// `None` when the registry does not report a size, distinct from zero.
    pub size_bytes: Option<u64>,
    pub repository: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueMetadata {
    pub project: String,
    pub issue_key: String,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub comment_count: Option<u64>,
}

/// Per-kind metadata; serialized without a tag so the stored payload is a
/// flat key/value object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventMetadata {
    PullRequest(PullRequestMetadata),
    Release(ReleaseMetadata),
    Run(RunMetadata),
    Commit(CommitMetadata),
    Image(ImageMetadata),
    Issue(IssueMetadata),
}

/// A normalized event that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChangeEvent {
    pub connection_id: Uuid,
    pub source: String,
    pub kind: EventKind,
    pub event_id: String,
    pub title: String,
    pub description: EventDescription,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub status: String,
    pub metadata: EventMetadata,
}

impl NewChangeEvent {
    pub fn description_payload(&self) -> Result<JsonValue, serde_json::Error> {
        serde_json::to_value(&self.description)
    }

    pub fn metadata_payload(&self) -> Result<JsonValue, serde_json::Error> {
        serde_json::to_value(&self.metadata)
    }

    /// Flatten into a row ready for insertion. The row id is assigned here,
    /// never during normalization.
    pub fn into_active_model(
        &self,
        created_at: DateTime<Utc>,
    ) -> Result<change_event::ActiveModel, serde_json::Error> {
        Ok(change_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            connection_id: Set(self.connection_id),
            source: Set(self.source.clone()),
            event_id: Set(self.event_id.clone()),
            title: Set(self.title.clone()),
            description: Set(self.description_payload()?),
            author: Set(self.author.clone()),
            timestamp: Set(self.timestamp.fixed_offset()),
            url: Set(self.url.clone()),
            status: Set(self.status.clone()),
            metadata: Set(self.metadata_payload()?),
            created_at: Set(created_at.fixed_offset()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn key_prefixes_are_unique() {
        let mut seen = HashSet::new();
        for kind in ALL_EVENT_KINDS {
            assert!(seen.insert(kind.key_prefix()), "duplicate prefix {}", kind);
        }
    }

    #[test]
    fn event_keys_follow_documented_shapes() {
        assert_eq!(
            event_key(EventKind::PullRequest, "octo/app", 42),
            "pr-octo/app-42"
        );
        assert_eq!(
            event_key(EventKind::Release, "octo/app", 9001),
            "release-octo/app-9001"
        );
        assert_eq!(
            event_key(EventKind::WorkflowRun, "octo/app", 7),
            "workflow-octo/app-7"
        );
        assert_eq!(
            event_key(EventKind::Commit, "octo/app", "abc123"),
            "commit-octo/app-abc123"
        );
        assert_eq!(
            event_key(EventKind::RegistryImage, "ghcr.io/octo/api", 55),
            "registry-ghcr.io/octo/api-55"
        );
    }

    #[test]
    fn description_flattens_detail_and_keeps_related_events_empty() {
        let description = EventDescription::new("body", vec!["bug".to_string()]).with_detail(
            DescriptionDetail::FilesChanged {
                files_changed: vec!["src/lib.rs".to_string()],
            },
        );

        let value = serde_json::to_value(&description).unwrap();
        assert_eq!(
            value,
            json!({
                "text": "body",
                "labels": ["bug"],
                "files_changed": ["src/lib.rs"],
                "related_events": []
            })
        );
        assert!(description.related_events().is_empty());
    }

    #[test]
    fn description_without_detail_has_no_extra_keys() {
        let value = serde_json::to_value(EventDescription::new("x", vec![])).unwrap();
        assert_eq!(value, json!({"text": "x", "labels": [], "related_events": []}));
    }

    #[test]
    fn image_metadata_keeps_unknown_size_as_null() {
        let metadata = EventMetadata::Image(ImageMetadata {
            registry: "ghcr.io".to_string(),
            package: "api".to_string(),
            image: "ghcr.io/octo/api".to_string(),
            tags: vec!["v1".to_string()],
            digest: "sha256:abc".to_string(),
            size_bytes: None,
            repository: "octo/api".to_string(),
        });

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["size_bytes"], JsonValue::Null);
        assert_eq!(value["registry"], "ghcr.io");
        assert!(value.get("Image").is_none());
    }

    #[test]
    fn tagged_title_prefixes_kind() {
        assert_eq!(tagged_title(EventKind::Commit, "fix"), "[Commit] fix");
        assert_eq!(tagged_title(EventKind::RegistryImage, "a:b"), "[Image] a:b");
    }
}
