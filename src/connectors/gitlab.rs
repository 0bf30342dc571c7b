//! GitLab adapter
//!
//! Merge requests, releases, pipelines, commits on allowlisted branches and
//! container registry tags for each project. Projects are addressed by
//! numeric id after lookup; event ids use the `group/project` path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::form_urlencoded::byte_serialize;
use uuid::Uuid;

use crate::config::{AppConfig, SyncLimits};
use crate::connectors::http::{ApiClient, AuthScheme, RetryPolicy, build_http_client};
use crate::connectors::pagination::{Pager, per_page};
use crate::connectors::settings::ConnectionSettings;
use crate::connectors::{
    AuthType, ConnectorError, ProviderMetadata, Registry, SourceAdapter, SyncContext, Target,
    degrade, tolerate_kind_failure,
};
use crate::events::{
    CommitMetadata, DescriptionDetail, EventDescription, EventKind, EventMetadata, FailedJob,
    ImageMetadata, ImageSummary, NewChangeEvent, PullRequestMetadata, ReleaseMetadata,
    RunMetadata, event_key, tagged_title,
};
use crate::normalization::{
    capped, duration_seconds, first_line, format_size, is_failed_conclusion, prefix_chars,
    run_status_indicator,
};
use crate::repositories::TargetBatch;

pub const GITLAB_PROVIDER: &str = "gitlab";

const UNKNOWN: &str = "unknown";

/// GitLab source adapter
#[derive(Debug, Clone)]
pub struct GitLabAdapter {
    http: reqwest::Client,
    default_base: String,
    retry: RetryPolicy,
}

impl GitLabAdapter {
    pub fn new(config: &AppConfig) -> Result<Self, ConnectorError> {
        Ok(Self {
            http: build_http_client(
                Duration::from_secs(config.http_timeout_seconds),
                "application/json",
            )?,
            default_base: config.gitlab_api_base.clone(),
            retry: RetryPolicy::for_provider(&config.rate_limit_policy, GITLAB_PROVIDER),
        })
    }

    fn client(&self, settings: &ConnectionSettings) -> Result<ApiClient, ConnectorError> {
        ApiClient::new(
            self.http.clone(),
            GITLAB_PROVIDER,
            settings.api_base(&self.default_base),
            AuthScheme::PrivateToken(settings.token().to_string()),
            self.retry,
        )
    }

    async fn sync_merge_requests(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let limit = ctx.limits.per_kind_limit;
        let url = client.url(
            &format!("/projects/{}/merge_requests", target.locator),
            &[
                ("state", "all"),
                ("order_by", "updated_at"),
                ("sort", "desc"),
                ("per_page", per_page(limit).as_str()),
            ],
        )?;
        let merge_requests: Vec<GlMergeRequest> =
            Pager::new(client, url).collect_capped(limit).await?;

        for mr in merge_requests {
            batch.record_fetched();
            let event_id = event_key(EventKind::MergeRequest, &target.name, mr.iid);

            if !ctx.settings.branch_allowed(Some(mr.target_branch.as_str())) {
                continue;
            }
            if !batch.needs_processing(&event_id).await? {
                continue;
            }

            let base = format!("/projects/{}/merge_requests/{}", target.locator, mr.iid);
            let approvals: GlApprovals = degrade(
                client
                    .get_json(client.url(&format!("{base}/approvals"), &[])?)
                    .await,
                "merge request approvals",
                &event_id,
            );
            let changes: GlChanges = degrade(
                client.get_json(client.url(&format!("{base}/changes"), &[])?).await,
                "merge request changes",
                &event_id,
            );

            let event = normalize_merge_request(
                ctx.connection_id,
                &target.name,
                &mr,
                &approvals,
                &changes,
                ctx.limits,
            );
            batch.stage(&event).await?;
        }

        Ok(())
    }

    async fn sync_releases(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let limit = ctx.limits.per_kind_limit;
        let url = client.url(
            &format!("/projects/{}/releases", target.locator),
            &[("per_page", per_page(limit).as_str())],
        )?;
        let releases: Vec<GlRelease> = Pager::new(client, url).collect_capped(limit).await?;

        for release in releases {
            batch.record_fetched();
            let event_id = event_key(EventKind::Release, &target.name, &release.tag_name);
            if !batch.needs_processing(&event_id).await? {
                continue;
            }

            let event = normalize_release(ctx.connection_id, target, &release);
            batch.stage(&event).await?;
        }

        Ok(())
    }

    async fn sync_pipelines(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let limit = ctx.limits.per_kind_limit;
        let url = client.url(
            &format!("/projects/{}/pipelines", target.locator),
            &[("per_page", per_page(limit).as_str())],
        )?;
        let pipelines: Vec<GlPipeline> = Pager::new(client, url).collect_capped(limit).await?;

        for pipeline in pipelines {
            batch.record_fetched();
            let event_id = event_key(EventKind::Pipeline, &target.name, pipeline.id);

            if !ctx.settings.branch_allowed(pipeline.git_ref.as_deref()) {
                continue;
            }
            if !batch.needs_processing(&event_id).await? {
                continue;
            }

            let failed_jobs = if is_failed_conclusion(conclusion_of(&pipeline.status)) {
                let jobs: Vec<GlJob> = degrade(
                    client
                        .get_json(client.url(
                            &format!(
                                "/projects/{}/pipelines/{}/jobs",
                                target.locator, pipeline.id
                            ),
                            &[("scope[]", "failed"), ("per_page", "100")],
                        )?)
                        .await,
                    "pipeline jobs",
                    &event_id,
                );
                failed_jobs_of(jobs)
            } else {
                Vec::new()
            };

            let event = normalize_pipeline(ctx.connection_id, &target.name, &pipeline, failed_jobs);
            batch.stage(&event).await?;
        }

        Ok(())
    }

    async fn sync_branch_commits(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        branch: &str,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let limit = ctx.limits.per_kind_limit;
        let url = client.url(
            &format!("/projects/{}/repository/commits", target.locator),
            &[
                ("ref_name", branch),
                ("with_stats", "true"),
                ("per_page", per_page(limit).as_str()),
            ],
        )?;
        let commits: Vec<GlCommit> = Pager::new(client, url).collect_capped(limit).await?;

        for commit in commits {
            batch.record_fetched();
            let event_id = event_key(EventKind::Commit, &target.name, &commit.id);
            if !batch.needs_processing(&event_id).await? {
                continue;
            }

            let diffs: Vec<GlDiff> = degrade(
                client
                    .get_json(client.url(
                        &format!(
                            "/projects/{}/repository/commits/{}/diff",
                            target.locator, commit.id
                        ),
                        &[("per_page", per_page(ctx.limits.files_limit).as_str())],
                    )?)
                    .await,
                "commit diff",
                &event_id,
            );

            let event = normalize_commit(
                ctx.connection_id,
                &target.name,
                branch,
                &commit,
                diffs,
                ctx.limits,
            );
            batch.stage(&event).await?;
        }

        Ok(())
    }

    async fn sync_registry_tags(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let url = client.url(
            &format!("/projects/{}/registry/repositories", target.locator),
            &[
                ("tags", "true"),
                ("per_page", per_page(ctx.limits.registry_package_limit).as_str()),
            ],
        )?;

        let repositories: Vec<GlRegistryRepository> = match client.get_json(url).await {
            Ok(repositories) => repositories,
            Err(ConnectorError::Http { status, .. }) => {
                debug!(project = %target.name, status, "Container registry unavailable");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for repository in capped(repositories, ctx.limits.registry_package_limit) {
            for tag in capped(repository.tags.iter(), ctx.limits.registry_version_limit) {
                batch.record_fetched();
                let event_id = event_key(
                    EventKind::RegistryImage,
                    &repository.location,
                    &tag.name,
                );
                if !batch.needs_processing(&event_id).await? {
                    continue;
                }

                let detail: GlTagDetail = degrade(
                    client
                        .get_json(client.url(
                            &format!(
                                "/projects/{}/registry/repositories/{}/tags/{}",
                                target.locator,
                                repository.id,
                                encode_segment(&tag.name)
                            ),
                            &[],
                        )?)
                        .await,
                    "registry tag detail",
                    &event_id,
                );

                let event = normalize_registry_tag(
                    ctx.connection_id,
                    target,
                    &repository,
                    &tag.name,
                    &detail,
                );
                batch.stage(&event).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for GitLabAdapter {
    fn provider(&self) -> &'static str {
        GITLAB_PROVIDER
    }

    fn display_name(&self) -> &'static str {
        "GitLab"
    }

    async fn test_connection(&self, ctx: &SyncContext<'_>) -> Result<(), ConnectorError> {
        let client = self.client(ctx.settings)?;
        let user: GlUser = client.get_json(client.url("/user", &[])?).await?;
        debug!(username = %user.username, "GitLab credential verified");
        Ok(())
    }

    async fn discover_targets(&self, ctx: &SyncContext<'_>) -> Result<Vec<Target>, ConnectorError> {
        let client = self.client(ctx.settings)?;

        if !ctx.settings.targets.is_empty() {
            let mut targets = Vec::with_capacity(ctx.settings.targets.len());
            for path in &ctx.settings.targets {
                let lookup: Result<GlProject, _> =
                    match client.url(&format!("/projects/{}", encode_segment(path)), &[]) {
                        Ok(url) => client.get_json(url).await,
                        Err(err) => Err(err),
                    };
                match lookup {
                    Ok(project) => targets.push(project.into_target()),
                    Err(err) => warn!(project = %path, error = %err, "Skipping inaccessible project"),
                }
            }
            return Ok(targets);
        }

        let limit = ctx.limits.discovery_limit;
        let url = client.url(
            "/projects",
            &[
                ("membership", "true"),
                ("order_by", "last_activity_at"),
                ("per_page", per_page(limit).as_str()),
            ],
        )?;
        let projects: Vec<GlProject> = Pager::new(&client, url).collect_capped(limit).await?;
        Ok(projects.into_iter().map(GlProject::into_target).collect())
    }

    #[instrument(skip_all, fields(connection_id = %ctx.connection_id, target = %target.name))]
    async fn sync_target(
        &self,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let client = self.client(ctx.settings)?;

        self.sync_merge_requests(&client, ctx, target, batch).await?;
        self.sync_releases(&client, ctx, target, batch).await?;

        tolerate_kind_failure(
            self.sync_pipelines(&client, ctx, target, batch).await,
            target,
            EventKind::Pipeline,
        )?;

        for branch in &ctx.settings.branches {
            tolerate_kind_failure(
                self.sync_branch_commits(&client, ctx, target, branch, batch)
                    .await,
                target,
                EventKind::Commit,
            )?;
        }

        tolerate_kind_failure(
            self.sync_registry_tags(&client, ctx, target, batch).await,
            target,
            EventKind::RegistryImage,
        )?;

        Ok(())
    }
}

/// Register the GitLab adapter with its metadata.
pub fn register_gitlab_adapter(registry: &mut Registry, adapter: Arc<GitLabAdapter>) {
    let metadata = ProviderMetadata::new(
        GITLAB_PROVIDER,
        "GitLab",
        AuthType::PrivateToken,
        vec![
            EventKind::MergeRequest,
            EventKind::Release,
            EventKind::Pipeline,
            EventKind::Commit,
            EventKind::RegistryImage,
        ],
        true,
    );
    registry.register(adapter, metadata);
}

/// Percent-encode one path segment (`group/project` becomes `group%2Fproject`).
fn encode_segment(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Map GitLab pipeline and job statuses onto the shared conclusion vocabulary.
fn conclusion_of(status: &str) -> Option<&'static str> {
    match status {
        "success" => Some("success"),
        "failed" => Some("failure"),
        "canceled" => Some("cancelled"),
        "skipped" => Some("skipped"),
        _ => None,
    }
}

fn or_epoch(candidates: &[Option<DateTime<Utc>>]) -> DateTime<Utc> {
    candidates
        .iter()
        .flatten()
        .next()
        .copied()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn username_or_unknown(user: Option<&GlUser>) -> String {
    user.map(|u| u.username.clone())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn failed_jobs_of(jobs: Vec<GlJob>) -> Vec<FailedJob> {
    jobs.into_iter()
        .filter_map(|job| {
            let conclusion = conclusion_of(&job.status)?;
            is_failed_conclusion(Some(conclusion)).then(|| FailedJob {
                name: job.name,
                conclusion: conclusion.to_string(),
                started_at: job.started_at,
                completed_at: job.finished_at,
            })
        })
        .collect()
}

fn normalize_merge_request(
    connection_id: Uuid,
    project: &str,
    mr: &GlMergeRequest,
    approvals: &GlApprovals,
    changes: &GlChanges,
    limits: &SyncLimits,
) -> NewChangeEvent {
    let mut reviewers: Vec<String> = approvals
        .approved_by
        .iter()
        .map(|a| a.user.username.clone())
        .collect();
    reviewers.sort();
    reviewers.dedup();

    let changed_files = changes
        .changes_count
        .as_deref()
        .and_then(|count| count.trim_end_matches('+').parse().ok());

    NewChangeEvent {
        connection_id,
        source: GITLAB_PROVIDER.to_string(),
        kind: EventKind::MergeRequest,
        event_id: event_key(EventKind::MergeRequest, project, mr.iid),
        title: tagged_title(EventKind::MergeRequest, &mr.title),
        description: EventDescription::new(
            mr.description.clone().unwrap_or_default(),
            mr.labels.clone(),
        )
        .with_detail(DescriptionDetail::FilesChanged {
            files_changed: capped(
                changes.changes.iter().map(|c| c.new_path.clone()),
                limits.files_limit,
            ),
        }),
        author: username_or_unknown(mr.author.as_ref()),
        timestamp: or_epoch(&[mr.updated_at, mr.created_at]),
        url: mr.web_url.clone(),
        status: mr.state.clone(),
        metadata: EventMetadata::PullRequest(PullRequestMetadata {
            repository: project.to_string(),
            pr_number: mr.iid,
            merged: Some(mr.state == "merged"),
            mergeable: mr.has_conflicts.map(|conflicts| !conflicts),
            additions: None,
            deletions: None,
            changed_files,
            base_branch: mr.target_branch.clone(),
            head_branch: mr.source_branch.clone(),
            approved_count: u32::try_from(reviewers.len()).unwrap_or(u32::MAX),
            reviewers,
            changes_requested_count: 0,
            comments: mr.user_notes_count,
            review_comments: None,
        }),
    }
}

fn normalize_release(connection_id: Uuid, target: &Target, release: &GlRelease) -> NewChangeEvent {
    let name = release
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(&release.tag_name);
    let upcoming = release.upcoming_release.unwrap_or(false);
    let url = release
        .links
        .as_ref()
        .and_then(|l| l.self_url.clone())
        .or_else(|| {
            target
                .web_url
                .as_ref()
                .map(|web| format!("{web}/-/releases/{}", release.tag_name))
        })
        .unwrap_or_default();

    NewChangeEvent {
        connection_id,
        source: GITLAB_PROVIDER.to_string(),
        kind: EventKind::Release,
        event_id: event_key(EventKind::Release, &target.name, &release.tag_name),
        title: tagged_title(EventKind::Release, name),
        description: EventDescription::new(
            release.description.clone().unwrap_or_default(),
            Vec::new(),
        )
        .with_detail(DescriptionDetail::Assets {
            assets: release
                .assets
                .as_ref()
                .map(|a| a.links.iter().map(|l| l.name.clone()).collect())
                .unwrap_or_default(),
        }),
        author: username_or_unknown(release.author.as_ref()),
        timestamp: or_epoch(&[release.released_at, release.created_at]),
        url,
        status: if upcoming { "upcoming" } else { "published" }.to_string(),
        metadata: EventMetadata::Release(ReleaseMetadata {
            repository: target.name.clone(),
            tag_name: release.tag_name.clone(),
            prerelease: upcoming,
            draft: false,
        }),
    }
}

fn normalize_pipeline(
    connection_id: Uuid,
    project: &str,
    pipeline: &GlPipeline,
    failed_jobs: Vec<FailedJob>,
) -> NewChangeEvent {
    let conclusion = conclusion_of(&pipeline.status);
    let branch = pipeline.git_ref.as_deref().unwrap_or(UNKNOWN);
    let failed_jobs_count = failed_jobs.len();

    NewChangeEvent {
        connection_id,
        source: GITLAB_PROVIDER.to_string(),
        kind: EventKind::Pipeline,
        event_id: event_key(EventKind::Pipeline, project, pipeline.id),
        title: tagged_title(
            EventKind::Pipeline,
            format!(
                "{} #{} - {branch}",
                run_status_indicator(conclusion),
                pipeline.iid.unwrap_or(pipeline.id)
            ),
        ),
        description: EventDescription::new(format!("Pipeline #{}", pipeline.id), Vec::new())
            .with_detail(DescriptionDetail::FailedJobs { failed_jobs }),
        author: username_or_unknown(pipeline.user.as_ref()),
        timestamp: or_epoch(&[pipeline.updated_at, pipeline.created_at]),
        url: pipeline.web_url.clone(),
        status: pipeline.status.clone(),
        metadata: EventMetadata::Run(RunMetadata {
            repository: project.to_string(),
            workflow_id: None,
            run_number: pipeline.iid,
            run_attempt: None,
            event: pipeline.source.clone(),
            branch: pipeline.git_ref.clone(),
            commit_sha: prefix_chars(&pipeline.sha, 7),
            conclusion: conclusion.map(str::to_string),
            duration_seconds: duration_seconds(pipeline.created_at, pipeline.updated_at),
            failed_jobs_count,
        }),
    }
}

fn normalize_commit(
    connection_id: Uuid,
    project: &str,
    branch: &str,
    commit: &GlCommit,
    diffs: Vec<GlDiff>,
    limits: &SyncLimits,
) -> NewChangeEvent {
    let stats = commit.stats.clone().unwrap_or_default();

    NewChangeEvent {
        connection_id,
        source: GITLAB_PROVIDER.to_string(),
        kind: EventKind::Commit,
        event_id: event_key(EventKind::Commit, project, &commit.id),
        title: tagged_title(
            EventKind::Commit,
            first_line(&commit.message, limits.title_max_chars),
        ),
        description: EventDescription::new(commit.message.clone(), Vec::new()).with_detail(
            DescriptionDetail::FilesChanged {
                files_changed: capped(diffs.into_iter().map(|d| d.new_path), limits.files_limit),
            },
        ),
        author: commit
            .author_name
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string()),
        timestamp: or_epoch(&[commit.authored_date, commit.committed_date]),
        url: commit.web_url.clone(),
        status: "committed".to_string(),
        metadata: EventMetadata::Commit(CommitMetadata {
            repository: project.to_string(),
            branch: branch.to_string(),
            sha: commit.id.clone(),
            additions: stats.additions,
            deletions: stats.deletions,
            total_changes: stats.total,
        }),
    }
}

fn normalize_registry_tag(
    connection_id: Uuid,
    target: &Target,
    repository: &GlRegistryRepository,
    tag: &str,
    detail: &GlTagDetail,
) -> NewChangeEvent {
    let image = repository.location.clone();
    let registry = image.split('/').next().unwrap_or_default().to_string();
    let digest = detail.digest.clone().unwrap_or_default();
    let size_bytes = detail.total_size;
    let size = format_size(size_bytes);

    let mut text = format!("Container image pushed to GitLab Container Registry\nImage: {image}\nTags: {tag}");
    if let Some(size) = &size {
        text.push_str(&format!("\nSize: {size}"));
    }
    let digest_preview = if digest.is_empty() { "N/A" } else { digest.as_str() };
    text.push_str(&format!("\nDigest: {}...", prefix_chars(digest_preview, 19)));

    let url = target
        .web_url
        .as_ref()
        .map(|web| format!("{web}/container_registry/{}", repository.id))
        .unwrap_or_else(|| format!("https://{image}"));

    NewChangeEvent {
        connection_id,
        source: GITLAB_PROVIDER.to_string(),
        kind: EventKind::RegistryImage,
        event_id: event_key(EventKind::RegistryImage, &image, tag),
        title: tagged_title(EventKind::RegistryImage, format!("{image}:{tag}")),
        description: EventDescription::new(text, vec![tag.to_string()]).with_detail(
            DescriptionDetail::Image {
                metadata: ImageSummary {
                    registry: registry.clone(),
                    image: image.clone(),
                    digest_short: if digest.is_empty() {
                        "N/A".to_string()
                    } else {
                        prefix_chars(&digest, 12)
                    },
                    size,
                },
            },
        ),
        author: UNKNOWN.to_string(),
        timestamp: or_epoch(&[detail.created_at, repository.created_at]),
        url,
        status: "published".to_string(),
        metadata: EventMetadata::Image(ImageMetadata {
            registry,
            package: repository.name.clone(),
            image,
            tags: vec![tag.to_string()],
            digest,
            size_bytes,
            repository: target.name.clone(),
        }),
    }
}

// GitLab API response types

#[derive(Debug, Clone, Deserialize)]
struct GlUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct GlNamespace {
    full_path: String,
}

#[derive(Debug, Deserialize)]
struct GlProject {
    id: u64,
    path_with_namespace: String,
    namespace: GlNamespace,
    web_url: Option<String>,
}

impl GlProject {
    fn into_target(self) -> Target {
        let target = Target::new(
            self.path_with_namespace,
            self.id.to_string(),
            self.namespace.full_path,
        );
        match self.web_url {
            Some(web_url) => target.with_web_url(web_url),
            None => target,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GlMergeRequest {
    iid: u64,
    title: String,
    description: Option<String>,
    state: String,
    web_url: String,
    author: Option<GlUser>,
    #[serde(default)]
    labels: Vec<String>,
    target_branch: String,
    source_branch: String,
    has_conflicts: Option<bool>,
    user_notes_count: Option<u64>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct GlApprovals {
    #[serde(default)]
    approved_by: Vec<GlApprover>,
}

#[derive(Debug, Deserialize)]
struct GlApprover {
    user: GlUser,
}

#[derive(Debug, Default, Deserialize)]
struct GlChanges {
    /// String because GitLab reports large counts as "1000+"
    changes_count: Option<String>,
    #[serde(default)]
    changes: Vec<GlDiff>,
}

#[derive(Debug, Deserialize)]
struct GlDiff {
    new_path: String,
}

#[derive(Debug, Deserialize)]
struct GlRelease {
    tag_name: String,
    name: Option<String>,
    description: Option<String>,
    author: Option<GlUser>,
    upcoming_release: Option<bool>,
    created_at: Option<DateTime<Utc>>,
    released_at: Option<DateTime<Utc>>,
    assets: Option<GlReleaseAssets>,
    #[serde(rename = "_links")]
    links: Option<GlReleaseLinks>,
}

#[derive(Debug, Deserialize)]
struct GlReleaseAssets {
    #[serde(default)]
    links: Vec<GlAssetLink>,
}

#[derive(Debug, Deserialize)]
struct GlAssetLink {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GlReleaseLinks {
    #[serde(rename = "self")]
    self_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlPipeline {
    id: u64,
    iid: Option<u64>,
    status: String,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    #[serde(default)]
    sha: String,
    source: Option<String>,
    web_url: String,
    user: Option<GlUser>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GlJob {
    name: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GlCommit {
    id: String,
    message: String,
    author_name: Option<String>,
    authored_date: Option<DateTime<Utc>>,
    committed_date: Option<DateTime<Utc>>,
    web_url: String,
    stats: Option<GlCommitStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GlCommitStats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct GlRegistryRepository {
    id: u64,
    name: String,
    location: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<GlRegistryTag>,
}

#[derive(Debug, Deserialize)]
struct GlRegistryTag {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct GlTagDetail {
    digest: Option<String>,
    total_size: Option<u64>,
    created_at: Option<DateTime<Utc>>,
}
