//! GitHub adapter
//!
//! Collects pull requests, releases, Actions workflow runs, commits on
//! allowlisted branches and GHCR container image versions for each repository
//! of a connection.
//!
//! Pull requests and releases are the primary kinds: a failure listing them
//! fails the whole target. Workflow runs, commits and registry images are
//! isolated per kind. Per-item enrichments (PR detail, files, reviews, failed
//! jobs, commit detail) fall back to empty values.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
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
    ReviewSummary, capped, duration_seconds, first_line, format_size, is_failed_conclusion,
    prefix_chars, run_status_indicator,
};
use crate::repositories::TargetBatch;

pub const GITHUB_PROVIDER: &str = "github";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const REGISTRY_HOST: &str = "ghcr.io";
const UNKNOWN: &str = "unknown";

/// GitHub source adapter
#[derive(Debug, Clone)]
pub struct GitHubAdapter {
    http: reqwest::Client,
    default_base: String,
    retry: RetryPolicy,
}

impl GitHubAdapter {
    pub fn new(config: &AppConfig) -> Result<Self, ConnectorError> {
        Ok(Self {
            http: build_http_client(
                Duration::from_secs(config.http_timeout_seconds),
                GITHUB_ACCEPT,
            )?,
            default_base: config.github_api_base.clone(),
            retry: RetryPolicy::for_provider(&config.rate_limit_policy, GITHUB_PROVIDER),
        })
    }

    fn client(&self, settings: &ConnectionSettings) -> Result<ApiClient, ConnectorError> {
        ApiClient::new(
            self.http.clone(),
            GITHUB_PROVIDER,
            settings.api_base(&self.default_base),
            AuthScheme::Bearer(settings.token().to_string()),
            self.retry,
        )
    }

    async fn sync_pull_requests(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let limit = ctx.limits.per_kind_limit;
        let url = client.url(
            &format!("/repos/{}/pulls", target.locator),
            &[
                ("state", "all"),
                ("sort", "updated"),
                ("direction", "desc"),
                ("per_page", per_page(limit).as_str()),
            ],
        )?;
        let pulls: Vec<GhPull> = Pager::new(client, url).collect_capped(limit).await?;

        for pr in pulls {
            batch.record_fetched();
            let event_id = event_key(EventKind::PullRequest, &target.name, pr.number);

            if !ctx.settings.branch_allowed(Some(pr.base.name.as_str())) {
                continue;
            }
            if !batch.needs_processing(&event_id).await? {
                continue;
            }

            let base = format!("/repos/{}/pulls/{}", target.locator, pr.number);
            let detail: GhPullDetail = degrade(
                client.get_json(client.url(&base, &[])?).await,
                "pull request detail",
                &event_id,
            );
            let files: Vec<GhFile> = degrade(
                client
                    .get_json(client.url(
                        &format!("{base}/files"),
                        &[("per_page", per_page(ctx.limits.files_limit).as_str())],
                    )?)
                    .await,
                "pull request files",
                &event_id,
            );
            let reviews: Vec<GhReview> = degrade(
                client
                    .get_json(client.url(&format!("{base}/reviews"), &[("per_page", "100")])?)
                    .await,
                "pull request reviews",
                &event_id,
            );

            let enrichment = PullEnrichment {
                detail,
                files: capped(files.into_iter().map(|f| f.filename), ctx.limits.files_limit),
                reviews: ReviewSummary::from_reviews(
                    reviews
                        .iter()
                        .map(|r| (r.user.as_ref().map(|u| u.login.as_str()), r.state.as_str())),
                ),
            };

            let event = normalize_pull_request(ctx.connection_id, &target.name, &pr, enrichment);
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
            &format!("/repos/{}/releases", target.locator),
            &[("per_page", per_page(limit).as_str())],
        )?;
        let releases: Vec<GhRelease> = Pager::new(client, url).collect_capped(limit).await?;

        for release in releases {
            batch.record_fetched();
            let event_id = event_key(EventKind::Release, &target.name, release.id);
            if !batch.needs_processing(&event_id).await? {
                continue;
            }

            let event = normalize_release(ctx.connection_id, &target.name, &release);
            batch.stage(&event).await?;
        }

        Ok(())
    }

    async fn sync_workflow_runs(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let limit = ctx.limits.per_kind_limit;
        let url = client.url(
            &format!("/repos/{}/actions/runs", target.locator),
            &[("per_page", per_page(limit).as_str())],
        )?;
        let runs: Vec<GhWorkflowRun> = Pager::new(client, url)
            .items_at("workflow_runs")
            .collect_capped(limit)
            .await?;

        for run in runs {
            batch.record_fetched();
            let event_id = event_key(EventKind::WorkflowRun, &target.name, run.id);

            if !ctx.settings.branch_allowed(run.head_branch.as_deref()) {
                continue;
            }
            if !batch.needs_processing(&event_id).await? {
                continue;
            }

            let failed_jobs = if is_failed_conclusion(run.conclusion.as_deref()) {
                let jobs: GhJobList = degrade(
                    client
                        .get_json(client.url(
                            &format!("/repos/{}/actions/runs/{}/jobs", target.locator, run.id),
                            &[("per_page", "100")],
                        )?)
                        .await,
                    "workflow jobs",
                    &event_id,
                );
                failed_jobs_of(jobs.jobs)
            } else {
                Vec::new()
            };

            let event = normalize_workflow_run(ctx.connection_id, &target.name, &run, failed_jobs);
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
            &format!("/repos/{}/commits", target.locator),
            &[("sha", branch), ("per_page", per_page(limit).as_str())],
        )?;
        let commits: Vec<GhCommit> = Pager::new(client, url).collect_capped(limit).await?;

        for commit in commits {
            batch.record_fetched();
            let event_id = event_key(EventKind::Commit, &target.name, &commit.sha);
            if !batch.needs_processing(&event_id).await? {
                continue;
            }

            let detail: GhCommitDetail = degrade(
                client
                    .get_json(client.url(
                        &format!("/repos/{}/commits/{}", target.locator, commit.sha),
                        &[],
                    )?)
                    .await,
                "commit detail",
                &event_id,
            );

            let event = normalize_commit(
                ctx.connection_id,
                &target.name,
                branch,
                &commit,
                &detail,
                ctx.limits,
            );
            batch.stage(&event).await?;
        }

        Ok(())
    }

    async fn sync_registry_images(
        &self,
        client: &ApiClient,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let org = target.owner.as_str();
        let url = client.url(
            &format!("/orgs/{org}/packages"),
            &[
                ("package_type", "container"),
                ("per_page", per_page(ctx.limits.registry_package_limit).as_str()),
            ],
        )?;

        let packages: Vec<GhPackage> = match client.get_json(url).await {
            Ok(packages) => packages,
            Err(ConnectorError::Http { status, .. }) => {
                debug!(org, status, "No container packages available");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for package in capped(packages, ctx.limits.registry_package_limit) {
            let url = client.url(
                &format!("/orgs/{org}/packages/container/{}/versions", package.name),
                &[("per_page", per_page(ctx.limits.registry_version_limit).as_str())],
            )?;
            let versions: Vec<GhPackageVersion> = match client.get_json(url).await {
                Ok(versions) => versions,
                Err(ConnectorError::Http { status, .. }) => {
                    debug!(org, package = %package.name, status, "Skipping package versions");
                    continue;
                }
                Err(err) => return Err(err),
            };

            for version in capped(versions, ctx.limits.registry_version_limit) {
                if version.tags().is_empty() {
                    continue;
                }

                batch.record_fetched();
                let image = image_name(org, &package.name);
                let event_id = event_key(EventKind::RegistryImage, &image, version.id);
                if !batch.needs_processing(&event_id).await? {
                    continue;
                }

                let event = normalize_package_version(
                    ctx.connection_id,
                    target,
                    &package.name,
                    &version,
                    ctx.limits,
                );
                batch.stage(&event).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for GitHubAdapter {
    fn provider(&self) -> &'static str {
        GITHUB_PROVIDER
    }

    fn display_name(&self) -> &'static str {
        "GitHub"
    }

    async fn test_connection(&self, ctx: &SyncContext<'_>) -> Result<(), ConnectorError> {
        let client = self.client(ctx.settings)?;
        let user: GhUser = client.get_json(client.url("/user", &[])?).await?;
        debug!(login = %user.login, "GitHub credential verified");
        Ok(())
    }

    async fn discover_targets(&self, ctx: &SyncContext<'_>) -> Result<Vec<Target>, ConnectorError> {
        let client = self.client(ctx.settings)?;

        if !ctx.settings.targets.is_empty() {
            let mut targets = Vec::with_capacity(ctx.settings.targets.len());
            for name in &ctx.settings.targets {
                let lookup: Result<GhRepo, _> = match client.url(&format!("/repos/{name}"), &[]) {
                    Ok(url) => client.get_json(url).await,
                    Err(err) => Err(err),
                };
                match lookup {
                    Ok(repo) => targets.push(repo.into_target()),
                    Err(err) => warn!(repository = %name, error = %err, "Skipping inaccessible repository"),
                }
            }
            return Ok(targets);
        }

        let limit = ctx.limits.discovery_limit;
        let url = client.url(
            "/user/repos",
            &[("sort", "updated"), ("per_page", per_page(limit).as_str())],
        )?;
        let repos: Vec<GhRepo> = Pager::new(&client, url).collect_capped(limit).await?;
        Ok(repos.into_iter().map(GhRepo::into_target).collect())
    }

    #[instrument(skip_all, fields(connection_id = %ctx.connection_id, target = %target.name))]
    async fn sync_target(
        &self,
        ctx: &SyncContext<'_>,
        target: &Target,
        batch: &mut TargetBatch,
    ) -> Result<(), ConnectorError> {
        let client = self.client(ctx.settings)?;

        self.sync_pull_requests(&client, ctx, target, batch).await?;
        self.sync_releases(&client, ctx, target, batch).await?;

        tolerate_kind_failure(
            self.sync_workflow_runs(&client, ctx, target, batch).await,
            target,
            EventKind::WorkflowRun,
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
            self.sync_registry_images(&client, ctx, target, batch).await,
            target,
            EventKind::RegistryImage,
        )?;

        Ok(())
    }
}

/// Register the GitHub adapter with its metadata.
pub fn register_github_adapter(registry: &mut Registry, adapter: Arc<GitHubAdapter>) {
    let metadata = ProviderMetadata::new(
        GITHUB_PROVIDER,
        "GitHub",
        AuthType::Bearer,
        vec![
            EventKind::PullRequest,
            EventKind::Release,
            EventKind::WorkflowRun,
            EventKind::Commit,
            EventKind::RegistryImage,
        ],
        true,
    );
    registry.register(adapter, metadata);
}

struct PullEnrichment {
    detail: GhPullDetail,
    files: Vec<String>,
    reviews: ReviewSummary,
}

fn or_epoch(candidates: &[Option<DateTime<Utc>>]) -> DateTime<Utc> {
    candidates
        .iter()
        .flatten()
        .next()
        .copied()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn login_or_unknown(user: Option<&GhUser>) -> String {
    user.map(|u| u.login.clone())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn image_name(org: &str, package: &str) -> String {
    format!("{REGISTRY_HOST}/{}/{package}", org.to_lowercase())
}

fn failed_jobs_of(jobs: Vec<GhJob>) -> Vec<FailedJob> {
    jobs.into_iter()
        .filter(|job| is_failed_conclusion(job.conclusion.as_deref()))
        .map(|job| FailedJob {
            name: job.name,
            conclusion: job.conclusion.unwrap_or_default(),
            started_at: job.started_at,
            completed_at: job.completed_at,
        })
        .collect()
}

fn normalize_pull_request(
    connection_id: Uuid,
    repository: &str,
    pr: &GhPull,
    enrichment: PullEnrichment,
) -> NewChangeEvent {
    let PullEnrichment {
        detail,
        files,
        reviews,
    } = enrichment;

    NewChangeEvent {
        connection_id,
        source: GITHUB_PROVIDER.to_string(),
        kind: EventKind::PullRequest,
        event_id: event_key(EventKind::PullRequest, repository, pr.number),
        title: tagged_title(EventKind::PullRequest, &pr.title),
        description: EventDescription::new(
            pr.body.clone().unwrap_or_default(),
            pr.labels.iter().map(|l| l.name.clone()).collect(),
        )
        .with_detail(DescriptionDetail::FilesChanged {
            files_changed: files,
        }),
        author: login_or_unknown(pr.user.as_ref()),
        timestamp: or_epoch(&[pr.updated_at, pr.created_at]),
        url: pr.html_url.clone(),
        status: pr.state.clone(),
        metadata: EventMetadata::PullRequest(PullRequestMetadata {
            repository: repository.to_string(),
            pr_number: pr.number,
            merged: detail.merged,
            mergeable: detail.mergeable,
            additions: detail.additions,
            deletions: detail.deletions,
            changed_files: detail.changed_files,
            base_branch: pr.base.name.clone(),
            head_branch: pr.head.name.clone(),
            reviewers: reviews.reviewers,
            approved_count: reviews.approved_count,
            changes_requested_count: reviews.changes_requested_count,
            comments: detail.comments,
            review_comments: detail.review_comments,
        }),
    }
}

fn normalize_release(connection_id: Uuid, repository: &str, release: &GhRelease) -> NewChangeEvent {
    let name = release
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(&release.tag_name);

    NewChangeEvent {
        connection_id,
        source: GITHUB_PROVIDER.to_string(),
        kind: EventKind::Release,
        event_id: event_key(EventKind::Release, repository, release.id),
        title: tagged_title(EventKind::Release, name),
        description: EventDescription::new(release.body.clone().unwrap_or_default(), Vec::new())
            .with_detail(DescriptionDetail::Assets {
                assets: release.assets.iter().map(|a| a.name.clone()).collect(),
            }),
        author: login_or_unknown(release.author.as_ref()),
        timestamp: or_epoch(&[release.published_at, release.created_at]),
        url: release.html_url.clone(),
        status: if release.draft { "draft" } else { "published" }.to_string(),
        metadata: EventMetadata::Release(ReleaseMetadata {
            repository: repository.to_string(),
            tag_name: release.tag_name.clone(),
            prerelease: release.prerelease,
            draft: release.draft,
        }),
    }
}

fn normalize_workflow_run(
    connection_id: Uuid,
    repository: &str,
    run: &GhWorkflowRun,
    failed_jobs: Vec<FailedJob>,
) -> NewChangeEvent {
    let name = run.name.as_deref().unwrap_or("workflow");
    let branch = run.head_branch.as_deref().unwrap_or(UNKNOWN);
    let indicator = run_status_indicator(run.conclusion.as_deref());
    let status = run
        .conclusion
        .clone()
        .or_else(|| run.status.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let failed_jobs_count = failed_jobs.len();

    NewChangeEvent {
        connection_id,
        source: GITHUB_PROVIDER.to_string(),
        kind: EventKind::WorkflowRun,
        event_id: event_key(EventKind::WorkflowRun, repository, run.id),
        title: tagged_title(
            EventKind::WorkflowRun,
            format!("{indicator} {name} - {branch}"),
        ),
        description: EventDescription::new(format!("Workflow: {name}"), Vec::new())
            .with_detail(DescriptionDetail::FailedJobs { failed_jobs }),
        author: login_or_unknown(run.triggering_actor.as_ref()),
        timestamp: or_epoch(&[run.updated_at, run.created_at]),
        url: run.html_url.clone(),
        status,
        metadata: EventMetadata::Run(RunMetadata {
            repository: repository.to_string(),
            workflow_id: run.workflow_id,
            run_number: run.run_number,
            run_attempt: run.run_attempt,
            event: run.event.clone(),
            branch: run.head_branch.clone(),
            commit_sha: prefix_chars(&run.head_sha, 7),
            conclusion: run.conclusion.clone(),
            duration_seconds: duration_seconds(run.created_at, run.updated_at),
            failed_jobs_count,
        }),
    }
}

fn normalize_commit(
    connection_id: Uuid,
    repository: &str,
    branch: &str,
    commit: &GhCommit,
    detail: &GhCommitDetail,
    limits: &SyncLimits,
) -> NewChangeEvent {
    let message = commit.commit.message.as_str();
    let author = commit.commit.author.as_ref();
    let stats = detail.stats.clone().unwrap_or_default();

    NewChangeEvent {
        connection_id,
        source: GITHUB_PROVIDER.to_string(),
        kind: EventKind::Commit,
        event_id: event_key(EventKind::Commit, repository, &commit.sha),
        title: tagged_title(
            EventKind::Commit,
            first_line(message, limits.title_max_chars),
        ),
        description: EventDescription::new(message, Vec::new()).with_detail(
            DescriptionDetail::FilesChanged {
                files_changed: capped(
                    detail.files.iter().map(|f| f.filename.clone()),
                    limits.files_limit,
                ),
            },
        ),
        author: author
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        timestamp: or_epoch(&[author.and_then(|a| a.date)]),
        url: commit.html_url.clone(),
        status: "committed".to_string(),
        metadata: EventMetadata::Commit(CommitMetadata {
            repository: repository.to_string(),
            branch: branch.to_string(),
            sha: commit.sha.clone(),
            additions: stats.additions,
            deletions: stats.deletions,
            total_changes: stats.total,
        }),
    }
}

fn normalize_package_version(
    connection_id: Uuid,
    target: &Target,
    package: &str,
    version: &GhPackageVersion,
    limits: &SyncLimits,
) -> NewChangeEvent {
    let org = target.owner.as_str();
    let image = image_name(org, package);
    let tags = version.tags().to_vec();
    let digest = version.name.clone().unwrap_or_default();
    // The versions endpoint does not report image size.
    let size_bytes: Option<u64> = None;
    let size = format_size(size_bytes);

    let mut text = format!(
        "Container image pushed to GitHub Container Registry\nImage: {image}\nTags: {}",
        capped(tags.iter().cloned(), limits.tag_preview_limit).join(", ")
    );
    if let Some(size) = &size {
        text.push_str(&format!("\nSize: {size}"));
    }
    let digest_preview = if digest.is_empty() { "N/A" } else { digest.as_str() };
    text.push_str(&format!("\nDigest: {}...", prefix_chars(digest_preview, 19)));

    let summary = ImageSummary {
        registry: REGISTRY_HOST.to_string(),
        image: image.clone(),
        digest_short: if digest.is_empty() {
            "N/A".to_string()
        } else {
            prefix_chars(&digest, 12)
        },
        size,
    };

    NewChangeEvent {
        connection_id,
        source: GITHUB_PROVIDER.to_string(),
        kind: EventKind::RegistryImage,
        event_id: event_key(EventKind::RegistryImage, &image, version.id),
        title: tagged_title(
            EventKind::RegistryImage,
            format!("{image}:{}", capped(tags.iter().cloned(), 3).join(", ")),
        ),
        description: EventDescription::new(text, tags.clone())
            .with_detail(DescriptionDetail::Image { metadata: summary }),
        author: login_or_unknown(version.author.as_ref()),
        timestamp: or_epoch(&[version.created_at]),
        url: version.html_url.clone().unwrap_or_else(|| {
            format!("https://github.com/orgs/{org}/packages/container/{package}")
        }),
        status: "published".to_string(),
        metadata: EventMetadata::Image(ImageMetadata {
            registry: REGISTRY_HOST.to_string(),
            package: package.to_string(),
            image,
            tags,
            digest,
            size_bytes,
            repository: target.name.clone(),
        }),
    }
}

// GitHub API response types

#[derive(Debug, Clone, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhRepo {
    full_name: String,
    owner: GhUser,
}

impl GhRepo {
    fn into_target(self) -> Target {
        Target::new(self.full_name.clone(), self.full_name, self.owner.login)
    }
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhBranchRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhPull {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    html_url: String,
    user: Option<GhUser>,
    #[serde(default)]
    labels: Vec<GhLabel>,
    base: GhBranchRef,
    head: GhBranchRef,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct GhPullDetail {
    merged: Option<bool>,
    mergeable: Option<bool>,
    additions: Option<u64>,
    deletions: Option<u64>,
    changed_files: Option<u64>,
    comments: Option<u64>,
    review_comments: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GhFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct GhReview {
    user: Option<GhUser>,
    state: String,
}

#[derive(Debug, Deserialize)]
struct GhAsset {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhRelease {
    id: u64,
    name: Option<String>,
    tag_name: String,
    body: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    html_url: String,
    author: Option<GhUser>,
    created_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<GhAsset>,
}

#[derive(Debug, Deserialize)]
struct GhWorkflowRun {
    id: u64,
    name: Option<String>,
    head_branch: Option<String>,
    #[serde(default)]
    head_sha: String,
    status: Option<String>,
    conclusion: Option<String>,
    workflow_id: Option<u64>,
    run_number: Option<u64>,
    run_attempt: Option<u64>,
    event: Option<String>,
    html_url: String,
    triggering_actor: Option<GhUser>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct GhJobList {
    #[serde(default)]
    jobs: Vec<GhJob>,
}

#[derive(Debug, Deserialize)]
struct GhJob {
    name: String,
    conclusion: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GhCommit {
    sha: String,
    html_url: String,
    commit: GhCommitBody,
}

#[derive(Debug, Deserialize)]
struct GhCommitBody {
    message: String,
    author: Option<GhCommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct GhCommitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct GhCommitDetail {
    stats: Option<GhCommitStats>,
    #[serde(default)]
    files: Vec<GhFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GhCommitStats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct GhPackage {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhPackageVersion {
    id: u64,
    /// Usually the image digest
    name: Option<String>,
    html_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
    author: Option<GhUser>,
    metadata: Option<GhPackageVersionMetadata>,
}

impl GhPackageVersion {
    fn tags(&self) -> &[String] {
        self.metadata
            .as_ref()
            .and_then(|m| m.container.as_ref())
            .map(|c| c.tags.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct GhPackageVersionMetadata {
    container: Option<GhContainerMetadata>,
}

#[derive(Debug, Deserialize)]
struct GhContainerMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection() -> Uuid {
        Uuid::nil()
    }

    fn pull() -> GhPull {
        serde_json::from_value(json!({
            "number": 42,
            "title": "Add caching",
            "body": "Speeds things up",
            "state": "open",
            "html_url": "https://github.com/octo/app/pull/42",
            "user": {"login": "alice"},
            "labels": [{"name": "perf"}],
            "base": {"ref": "main"},
            "head": {"ref": "feature/cache"},
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-02T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn pull_request_normalization_is_deterministic() {
        let enrichment = || PullEnrichment {
            detail: GhPullDetail::default(),
            files: vec!["src/cache.rs".to_string()],
            reviews: ReviewSummary::default(),
        };
        let first = normalize_pull_request(connection(), "octo/app", &pull(), enrichment());
        let second = normalize_pull_request(connection(), "octo/app", &pull(), enrichment());

        assert_eq!(first, second);
        assert_eq!(first.event_id, "pr-octo/app-42");
        assert_eq!(first.title, "[PR] Add caching");
        assert_eq!(first.author, "alice");
        assert_eq!(first.status, "open");
        assert_eq!(first.timestamp.to_rfc3339(), "2025-01-02T00:00:00+00:00");
    }

    #[test]
    fn pull_request_without_enrichment_defaults() {
        let event = normalize_pull_request(
            connection(),
            "octo/app",
            &pull(),
            PullEnrichment {
                detail: GhPullDetail::default(),
                files: Vec::new(),
                reviews: ReviewSummary::default(),
            },
        );
        let description = event.description_payload().unwrap();
        assert_eq!(description["files_changed"], json!([]));
        let metadata = event.metadata_payload().unwrap();
        assert_eq!(metadata["reviewers"], json!([]));
        assert_eq!(metadata["approved_count"], 0);
        assert_eq!(metadata["merged"], serde_json::Value::Null);
    }

    #[test]
    fn release_title_falls_back_to_tag() {
        let release: GhRelease = serde_json::from_value(json!({
            "id": 7,
            "name": "",
            "tag_name": "v1.2.0",
            "draft": true,
            "html_url": "https://github.com/octo/app/releases/7",
            "author": null,
            "created_at": "2025-02-01T00:00:00Z",
            "published_at": null,
            "assets": [{"name": "app.tar.gz"}]
        }))
        .unwrap();

        let event = normalize_release(connection(), "octo/app", &release);
        assert_eq!(event.title, "[Release] v1.2.0");
        assert_eq!(event.status, "draft");
        assert_eq!(event.author, "unknown");
        assert_eq!(event.timestamp.to_rfc3339(), "2025-02-01T00:00:00+00:00");
        assert_eq!(
            event.description_payload().unwrap()["assets"],
            json!(["app.tar.gz"])
        );
    }

    #[test]
    fn workflow_run_title_uses_indicator() {
        let run: GhWorkflowRun = serde_json::from_value(json!({
            "id": 900,
            "name": "CI",
            "head_branch": "main",
            "head_sha": "abcdef1234567",
            "status": "completed",
            "conclusion": "failure",
            "workflow_id": 3,
            "run_number": 12,
            "run_attempt": 1,
            "event": "push",
            "html_url": "https://github.com/octo/app/actions/runs/900",
            "created_at": "2025-01-01T10:00:00Z",
            "updated_at": "2025-01-01T10:05:00Z"
        }))
        .unwrap();

        let event = normalize_workflow_run(connection(), "octo/app", &run, Vec::new());
        assert_eq!(event.title, "[Workflow] ✗ CI - main");
        assert_eq!(event.event_id, "workflow-octo/app-900");
        assert_eq!(event.status, "failure");
        let metadata = event.metadata_payload().unwrap();
        assert_eq!(metadata["commit_sha"], "abcdef1");
        assert_eq!(metadata["duration_seconds"], 300);
        assert_eq!(metadata["failed_jobs_count"], 0);
    }

    #[test]
    fn workflow_run_without_branch_or_conclusion() {
        let run: GhWorkflowRun = serde_json::from_value(json!({
            "id": 901,
            "name": "Nightly",
            "html_url": "https://github.com/octo/app/actions/runs/901"
        }))
        .unwrap();

        let event = normalize_workflow_run(connection(), "octo/app", &run, Vec::new());
        assert_eq!(event.title, "[Workflow] • Nightly - unknown");
        assert_eq!(event.status, "unknown");
        assert_eq!(event.metadata_payload().unwrap()["branch"], serde_json::Value::Null);
    }

    #[test]
    fn failed_jobs_filter_successes() {
        let jobs: GhJobList = serde_json::from_value(json!({
            "jobs": [
                {"name": "build", "conclusion": "success"},
                {"name": "test", "conclusion": "failure", "started_at": "2025-01-01T10:00:00Z"}
            ]
        }))
        .unwrap();
        let failed = failed_jobs_of(jobs.jobs);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "test");
    }

    #[test]
    fn commit_title_is_first_line() {
        let commit: GhCommit = serde_json::from_value(json!({
            "sha": "0123456789abcdef",
            "html_url": "https://github.com/octo/app/commit/0123456789abcdef",
            "commit": {
                "message": "Fix flaky test\n\nLonger explanation",
                "author": {"name": "Bob", "date": "2025-03-01T00:00:00Z"}
            }
        }))
        .unwrap();

        let event = normalize_commit(
            connection(),
            "octo/app",
            "main",
            &commit,
            &GhCommitDetail::default(),
            &SyncLimits::default(),
        );
        assert_eq!(event.title, "[Commit] Fix flaky test");
        assert_eq!(event.event_id, "commit-octo/app-0123456789abcdef");
        assert_eq!(event.author, "Bob");
        assert_eq!(event.metadata_payload().unwrap()["total_changes"], 0);
    }

    #[test]
    fn package_version_normalization() {
        let version: GhPackageVersion = serde_json::from_value(json!({
            "id": 55,
            "name": "sha256:0123456789abcdef0123456789abcdef",
            "created_at": "2025-04-01T00:00:00Z",
            "metadata": {"container": {"tags": ["v1", "latest", "stable", "prod"]}}
        }))
        .unwrap();
        let target = Target::new("Octo/api", "Octo/api", "Octo");

        let event = normalize_package_version(
            connection(),
            &target,
            "api",
            &version,
            &SyncLimits::default(),
        );
        assert_eq!(event.event_id, "registry-ghcr.io/octo/api-55");
        assert_eq!(event.title, "[Image] ghcr.io/octo/api:v1, latest, stable");
        assert_eq!(
            event.url,
            "https://github.com/orgs/Octo/packages/container/api"
        );
        let description = event.description_payload().unwrap();
        assert_eq!(description["metadata"]["digest_short"], "sha256:01234");
        assert!(description["metadata"].get("size").is_none());
        assert!(!description["text"].as_str().unwrap().contains("Size:"));
        assert_eq!(event.metadata_payload().unwrap()["size_bytes"], serde_json::Value::Null);
    }
}
