//! forge::azure
//!
//! Azure DevOps forge implementation using the Git REST API.
//!
//! # Design
//!
//! This module implements the `Forge` trait for Azure DevOps Services (cloud)
//! and Azure DevOps Server / TFS (on-premises). All operations are plain
//! `GET`s; nothing is ever cloned or written.
//!
//! Endpoint URLs have the shape
//! `{base}/{organization}/{project}/_apis/git/...?api-version=X`.
//!
//! # Protocol versions
//!
//! On-premises servers reject `api-version` values newer than their release,
//! so the version is negotiated per client (see [`VersionNegotiator`]).
//! Ref listing walks its own candidate list because some servers answer the
//! repositories endpoint with one version and the refs endpoint only with
//! another.
//!
//! # Project GUID
//!
//! Some on-premises servers only accept the project GUID (not its name) in
//! refs/commits/diffs paths. The first successful repository listing records
//! the GUID and every later URL uses it.
//!
//! # Retries
//!
//! Network-level failures are retried with exponential backoff according to
//! the configured [`RetryPolicy`]. HTTP error statuses are never retried.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::api_version::{ApiVersion, VersionNegotiator, DISCOVERY_ORDER, REFS_ORDER};
use super::retry::RetryPolicy;
use super::traits::{
    AnnotatedTag, CommitInfo, DiffSummary, FileChange, Forge, ForgeError, GitRef,
    SearchCriteria, VersionDescriptor, TAG_PREFIX,
};
use crate::core::types::Repository;

/// Default Azure DevOps Services host.
pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of requests in flight at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Page size used when listing refs.
pub const REFS_PAGE_SIZE: u32 = 1000;

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "gitsnap";

/// Connection parameters for [`AzureDevOpsForge`].
#[derive(Clone)]
pub struct ConnectionParams {
    /// Organization (cloud) or collection (on-premises)
    pub organization: String,
    /// Project name
    pub project: String,
    /// Personal access token
    pub token: String,
    /// Optional username for basic auth
    pub username: Option<String>,
    /// Base URL; `None` means the cloud service
    pub base_url: Option<String>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    /// Upper bound on requests in flight, across all callers of one client
    pub max_concurrent_requests: usize,
}

impl ConnectionParams {
    /// Parameters for the cloud service with default retry and timeout.
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            token: token.into(),
            username: None,
            base_url: None,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    /// Set the basic-auth username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set a custom base URL (on-premises servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many requests may be in flight at once (at least 1).
    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("has_token", &!self.token.is_empty())
            .field("username", &self.username)
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .finish()
    }
}

/// Azure DevOps forge implementation.
pub struct AzureDevOpsForge {
    /// HTTP client for making requests
    client: Client,
    /// Base URL (cloud host or on-premises collection root)
    base_url: Url,
    organization: String,
    project: String,
    token: String,
    username: String,
    retry: RetryPolicy,
    /// Permits for requests in flight
    requests: Semaphore,
    /// Discovered protocol version
    versions: VersionNegotiator,
    /// Project GUID learned from the repository listing
    project_id: RwLock<Option<String>>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for AzureDevOpsForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDevOpsForge")
            .field("base_url", &self.base_url.as_str())
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("has_username", &!self.username.is_empty())
            .field("api_version", &self.versions.cached())
            .field("project_id", &self.project_id())
            .finish()
    }
}

impl AzureDevOpsForge {
    /// Create a forge from connection parameters.
    ///
    /// # Errors
    ///
    /// - `AuthRequired` if the token is empty
    /// - `InvalidBaseUrl` if the base URL cannot be parsed
    pub fn new(params: ConnectionParams) -> Result<Self, ForgeError> {
        if params.token.trim().is_empty() {
            return Err(ForgeError::AuthRequired);
        }

        let raw_base = params
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let base_url =
            Url::parse(raw_base).map_err(|e| ForgeError::InvalidBaseUrl(format!("{raw_base}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ForgeError::InvalidBaseUrl(raw_base.to_string()));
        }

        let client = Client::builder()
            .timeout(params.timeout)
            .default_headers(default_headers())
            .build()
            .map_err(|e| ForgeError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            organization: params.organization.trim().to_string(),
            project: params.project.trim().to_string(),
            token: params.token,
            username: params.username.unwrap_or_default(),
            retry: params.retry,
            requests: Semaphore::new(params.max_concurrent_requests.max(1)),
            versions: VersionNegotiator::default(),
            project_id: RwLock::new(None),
        })
    }

    /// Get the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Get the organization.
    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Get the project name as configured.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Get the project GUID learned from the repository listing, if any.
    pub fn project_id(&self) -> Option<String> {
        self.project_id.read().ok().and_then(|guard| guard.clone())
    }

    /// Get the protocol version discovery found, if any.
    ///
    /// The fallback used after a failed discovery is not reported here.
    pub fn cached_api_version(&self) -> Option<ApiVersion> {
        self.versions.cached()
    }

    /// Forget the negotiated version so the next call discovers again.
    pub fn reset_api_version(&self) {
        self.versions.forget();
    }

    fn remember_project_id(&self, id: &str) {
        if let Ok(mut guard) = self.project_id.write() {
            if guard.is_none() {
                debug!(project_id = id, "using project id in API paths");
                *guard = Some(id.to_string());
            }
        }
    }

    /// Project path segment: the learned GUID, else the configured name.
    fn project_segment(&self) -> String {
        self.project_id().unwrap_or_else(|| self.project.clone())
    }

    /// Build the URL for an endpoint below `_apis`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ForgeError> {
        let mut url = self.base_url.clone();
        let project = self.project_segment();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ForgeError::InvalidBaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            path.push(&self.organization);
            if !project.is_empty() {
                path.push(&project);
            }
            path.push("_apis");
            path.extend(segments);
        }
        Ok(url)
    }

    /// Send one GET and return the body of a successful response.
    async fn send_once(
        &self,
        url: &Url,
        version: ApiVersion,
        query: &[(String, String)],
    ) -> Result<String, ForgeError> {
        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.token))
            .query(&[("api-version", version.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .text()
                .await
                .map_err(|e| ForgeError::NetworkError(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(map_error_status(status, &body))
        }
    }

    /// GET with retry/backoff on network failures, parsing the JSON body.
    ///
    /// Returns `Ok(None)` for an empty body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        version: ApiVersion,
        query: &[(String, String)],
    ) -> Result<Option<T>, ForgeError> {
        let url = self.endpoint(segments)?;
        let mut last = String::new();

        for attempt in 0..self.retry.max_attempts {
            let sent = {
                let _permit = self
                    .requests
                    .acquire()
                    .await
                    .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
                self.send_once(&url, version, query).await
            };
            match sent {
                Ok(body) => return parse_body(&body),
                Err(ForgeError::NetworkError(message)) => {
                    last = message;
                    if let Some(delay) = self.retry.delay_after(attempt) {
                        warn!(
                            url = %url,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %last,
                            "request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(ForgeError::RequestExhausted {
            attempts: self.retry.max_attempts,
            last,
        })
    }

    /// Probe the repositories endpoint with one version.
    async fn probe(&self, version: ApiVersion) -> Result<bool, ForgeError> {
        let query = vec![("$top".to_string(), "1".to_string())];
        let envelope: Option<ListEnvelope<serde_json::Value>> = self
            .get_json(&["git", "repositories"], version, &query)
            .await?;
        Ok(envelope.is_some_and(|e| e.value.is_some()))
    }

    /// List repositories with each version other than `failed`.
    async fn list_repositories_fallback(
        &self,
        failed: ApiVersion,
        error: ForgeError,
    ) -> Result<Option<ListEnvelope<AzRepository>>, ForgeError> {
        let mut last = error;
        for version in self.versions.alternatives(failed) {
            match self.get_json(&["git", "repositories"], version, &[]).await {
                Ok(envelope) => {
                    info!(api_version = %version, "switched API version for repositories");
                    self.versions.remember(version);
                    return Ok(envelope);
                }
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// Query all refs without a prefix and keep the branch-like ones.
    ///
    /// Used when a `refs/heads/` query returns nothing: some servers expose
    /// branches without the prefix. The classification is heuristic.
    async fn list_branch_like_refs(&self, repo_id: &str) -> Result<Vec<GitRef>, ForgeError> {
        let segments = ["git", "repositories", repo_id, "refs"];
        let query = vec![("$top".to_string(), REFS_PAGE_SIZE.to_string())];

        for version in DISCOVERY_ORDER {
            let refs = match self
                .get_json::<ListEnvelope<AzRef>>(&segments, version, &query)
                .await
            {
                Ok(envelope) => envelope.and_then(ListEnvelope::into_items).unwrap_or_default(),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    debug!(api_version = %version, error = %e, "unfiltered refs query failed");
                    continue;
                }
            };
            let branches: Vec<GitRef> = refs
                .into_iter()
                .map(GitRef::from)
                .filter(|r| is_branch_like(&r.name))
                .collect();
            if !branches.is_empty() {
                debug!(
                    repo_id,
                    count = branches.len(),
                    "using unprefixed refs as branches"
                );
                return Ok(branches);
            }
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl Forge for AzureDevOpsForge {
    fn name(&self) -> &'static str {
        "azure-devops"
    }

    async fn test_connection(&self) -> Result<ApiVersion, ForgeError> {
        let mut last = None;
        for &version in self.versions.candidates() {
            match self.probe(version).await {
                Ok(true) => {
                    info!(api_version = %version, "discovered API version");
                    self.versions.remember(version);
                    return Ok(version);
                }
                Ok(false) => {
                    debug!(api_version = %version, "repository list missing from response");
                    last = Some(ForgeError::InvalidResponse(
                        "repository list missing 'value'".into(),
                    ));
                }
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    debug!(api_version = %version, error = %e, "API version probe failed");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| {
            ForgeError::InvalidResponse("no API version candidates configured".into())
        }))
    }

    async fn discover_api_version(&self) -> Result<ApiVersion, ForgeError> {
        if let Some(version) = self.versions.current() {
            return Ok(version);
        }
        match self.test_connection().await {
            Ok(version) => Ok(version),
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                let fallback = self.versions.settle_on_fallback();
                warn!(error = %e, fallback = %fallback, "API version discovery failed, using fallback");
                Ok(fallback)
            }
        }
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, ForgeError> {
        let version = self.discover_api_version().await?;
        let envelope: Option<ListEnvelope<AzRepository>> =
            match self.get_json(&["git", "repositories"], version, &[]).await {
                Ok(envelope) => envelope,
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    warn!(api_version = %version, error = %e, "repository listing failed, trying other versions");
                    self.list_repositories_fallback(version, e).await?
                }
            };

        let repos: Vec<Repository> = envelope
            .and_then(|e| e.value)
            .unwrap_or_default()
            .into_iter()
            .map(Repository::from)
            .collect();

        if self.project_id().is_none() {
            if let Some(guid) = repos
                .iter()
                .filter_map(|r| r.project_id.as_deref())
                .find(|id| !id.is_empty() && *id != self.project)
            {
                self.remember_project_id(guid);
            }
        }

        Ok(repos)
    }

    async fn list_refs(
        &self,
        repo_id: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<GitRef>, ForgeError> {
        let segments = ["git", "repositories", repo_id, "refs"];
        let mut query = vec![("$top".to_string(), REFS_PAGE_SIZE.to_string())];
        if let Some(prefix) = prefix {
            query.push(("filter".to_string(), prefix.to_string()));
            if prefix.starts_with(TAG_PREFIX) {
                query.push(("peelTags".to_string(), "true".to_string()));
            }
        }

        let mut listed: Option<Vec<GitRef>> = None;
        let mut last_error = None;
        for version in REFS_ORDER {
            match self
                .get_json::<ListEnvelope<AzRef>>(&segments, version, &query)
                .await
            {
                Ok(Some(envelope)) => match envelope.into_items() {
                    Some(refs) => {
                        listed = Some(refs.into_iter().map(GitRef::from).collect());
                        break;
                    }
                    None => debug!(api_version = %version, "no value/refs list in response"),
                },
                Ok(None) => debug!(api_version = %version, "empty refs response"),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    debug!(api_version = %version, error = %e, "refs query failed");
                    last_error = Some(e);
                }
            }
        }

        if let Some(refs) = &listed {
            if !refs.is_empty() {
                return Ok(refs.clone());
            }
        }

        if prefix.is_some_and(|p| p.contains("heads")) {
            let branches = self.list_branch_like_refs(repo_id).await?;
            if !branches.is_empty() {
                return Ok(branches);
            }
        }

        match (listed, last_error) {
            (Some(refs), _) => Ok(refs),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(Vec::new()),
        }
    }

    async fn get_commits(
        &self,
        repo_id: &str,
        criteria: &SearchCriteria,
        top: u32,
    ) -> Result<Vec<CommitInfo>, ForgeError> {
        let version = self.discover_api_version().await?;
        let mut query = vec![("$top".to_string(), top.to_string())];
        query.extend(criteria.query_pairs());

        let envelope: Option<ListEnvelope<AzCommit>> = self
            .get_json(&["git", "repositories", repo_id, "commits"], version, &query)
            .await?;
        Ok(collect_commits(envelope))
    }

    async fn compare_commits(
        &self,
        repo_id: &str,
        from_commit: &str,
        to_commit: &str,
        top: u32,
    ) -> Result<Vec<CommitInfo>, ForgeError> {
        let version = self.discover_api_version().await?;
        let criteria = SearchCriteria::between(
            VersionDescriptor::commit(from_commit),
            VersionDescriptor::commit(to_commit),
        );
        let mut query = criteria.query_pairs();
        query.push(("searchCriteria.$top".to_string(), top.to_string()));

        let envelope: Option<ListEnvelope<AzCommit>> = self
            .get_json(&["git", "repositories", repo_id, "commits"], version, &query)
            .await?;
        Ok(collect_commits(envelope))
    }

    async fn get_diff(
        &self,
        repo_id: &str,
        base: &VersionDescriptor,
        target: &VersionDescriptor,
        top: u32,
        skip: u32,
    ) -> Result<DiffSummary, ForgeError> {
        let version = self.discover_api_version().await?;
        let query = vec![
            ("baseVersion".to_string(), base.version.clone()),
            ("baseVersionType".to_string(), base.version_type.to_string()),
            ("targetVersion".to_string(), target.version.clone()),
            ("targetVersionType".to_string(), target.version_type.to_string()),
            ("$top".to_string(), top.to_string()),
            ("$skip".to_string(), skip.to_string()),
        ];

        let diff: Option<AzDiff> = self
            .get_json(
                &["git", "repositories", repo_id, "diffs", "commits"],
                version,
                &query,
            )
            .await?;
        Ok(diff.map(DiffSummary::from).unwrap_or_default())
    }

    async fn get_commit_by_id(
        &self,
        repo_id: &str,
        commit_id: &str,
    ) -> Result<Option<CommitInfo>, ForgeError> {
        let version = self.discover_api_version().await?;
        match self
            .get_json::<AzCommit>(
                &["git", "repositories", repo_id, "commits", commit_id],
                version,
                &[],
            )
            .await
        {
            Ok(commit) => Ok(commit.and_then(AzCommit::into_commit_info)),
            Err(ForgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_annotated_tag(
        &self,
        repo_id: &str,
        object_id: &str,
    ) -> Result<Option<AnnotatedTag>, ForgeError> {
        let version = self.discover_api_version().await?;
        match self
            .get_json::<AzAnnotatedTag>(
                &["git", "repositories", repo_id, "annotatedtags", object_id],
                version,
                &[],
            )
            .await
        {
            Ok(tag) => Ok(tag.map(|t| t.into_annotated_tag(object_id))),
            Err(ForgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Headers sent with every request.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers
}

/// Map a non-success status to a `ForgeError`.
pub fn map_error_status(status: StatusCode, body: &str) -> ForgeError {
    let message = serde_json::from_str::<AzErrorResponse>(body)
        .ok()
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty());

    match status {
        StatusCode::UNAUTHORIZED => {
            ForgeError::AuthFailed("invalid PAT or insufficient permissions".into())
        }
        StatusCode::NOT_FOUND => {
            ForgeError::NotFound(message.unwrap_or_else(|| "resource not found".into()))
        }
        _ => ForgeError::ApiError {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            }),
        },
    }
}

/// Parse a JSON body; an empty body means "no data".
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<Option<T>, ForgeError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| ForgeError::InvalidResponse(e.to_string()))
}

/// Whether an unprefixed ref name looks like a branch.
///
/// Best effort: a lightweight tag exposed without `refs/tags/` is
/// indistinguishable from a branch and will be misclassified.
pub fn is_branch_like(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || name.starts_with(TAG_PREFIX) {
        return false;
    }
    name.starts_with("refs/heads/") || name.starts_with("heads/") || !name.contains('/')
}

fn collect_commits(envelope: Option<ListEnvelope<AzCommit>>) -> Vec<CommitInfo> {
    envelope
        .and_then(|e| e.value)
        .unwrap_or_default()
        .into_iter()
        .filter_map(AzCommit::into_commit_info)
        .collect()
}

// --------------------------------------------------------------------------
// API Response Types
// --------------------------------------------------------------------------

/// List envelope. Most endpoints use `value`; some servers answer the refs
/// endpoint with `refs`.
#[derive(Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Option::default")]
    value: Option<Vec<T>>,
    #[serde(default = "Option::default")]
    refs: Option<Vec<T>>,
}

impl<T> ListEnvelope<T> {
    fn into_items(self) -> Option<Vec<T>> {
        self.value.or(self.refs)
    }
}

/// Error response format.
#[derive(Deserialize)]
struct AzErrorResponse {
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzProject {
    id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzRepository {
    id: Option<String>,
    #[serde(default)]
    name: String,
    project: Option<AzProject>,
    default_branch: Option<String>,
    web_url: Option<String>,
}

impl From<AzRepository> for Repository {
    fn from(repo: AzRepository) -> Self {
        Repository {
            id: repo.id,
            name: repo.name,
            project_id: repo.project.and_then(|p| p.id),
            default_branch: repo.default_branch,
            web_url: repo.web_url,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzRef {
    #[serde(default)]
    name: String,
    object_id: Option<String>,
    peeled_object_id: Option<String>,
}

impl From<AzRef> for GitRef {
    fn from(r: AzRef) -> Self {
        GitRef {
            name: r.name.trim().to_string(),
            object_id: r.object_id.filter(|id| !id.is_empty()),
            peeled_object_id: r.peeled_object_id.filter(|id| !id.is_empty()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzUserDate {
    name: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzCommit {
    commit_id: Option<String>,
    comment: Option<String>,
    author: Option<AzUserDate>,
    committer: Option<AzUserDate>,
}

impl AzCommit {
    /// Convert, dropping entries without a commit id.
    fn into_commit_info(self) -> Option<CommitInfo> {
        let commit_id = self.commit_id.filter(|id| !id.is_empty())?;
        let author_date = self.author.as_ref().and_then(|a| a.date.clone());
        let date = self
            .committer
            .and_then(|c| c.date)
            .or(author_date)
            .filter(|d| !d.is_empty());
        Some(CommitInfo {
            commit_id,
            message: self.comment.unwrap_or_default().trim().to_string(),
            author: self.author.and_then(|a| a.name).unwrap_or_default(),
            date,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzItem {
    path: Option<String>,
    original_path: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzChange {
    item: Option<AzItem>,
    path: Option<String>,
    change_type: Option<String>,
}

impl AzChange {
    fn into_file_change(self) -> Option<FileChange> {
        let (path, original) = match self.item {
            Some(item) => (item.path, item.original_path),
            None => (None, None),
        };
        let path = [path, original, self.path]
            .into_iter()
            .flatten()
            .find(|p| !p.is_empty())?;
        Some(FileChange {
            path,
            change_type: self.change_type,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzDiff {
    #[serde(default)]
    change_counts: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    changes: Option<Vec<AzChange>>,
    ahead_count: Option<u64>,
    behind_count: Option<u64>,
}

impl From<AzDiff> for DiffSummary {
    fn from(diff: AzDiff) -> Self {
        DiffSummary {
            change_counts: diff.change_counts.unwrap_or_default(),
            changes: diff
                .changes
                .unwrap_or_default()
                .into_iter()
                .filter_map(AzChange::into_file_change)
                .collect(),
            ahead_count: diff.ahead_count.unwrap_or(0),
            behind_count: diff.behind_count.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzTaggedObject {
    object_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzAnnotatedTag {
    name: Option<String>,
    object_id: Option<String>,
    message: Option<String>,
    tagged_object: Option<AzTaggedObject>,
    tagged_by: Option<AzUserDate>,
}

impl AzAnnotatedTag {
    fn into_annotated_tag(self, requested_id: &str) -> AnnotatedTag {
        let (tagger, date) = match self.tagged_by {
            Some(by) => (by.name, by.date),
            None => (None, None),
        };
        AnnotatedTag {
            name: self.name.unwrap_or_default(),
            object_id: self.object_id.unwrap_or_else(|| requested_id.to_string()),
            tagged_object_id: self.tagged_object.and_then(|o| o.object_id),
            tagger,
            date,
            message: self.message.unwrap_or_default().trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge() -> AzureDevOpsForge {
        AzureDevOpsForge::new(ConnectionParams::new("contoso", "Mobile", "secret-pat")).unwrap()
    }

    mod construction {
        use super::*;

        #[test]
        fn empty_token_rejected() {
            let err = AzureDevOpsForge::new(ConnectionParams::new("o", "p", "  ")).unwrap_err();
            assert_eq!(err, ForgeError::AuthRequired);
        }

        #[test]
        fn invalid_base_url_rejected() {
            let params = ConnectionParams::new("o", "p", "t").with_base_url("not a url");
            let err = AzureDevOpsForge::new(params).unwrap_err();
            assert!(matches!(err, ForgeError::InvalidBaseUrl(_)));
        }

        #[test]
        fn blank_base_url_means_cloud() {
            let params = ConnectionParams::new("o", "p", "t").with_base_url("   ");
            let forge = AzureDevOpsForge::new(params).unwrap();
            assert_eq!(forge.base_url.as_str(), "https://dev.azure.com/");
        }

        #[test]
        fn debug_redacts_token() {
            let forge = forge();
            let debug_output = format!("{:?}", forge);
            assert!(!debug_output.contains("secret-pat"));
            assert!(debug_output.contains("contoso"));

            let params = ConnectionParams::new("o", "p", "secret-pat");
            assert!(!format!("{:?}", params).contains("secret-pat"));
        }

        #[test]
        fn name_is_azure_devops() {
            assert_eq!(forge().name(), "azure-devops");
        }
    }

    mod endpoint {
        use super::*;

        #[test]
        fn cloud_url() {
            let url = forge().endpoint(&["git", "repositories"]).unwrap();
            assert_eq!(
                url.as_str(),
                "https://dev.azure.com/contoso/Mobile/_apis/git/repositories"
            );
        }

        #[test]
        fn on_prem_url_keeps_collection_path() {
            let params = ConnectionParams::new("DefaultCollection", "APPMOBILE", "t")
                .with_base_url("http://tfs.local:8080/tfs/");
            let forge = AzureDevOpsForge::new(params).unwrap();
            let url = forge.endpoint(&["git", "repositories", "r1", "refs"]).unwrap();
            assert_eq!(
                url.as_str(),
                "http://tfs.local:8080/tfs/DefaultCollection/APPMOBILE/_apis/git/repositories/r1/refs"
            );
        }

        #[test]
        fn segments_are_encoded() {
            let forge = AzureDevOpsForge::new(ConnectionParams::new("o", "My Project", "t")).unwrap();
            let url = forge.endpoint(&["git", "repositories", "repo name"]).unwrap();
            assert_eq!(
                url.as_str(),
                "https://dev.azure.com/o/My%20Project/_apis/git/repositories/repo%20name"
            );
        }

        #[test]
        fn project_id_replaces_name() {
            let forge = forge();
            forge.remember_project_id("1111-2222");
            let url = forge.endpoint(&["git", "repositories"]).unwrap();
            assert_eq!(
                url.as_str(),
                "https://dev.azure.com/contoso/1111-2222/_apis/git/repositories"
            );
        }

        #[test]
        fn project_id_is_recorded_once() {
            let forge = forge();
            forge.remember_project_id("first");
            forge.remember_project_id("second");
            assert_eq!(forge.project_id(), Some("first".to_string()));
        }
    }

    mod status_mapping {
        use super::*;

        #[test]
        fn unauthorized() {
            let err = map_error_status(StatusCode::UNAUTHORIZED, "");
            assert!(matches!(err, ForgeError::AuthFailed(_)));
        }

        #[test]
        fn not_found_uses_body_message() {
            let err = map_error_status(
                StatusCode::NOT_FOUND,
                r#"{"message":"TF401019: repository does not exist"}"#,
            );
            assert_eq!(
                err,
                ForgeError::NotFound("TF401019: repository does not exist".into())
            );
        }

        #[test]
        fn not_found_without_body() {
            let err = map_error_status(StatusCode::NOT_FOUND, "<html></html>");
            assert_eq!(err, ForgeError::NotFound("resource not found".into()));
        }

        #[test]
        fn other_status_is_api_error() {
            let err = map_error_status(StatusCode::BAD_REQUEST, "");
            assert_eq!(
                err,
                ForgeError::ApiError {
                    status: 400,
                    message: "Bad Request".into()
                }
            );
        }
    }

    mod branch_like {
        use super::*;

        #[test]
        fn classifies_refs() {
            assert!(is_branch_like("refs/heads/main"));
            assert!(is_branch_like("heads/develop"));
            assert!(is_branch_like("master"));
            assert!(is_branch_like("CR-Luglio"));
            assert!(!is_branch_like("refs/tags/v1.0"));
            assert!(!is_branch_like("refs/pull/1/merge"));
            assert!(!is_branch_like(""));
        }
    }

    mod conversions {
        use super::*;

        #[test]
        fn parse_empty_body_is_none() {
            let parsed: Option<serde_json::Value> = parse_body("  ").unwrap();
            assert!(parsed.is_none());
        }

        #[test]
        fn parse_garbage_is_invalid_response() {
            let err = parse_body::<serde_json::Value>("{not json").unwrap_err();
            assert!(matches!(err, ForgeError::InvalidResponse(_)));
        }

        #[test]
        fn envelope_accepts_refs_shape() {
            let envelope: ListEnvelope<AzRef> =
                serde_json::from_str(r#"{"refs":[{"name":"refs/heads/main","objectId":"abc"}]}"#)
                    .unwrap();
            let items = envelope.into_items().unwrap();
            assert_eq!(items.len(), 1);
        }

        #[test]
        fn envelope_without_list() {
            let envelope: ListEnvelope<AzRef> = serde_json::from_str(r#"{"count":0}"#).unwrap();
            assert!(envelope.into_items().is_none());
        }

        #[test]
        fn commit_prefers_committer_date() {
            let commit: AzCommit = serde_json::from_str(
                r#"{"commitId":"abc1234","comment":" Fix bug \n","author":{"name":"Ada","date":"2024-01-01T00:00:00Z"},"committer":{"name":"Bot","date":"2024-01-02T00:00:00Z"}}"#,
            )
            .unwrap();
            let info = commit.into_commit_info().unwrap();
            assert_eq!(info.message, "Fix bug");
            assert_eq!(info.author, "Ada");
            assert_eq!(info.date.as_deref(), Some("2024-01-02T00:00:00Z"));
        }

        #[test]
        fn commit_without_id_dropped() {
            let commit: AzCommit = serde_json::from_str(r#"{"comment":"x"}"#).unwrap();
            assert!(commit.into_commit_info().is_none());
        }

        #[test]
        fn diff_paths_fall_back_to_original() {
            let diff: AzDiff = serde_json::from_str(
                r#"{
                    "changeCounts": {"Edit": 2, "Add": 1},
                    "changes": [
                        {"item": {"path": "/src/a.rs"}, "changeType": "edit"},
                        {"item": {"originalPath": "/src/old.rs"}, "changeType": "rename"},
                        {"item": {}, "changeType": "edit"}
                    ],
                    "aheadCount": 4,
                    "behindCount": 1
                }"#,
            )
            .unwrap();
            let summary = DiffSummary::from(diff);
            assert_eq!(summary.total_changes(), 3);
            assert_eq!(summary.ahead_count, 4);
            assert_eq!(summary.behind_count, 1);
            let paths: Vec<&str> = summary.changes.iter().map(|c| c.path.as_str()).collect();
            assert_eq!(paths, vec!["/src/a.rs", "/src/old.rs"]);
        }

        #[test]
        fn annotated_tag_conversion() {
            let tag: AzAnnotatedTag = serde_json::from_str(
                r#"{"name":"prod-1","objectId":"tagobj","message":"release\n","taggedObject":{"objectId":"c0ffee1","objectType":"commit"},"taggedBy":{"name":"Ada","date":"2024-03-01T10:00:00Z"}}"#,
            )
            .unwrap();
            let tag = tag.into_annotated_tag("tagobj");
            assert_eq!(tag.tagged_object_id.as_deref(), Some("c0ffee1"));
            assert_eq!(tag.date.as_deref(), Some("2024-03-01T10:00:00Z"));
            assert_eq!(tag.message, "release");
        }
    }
}
