//! forge::traits
//!
//! Forge trait definition for reading from a remote Git hosting service.
//!
//! # Design
//!
//! The `Forge` trait is async because every operation is a network call.
//! All methods return `Result` so that the engine can decide, per call site,
//! whether a failure is terminal or a signal to fall back.
//!
//! Response values are fixed, fully-typed structs. Implementations validate
//! the wire shape once at their boundary and convert into these types, so
//! the resolver and diff service never look at raw JSON.
//!
//! The trait is read-only by construction: there are no operations that
//! create, update or delete anything on the remote.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use super::api_version::ApiVersion;
use crate::core::types::Repository;

/// Full-name prefix of branch refs.
pub const BRANCH_PREFIX: &str = "refs/heads/";

/// Full-name prefix of tag refs.
pub const TAG_PREFIX: &str = "refs/tags/";

/// Errors from forge operations.
///
/// These map to the failure modes of a REST-based Git service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForgeError {
    /// No credential was supplied.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (HTTP 401). Never retried.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other HTTP error status.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// A single network-level failure (connect, timeout, body read).
    #[error("network error: {0}")]
    NetworkError(String),

    /// Network failures persisted through every retry attempt.
    #[error("request failed after {attempts} attempts: {last}")]
    RequestExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The last underlying failure
        last: String,
    },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The configured base URL cannot be used to build endpoint URLs.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ForgeError {
    /// Check whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForgeError::NotFound(_))
    }

    /// Check whether this is an authentication error.
    pub fn is_auth(&self) -> bool {
        matches!(self, ForgeError::AuthFailed(_) | ForgeError::AuthRequired)
    }
}

/// How a version string passed to the service should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionType {
    Branch,
    Tag,
    Commit,
}

impl VersionType {
    /// The value the service expects in `versionType` parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionType::Branch => "branch",
            VersionType::Tag => "tag",
            VersionType::Commit => "commit",
        }
    }
}

impl std::fmt::Display for VersionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A version (branch, tag or commit) anchoring a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionDescriptor {
    /// Branch name, tag name or commit id
    pub version: String,
    /// How to interpret `version`
    pub version_type: VersionType,
}

impl VersionDescriptor {
    /// Anchor at a raw commit id.
    pub fn commit(id: impl Into<String>) -> Self {
        Self {
            version: id.into(),
            version_type: VersionType::Commit,
        }
    }

    /// Anchor at a tag name.
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            version: name.into(),
            version_type: VersionType::Tag,
        }
    }

    /// Anchor at a branch name.
    pub fn branch(name: impl Into<String>) -> Self {
        Self {
            version: name.into(),
            version_type: VersionType::Branch,
        }
    }
}

/// Search criteria for commit queries.
///
/// `item_version` anchors the walk; `compare_version` excludes everything
/// reachable from it (i.e. "commits in item but not in compare").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub item_version: Option<VersionDescriptor>,
    pub compare_version: Option<VersionDescriptor>,
}

impl SearchCriteria {
    /// Criteria anchored at a single version.
    pub fn at(version: VersionDescriptor) -> Self {
        Self {
            item_version: Some(version),
            compare_version: None,
        }
    }

    /// Criteria selecting commits in `item` that are not in `compare`.
    pub fn between(item: VersionDescriptor, compare: VersionDescriptor) -> Self {
        Self {
            item_version: Some(item),
            compare_version: Some(compare),
        }
    }

    /// Render the criteria as `searchCriteria.*` query pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let anchors = [
            ("itemVersion", &self.item_version),
            ("compareVersion", &self.compare_version),
        ];
        for (key, descriptor) in anchors {
            if let Some(d) = descriptor {
                pairs.push((format!("searchCriteria.{key}.version"), d.version.clone()));
                pairs.push((
                    format!("searchCriteria.{key}.versionType"),
                    d.version_type.as_str().to_string(),
                ));
            }
        }
        pairs
    }
}

/// A Git ref as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Full ref name (normally `refs/heads/...` or `refs/tags/...`)
    pub name: String,
    /// Object the ref points at (commit, or tag object for annotated tags)
    pub object_id: Option<String>,
    /// Commit an annotated tag points at, when listed with peeled tags
    pub peeled_object_id: Option<String>,
}

impl GitRef {
    /// Create a ref pointing at an object.
    pub fn new(name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object_id: Some(object_id.into()),
            peeled_object_id: None,
        }
    }

    /// Set the peeled commit id of an annotated tag.
    pub fn with_peeled(mut self, commit_id: impl Into<String>) -> Self {
        self.peeled_object_id = Some(commit_id.into());
        self
    }
}

/// Commit message, author and date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full commit id
    pub commit_id: String,
    /// Commit message, trimmed
    pub message: String,
    /// Author display name
    pub author: String,
    /// Committer date, falling back to author date (ISO 8601)
    pub date: Option<String>,
}

/// A single changed file in a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Normalized path, or the original path when only that is known
    pub path: String,
    /// Change type as reported by the service (e.g. "edit", "add")
    pub change_type: Option<String>,
}

/// Structured diff between a base and a target version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of changed files by change type
    pub change_counts: BTreeMap<String, u64>,
    /// Per-file entries (possibly a page of the full list)
    pub changes: Vec<FileChange>,
    /// Commits reachable from target but not base
    pub ahead_count: u64,
    /// Commits reachable from base but not target
    pub behind_count: u64,
}

impl DiffSummary {
    /// Total number of changed files across all change types.
    pub fn total_changes(&self) -> u64 {
        self.change_counts.values().sum()
    }
}

/// Annotated tag metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedTag {
    /// Tag name
    pub name: String,
    /// Id of the tag object itself
    pub object_id: String,
    /// Id of the object the tag points at (normally a commit)
    pub tagged_object_id: Option<String>,
    /// Tagger display name
    pub tagger: Option<String>,
    /// Tagging date (ISO 8601)
    pub date: Option<String>,
    /// Tag message
    pub message: String,
}

/// The Forge trait: the single gateway to the remote Git service.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the engine shares one forge
/// across concurrently processed repositories.
///
/// # Error Handling
///
/// - `AuthFailed`: surfaced immediately, never retried
/// - `NotFound`: contextual, callers decide whether to fall back
/// - `RequestExhausted`: network failures outlived the retry budget
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "azure-devops").
    fn name(&self) -> &'static str;

    /// Probe the service and return the first protocol version that works.
    ///
    /// # Errors
    ///
    /// Returns the last failure if no candidate version answered.
    async fn test_connection(&self) -> Result<ApiVersion, ForgeError>;

    /// Get the protocol version in use, discovering it if needed.
    ///
    /// Only fails on authentication errors; otherwise falls back to the
    /// most conservative version.
    async fn discover_api_version(&self) -> Result<ApiVersion, ForgeError>;

    /// List the repositories of the configured project.
    async fn list_repositories(&self) -> Result<Vec<Repository>, ForgeError>;

    /// List refs of a repository, optionally filtered by name prefix.
    async fn list_refs(
        &self,
        repo_id: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<GitRef>, ForgeError>;

    /// List commits matching version-anchored criteria (newest first).
    async fn get_commits(
        &self,
        repo_id: &str,
        criteria: &SearchCriteria,
        top: u32,
    ) -> Result<Vec<CommitInfo>, ForgeError>;

    /// List commits reachable from `from_commit` but not from `to_commit`.
    async fn compare_commits(
        &self,
        repo_id: &str,
        from_commit: &str,
        to_commit: &str,
        top: u32,
    ) -> Result<Vec<CommitInfo>, ForgeError>;

    /// Get the diff between `base` and `target`.
    ///
    /// Ahead/behind counts are relative to base → target.
    async fn get_diff(
        &self,
        repo_id: &str,
        base: &VersionDescriptor,
        target: &VersionDescriptor,
        top: u32,
        skip: u32,
    ) -> Result<DiffSummary, ForgeError>;

    /// Get a single commit, or `None` if it does not exist.
    async fn get_commit_by_id(
        &self,
        repo_id: &str,
        commit_id: &str,
    ) -> Result<Option<CommitInfo>, ForgeError>;

    /// Get annotated tag metadata, or `None` if the object is not an
    /// annotated tag.
    async fn get_annotated_tag(
        &self,
        repo_id: &str,
        object_id: &str,
    ) -> Result<Option<AnnotatedTag>, ForgeError>;
}
