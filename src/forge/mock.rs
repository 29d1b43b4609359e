//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge provides a deterministic implementation of the `Forge` trait
//! for use in tests. Repositories, refs, commits and diffs are seeded through
//! builder methods and served from memory. Failures can be injected per
//! operation and optionally scoped to one repository, and every call is
//! recorded for later verification.
//!
//! # Example
//!
//! ```
//! use gitsnap::core::types::Repository;
//! use gitsnap::forge::mock::MockForge;
//! use gitsnap::forge::Forge;
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new()
//!     .with_repository(Repository::new("r1", "alpha"))
//!     .with_branch("r1", "develop", "aaa1111bbbb");
//!
//! let refs = forge.list_refs("r1", Some("refs/heads/")).await.unwrap();
//! assert_eq!(refs.len(), 1);
//! assert_eq!(refs[0].name, "refs/heads/develop");
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::api_version::ApiVersion;
use super::traits::{
    AnnotatedTag, CommitInfo, DiffSummary, Forge, ForgeError, GitRef, SearchCriteria,
    VersionDescriptor, VersionType, BRANCH_PREFIX, TAG_PREFIX,
};
use crate::core::types::Repository;

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockForgeInner {
    api_version: ApiVersion,
    repositories: Vec<Repository>,
    /// Refs by repository key.
    refs: HashMap<String, Vec<GitRef>>,
    /// Commit history returned for a tag query, by (repo, tag name).
    tag_commits: HashMap<(String, String), Vec<CommitInfo>>,
    /// Commits by (repo, commit id).
    commits: HashMap<(String, String), CommitInfo>,
    /// Annotated tags by (repo, tag object id).
    annotated_tags: HashMap<(String, String), AnnotatedTag>,
    /// Diffs by (repo, base version, target version).
    diffs: HashMap<(String, String, String), DiffSummary>,
    /// Commit ranges by (repo, from, to).
    compares: HashMap<(String, String, String), Vec<CommitInfo>>,
    /// Injected failures.
    failures: Vec<FailOn>,
    /// Artificial delay applied to `get_diff`.
    latency: Option<Duration>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
///
/// Repository-scoped variants fail only for that repository when `repo_id`
/// is set, and for every repository otherwise.
#[derive(Debug, Clone)]
pub enum FailOn {
    TestConnection(ForgeError),
    ListRepositories(ForgeError),
    ListRefs {
        repo_id: Option<String>,
        error: ForgeError,
    },
    GetCommits {
        repo_id: Option<String>,
        error: ForgeError,
    },
    CompareCommits {
        repo_id: Option<String>,
        error: ForgeError,
    },
    GetDiff {
        repo_id: Option<String>,
        error: ForgeError,
    },
    GetCommitById {
        repo_id: Option<String>,
        error: ForgeError,
    },
    GetAnnotatedTag {
        repo_id: Option<String>,
        error: ForgeError,
    },
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    TestConnection,
    ListRepositories,
    ListRefs {
        repo_id: String,
        prefix: Option<String>,
    },
    GetCommits {
        repo_id: String,
        criteria: SearchCriteria,
        top: u32,
    },
    CompareCommits {
        repo_id: String,
        from_commit: String,
        to_commit: String,
        top: u32,
    },
    GetDiff {
        repo_id: String,
        base: VersionDescriptor,
        target: VersionDescriptor,
        top: u32,
        skip: u32,
    },
    GetCommitById {
        repo_id: String,
        commit_id: String,
    },
    GetAnnotatedTag {
        repo_id: String,
        object_id: String,
    },
}

impl MockOperation {
    /// Repository addressed by the operation, if any.
    pub fn repo_id(&self) -> Option<&str> {
        match self {
            MockOperation::TestConnection | MockOperation::ListRepositories => None,
            MockOperation::ListRefs { repo_id, .. }
            | MockOperation::GetCommits { repo_id, .. }
            | MockOperation::CompareCommits { repo_id, .. }
            | MockOperation::GetDiff { repo_id, .. }
            | MockOperation::GetCommitById { repo_id, .. }
            | MockOperation::GetAnnotatedTag { repo_id, .. } => Some(repo_id),
        }
    }
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                api_version: ApiVersion::V7_1,
                repositories: Vec::new(),
                refs: HashMap::new(),
                tag_commits: HashMap::new(),
                commits: HashMap::new(),
                annotated_tags: HashMap::new(),
                diffs: HashMap::new(),
                compares: HashMap::new(),
                failures: Vec::new(),
                latency: None,
                operations: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the version reported by discovery.
    pub fn with_api_version(self, version: ApiVersion) -> Self {
        self.lock().api_version = version;
        self
    }

    /// Add a repository to the project listing.
    pub fn with_repository(self, repo: Repository) -> Self {
        self.lock().repositories.push(repo);
        self
    }

    /// Add a ref with an arbitrary name.
    pub fn with_ref(self, repo_id: &str, git_ref: GitRef) -> Self {
        self.lock()
            .refs
            .entry(repo_id.to_string())
            .or_default()
            .push(git_ref);
        self
    }

    /// Add a branch `refs/heads/{name}` pointing at `commit_id`.
    pub fn with_branch(self, repo_id: &str, name: &str, commit_id: &str) -> Self {
        self.with_ref(repo_id, GitRef::new(format!("{BRANCH_PREFIX}{name}"), commit_id))
    }

    /// Add a tag `refs/tags/{name}` pointing at `object_id`.
    pub fn with_tag(self, repo_id: &str, name: &str, object_id: &str) -> Self {
        self.with_ref(repo_id, GitRef::new(format!("{TAG_PREFIX}{name}"), object_id))
    }

    /// Set the commit returned when commits are queried at tag `name`.
    pub fn with_tag_commit(self, repo_id: &str, name: &str, commit: CommitInfo) -> Self {
        self.lock()
            .tag_commits
            .insert((repo_id.to_string(), name.to_string()), vec![commit]);
        self
    }

    /// Add annotated tag metadata, keyed by the tag object id.
    pub fn with_annotated_tag(self, repo_id: &str, tag: AnnotatedTag) -> Self {
        self.lock()
            .annotated_tags
            .insert((repo_id.to_string(), tag.object_id.clone()), tag);
        self
    }

    /// Add a commit retrievable by id.
    pub fn with_commit(self, repo_id: &str, commit: CommitInfo) -> Self {
        self.lock()
            .commits
            .insert((repo_id.to_string(), commit.commit_id.clone()), commit);
        self
    }

    /// Set the diff returned for `base` → `target`.
    pub fn with_diff(self, repo_id: &str, base: &str, target: &str, diff: DiffSummary) -> Self {
        self.lock().diffs.insert(
            (repo_id.to_string(), base.to_string(), target.to_string()),
            diff,
        );
        self
    }

    /// Set the commits reachable from `from` but not from `to`.
    pub fn with_compare(
        self,
        repo_id: &str,
        from: &str,
        to: &str,
        commits: Vec<CommitInfo>,
    ) -> Self {
        self.lock().compares.insert(
            (repo_id.to_string(), from.to_string(), to.to_string()),
            commits,
        );
        self
    }

    /// Delay every `get_diff` call.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use gitsnap::forge::mock::{MockForge, FailOn};
    /// use gitsnap::forge::ForgeError;
    ///
    /// let forge = MockForge::new().fail_on(FailOn::GetDiff {
    ///     repo_id: Some("r4".into()),
    ///     error: ForgeError::NotFound("repository".into()),
    /// });
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().failures.push(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().failures.clear();
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Operations addressed at one repository.
    pub fn operations_for(&self, repo_id: &str) -> Vec<MockOperation> {
        self.operations()
            .into_iter()
            .filter(|op| op.repo_id() == Some(repo_id))
            .collect()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        self.lock().operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, expected: &str, repo: Option<&str>) -> Option<ForgeError> {
        let scoped = |repo_id: &Option<String>| match repo_id {
            None => true,
            Some(id) => repo == Some(id.as_str()),
        };

        self.lock().failures.iter().find_map(|f| match f {
            FailOn::TestConnection(e) if expected == "test_connection" => Some(e.clone()),
            FailOn::ListRepositories(e) if expected == "list_repositories" => Some(e.clone()),
            FailOn::ListRefs { repo_id, error } if expected == "list_refs" && scoped(repo_id) => {
                Some(error.clone())
            }
            FailOn::GetCommits { repo_id, error }
                if expected == "get_commits" && scoped(repo_id) =>
            {
                Some(error.clone())
            }
            FailOn::CompareCommits { repo_id, error }
                if expected == "compare_commits" && scoped(repo_id) =>
            {
                Some(error.clone())
            }
            FailOn::GetDiff { repo_id, error } if expected == "get_diff" && scoped(repo_id) => {
                Some(error.clone())
            }
            FailOn::GetCommitById { repo_id, error }
                if expected == "get_commit_by_id" && scoped(repo_id) =>
            {
                Some(error.clone())
            }
            FailOn::GetAnnotatedTag { repo_id, error }
                if expected == "get_annotated_tag" && scoped(repo_id) =>
            {
                Some(error.clone())
            }
            _ => None,
        })
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn test_connection(&self) -> Result<ApiVersion, ForgeError> {
        self.record(MockOperation::TestConnection);
        if let Some(e) = self.check_fail("test_connection", None) {
            return Err(e);
        }
        Ok(self.lock().api_version)
    }

    async fn discover_api_version(&self) -> Result<ApiVersion, ForgeError> {
        Ok(self.lock().api_version)
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, ForgeError> {
        self.record(MockOperation::ListRepositories);
        if let Some(e) = self.check_fail("list_repositories", None) {
            return Err(e);
        }
        Ok(self.lock().repositories.clone())
    }

    async fn list_refs(
        &self,
        repo_id: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<GitRef>, ForgeError> {
        self.record(MockOperation::ListRefs {
            repo_id: repo_id.to_string(),
            prefix: prefix.map(str::to_string),
        });
        if let Some(e) = self.check_fail("list_refs", Some(repo_id)) {
            return Err(e);
        }

        let inner = self.lock();
        let refs = inner
            .refs
            .get(repo_id)
            .map(|refs| {
                refs.iter()
                    .filter(|r| prefix.map_or(true, |p| r.name.starts_with(p)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(refs)
    }

    async fn get_commits(
        &self,
        repo_id: &str,
        criteria: &SearchCriteria,
        top: u32,
    ) -> Result<Vec<CommitInfo>, ForgeError> {
        self.record(MockOperation::GetCommits {
            repo_id: repo_id.to_string(),
            criteria: criteria.clone(),
            top,
        });
        if let Some(e) = self.check_fail("get_commits", Some(repo_id)) {
            return Err(e);
        }

        let Some(item) = &criteria.item_version else {
            return Ok(Vec::new());
        };
        let key = (repo_id.to_string(), item.version.clone());
        let inner = self.lock();
        let commits = match item.version_type {
            VersionType::Tag => inner.tag_commits.get(&key).cloned().unwrap_or_default(),
            VersionType::Commit | VersionType::Branch => {
                inner.commits.get(&key).cloned().into_iter().collect()
            }
        };
        Ok(commits.into_iter().take(top as usize).collect())
    }

    async fn compare_commits(
        &self,
        repo_id: &str,
        from_commit: &str,
        to_commit: &str,
        top: u32,
    ) -> Result<Vec<CommitInfo>, ForgeError> {
        self.record(MockOperation::CompareCommits {
            repo_id: repo_id.to_string(),
            from_commit: from_commit.to_string(),
            to_commit: to_commit.to_string(),
            top,
        });
        if let Some(e) = self.check_fail("compare_commits", Some(repo_id)) {
            return Err(e);
        }

        let key = (
            repo_id.to_string(),
            from_commit.to_string(),
            to_commit.to_string(),
        );
        let commits = self.lock().compares.get(&key).cloned().unwrap_or_default();
        Ok(commits.into_iter().take(top as usize).collect())
    }

    async fn get_diff(
        &self,
        repo_id: &str,
        base: &VersionDescriptor,
        target: &VersionDescriptor,
        top: u32,
        skip: u32,
    ) -> Result<DiffSummary, ForgeError> {
        self.record(MockOperation::GetDiff {
            repo_id: repo_id.to_string(),
            base: base.clone(),
            target: target.clone(),
            top,
            skip,
        });

        let latency = self.lock().latency;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        if let Some(e) = self.check_fail("get_diff", Some(repo_id)) {
            return Err(e);
        }

        let key = (
            repo_id.to_string(),
            base.version.clone(),
            target.version.clone(),
        );
        Ok(self.lock().diffs.get(&key).cloned().unwrap_or_default())
    }

    async fn get_commit_by_id(
        &self,
        repo_id: &str,
        commit_id: &str,
    ) -> Result<Option<CommitInfo>, ForgeError> {
        self.record(MockOperation::GetCommitById {
            repo_id: repo_id.to_string(),
            commit_id: commit_id.to_string(),
        });
        if let Some(e) = self.check_fail("get_commit_by_id", Some(repo_id)) {
            return Err(e);
        }

        let key = (repo_id.to_string(), commit_id.to_string());
        Ok(self.lock().commits.get(&key).cloned())
    }

    async fn get_annotated_tag(
        &self,
        repo_id: &str,
        object_id: &str,
    ) -> Result<Option<AnnotatedTag>, ForgeError> {
        self.record(MockOperation::GetAnnotatedTag {
            repo_id: repo_id.to_string(),
            object_id: object_id.to_string(),
        });
        if let Some(e) = self.check_fail("get_annotated_tag", Some(repo_id)) {
            return Err(e);
        }

        let key = (repo_id.to_string(), object_id.to_string());
        Ok(self.lock().annotated_tags.get(&key).cloned())
    }
}
