//! core::types
//!
//! Domain types shared by the resolver, the diff service and the CLI.
//!
//! # Types
//!
//! - [`Repository`] - A remote repository
//! - [`RefKind`] / [`RefSpec`] - A user-supplied environment definition
//! - [`ResolvedRef`] - Outcome of resolving a `RefSpec` in one repository
//! - [`DiffReport`] - Outcome of comparing SOURCE vs TARGET in one repository
//!
//! # Examples
//!
//! ```
//! use gitsnap::core::types::{RefKind, RefSpec, ResolvedRef};
//!
//! let spec = RefSpec::new(RefKind::TagPattern, "prod*");
//! assert_eq!(spec.value, "prod*");
//!
//! let failed = ResolvedRef::failed("Branch not found: develop", "develop");
//! assert!(failed.commit_id.is_none());
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Length of abbreviated commit ids shown to users.
pub const SHORT_SHA_LEN: usize = 7;

/// Abbreviate a commit id for display.
///
/// ```
/// use gitsnap::core::types::short_sha;
///
/// assert_eq!(short_sha("abcdef0123456789"), "abcdef0");
/// assert_eq!(short_sha("abc"), "abc");
/// ```
pub fn short_sha(id: &str) -> String {
    id.chars().take(SHORT_SHA_LEN).collect()
}

/// A remote Git repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository id (GUID)
    pub id: Option<String>,
    /// Repository name
    pub name: String,
    /// Id (GUID) of the owning project
    pub project_id: Option<String>,
    /// Default branch, e.g. `refs/heads/main`
    pub default_branch: Option<String>,
    /// Web URL of the repository
    pub web_url: Option<String>,
}

impl Repository {
    /// Create a repository with an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Key used to address the repository: its id, else its name.
    ///
    /// The service accepts either in endpoint paths. Returns `None` when
    /// both are missing.
    pub fn key(&self) -> Option<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| Some(self.name.as_str()).filter(|n| !n.is_empty()))
    }

    /// Whether `selector` names this repository (by id or name).
    pub fn matches(&self, selector: &str) -> bool {
        self.id.as_deref() == Some(selector) || self.name == selector
    }
}

/// How a reference value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// A branch name
    #[default]
    Branch,
    /// A shell-glob over tag names; the most recent match wins
    TagPattern,
    /// A commit SHA (at least 7 characters)
    Commit,
}

impl RefKind {
    /// Identifier used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Branch => "branch",
            RefKind::TagPattern => "tag_pattern",
            RefKind::Commit => "commit",
        }
    }
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "branch" => Ok(RefKind::Branch),
            "tag_pattern" | "tag" => Ok(RefKind::TagPattern),
            "commit" | "sha" => Ok(RefKind::Commit),
            _ => Err(format!(
                "invalid ref kind '{}', must be one of: branch, tag_pattern, commit",
                s
            )),
        }
    }
}

/// A user-supplied environment definition (SOURCE or TARGET).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefSpec {
    /// How to interpret `value`
    pub kind: RefKind,
    /// Branch name, tag glob, or commit SHA
    pub value: String,
}

impl RefSpec {
    /// Create a ref spec.
    pub fn new(kind: RefKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Outcome of resolving a [`RefSpec`] against one repository.
///
/// A non-null `error` always comes with a null `commit_id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolvedRef {
    /// Resolved commit id
    pub commit_id: Option<String>,
    /// Resolved name, or the raw input when nothing was resolved
    pub display_ref: String,
    /// Why resolution failed
    pub error: Option<String>,
}

impl ResolvedRef {
    /// A successful resolution.
    pub fn resolved(commit_id: impl Into<String>, display_ref: impl Into<String>) -> Self {
        Self {
            commit_id: Some(commit_id.into()),
            display_ref: display_ref.into(),
            error: None,
        }
    }

    /// A failed resolution; `raw_value` is kept for display.
    pub fn failed(error: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            commit_id: None,
            display_ref: raw_value.into(),
            error: Some(error.into()),
        }
    }

    /// Whether resolution succeeded.
    pub fn is_resolved(&self) -> bool {
        self.error.is_none() && self.commit_id.is_some()
    }
}

/// Alignment status of one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// SOURCE has nothing TARGET lacks
    Aligned,
    /// SOURCE is ahead of TARGET
    Divergent,
    /// Resolution or comparison failed
    #[default]
    Error,
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffStatus::Aligned => write!(f, "aligned"),
            DiffStatus::Divergent => write!(f, "divergent"),
            DiffStatus::Error => write!(f, "error"),
        }
    }
}

/// A commit listed in a report (SOURCE but not TARGET).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Abbreviated commit id
    pub short_id: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

/// Message, author and date of a resolved commit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitMeta {
    pub message: String,
    pub author: String,
    pub date: String,
}

/// Outcome of comparing SOURCE vs TARGET for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffReport {
    /// Repository id, or name when the id is unknown
    pub repo_id: Option<String>,
    pub repo_name: String,
    pub status: DiffStatus,
    /// Commits in SOURCE not in TARGET (same as `ahead_count`)
    pub commit_count: u64,
    /// Total changed files (true total, not the truncated list length)
    pub file_count: u64,
    pub ahead_count: u64,
    pub behind_count: u64,
    /// Changed file paths, capped
    pub files: Vec<String>,
    /// Commits in SOURCE not in TARGET, capped
    pub commits: Vec<CommitSummary>,
    /// Human-readable explanation of the status
    pub note: String,
    pub source_kind: RefKind,
    pub target_kind: RefKind,
    /// Display ref of SOURCE
    pub source_ref: String,
    /// Display ref of TARGET
    pub target_ref: String,
    /// Abbreviated SOURCE commit id
    pub source_commit: String,
    /// Abbreviated TARGET commit id
    pub target_commit: String,
    pub source_meta: CommitMeta,
    pub target_meta: CommitMeta,
}

impl DiffReport {
    /// A report in `error` status with the given note.
    pub fn error(repo_id: Option<String>, repo_name: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            repo_id,
            repo_name: repo_name.into(),
            status: DiffStatus::Error,
            note: note.into(),
            ..Default::default()
        }
    }
}
