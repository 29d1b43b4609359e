//! engine::resolver
//!
//! Turns a [`RefSpec`] into a concrete commit for one repository.
//!
//! # Algorithm
//!
//! - **Commit**: the value itself, if it is at least [`SHORT_SHA_LEN`]
//!   characters long. No remote call.
//! - **Branch**: list `refs/heads/` refs and match the value against the
//!   short names in three tiers: exact, case-insensitive, then full ref name
//!   ending in `/<value>`.
//! - **Tag pattern**: list `refs/tags/` refs, keep the names matching the
//!   shell glob, resolve each to a commit and pick the most recently dated.
//!
//! Errors stay per repository: the batch entry point converts every failure
//! into a [`ResolvedRef`] carrying the message, so one bad repository never
//! stops the others.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use glob::{MatchOptions, Pattern};
use thiserror::Error;
use tracing::debug;

use super::compare::DEFAULT_WORKERS;
use crate::core::types::{short_sha, RefKind, RefSpec, Repository, ResolvedRef, SHORT_SHA_LEN};
use crate::forge::{Forge, ForgeError, GitRef, SearchCriteria, VersionDescriptor, BRANCH_PREFIX, TAG_PREFIX};

/// Tag lookups issued concurrently while resolving one pattern.
const TAG_LOOKUP_CONCURRENCY: usize = 4;

/// Reasons a reference could not be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Ref value is empty.")]
    EmptyValue,

    #[error("Commit SHA too short.")]
    ShaTooShort,

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("No tags matching pattern: {0}")]
    NoMatchingTags(String),

    #[error("No resolvable tags for pattern: {0}")]
    NoResolvableTags(String),

    #[error("Invalid tag pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Transport failure while listing refs.
    #[error("{0}")]
    Forge(#[from] ForgeError),
}

/// A successfully resolved reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub commit_id: String,
    pub display_ref: String,
}

impl From<Resolution> for ResolvedRef {
    fn from(r: Resolution) -> Self {
        ResolvedRef::resolved(r.commit_id, r.display_ref)
    }
}

/// A tag matching a pattern, resolved to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCandidate {
    /// Short tag name (without `refs/tags/`)
    pub name: String,
    pub commit_id: String,
    /// Commit or tagger date; `None` sorts last
    pub date: Option<DateTime<Utc>>,
}

/// Resolve one reference in one repository.
pub async fn resolve_ref(
    forge: &dyn Forge,
    repo_id: &str,
    spec: &RefSpec,
) -> Result<Resolution, ResolveError> {
    let value = spec.value.trim();
    if value.is_empty() {
        return Err(ResolveError::EmptyValue);
    }

    match spec.kind {
        RefKind::Commit => resolve_commit(value),
        RefKind::Branch => resolve_branch(forge, repo_id, value).await,
        RefKind::TagPattern => resolve_tag_pattern(forge, repo_id, value).await,
    }
}

/// Resolve one reference, folding any error into the returned value.
pub async fn resolve_to_ref(forge: &dyn Forge, repo_id: &str, spec: &RefSpec) -> ResolvedRef {
    match resolve_ref(forge, repo_id, spec).await {
        Ok(resolution) => {
            debug!(
                repo_id,
                kind = %spec.kind,
                display_ref = %resolution.display_ref,
                commit = %short_sha(&resolution.commit_id),
                "resolved ref"
            );
            resolution.into()
        }
        Err(e) => {
            debug!(repo_id, kind = %spec.kind, error = %e, "ref resolution failed");
            ResolvedRef::failed(e.to_string(), spec.value.trim())
        }
    }
}

/// Resolve `spec` in every repository.
///
/// The map is keyed by repository id, falling back to the name.
/// Repositories with neither are left out.
pub async fn resolve_for_repositories(
    forge: &dyn Forge,
    repos: &[Repository],
    spec: &RefSpec,
) -> HashMap<String, ResolvedRef> {
    stream::iter(repos.iter().filter_map(Repository::key))
        .map(|key| async move { (key.to_string(), resolve_to_ref(forge, key, spec).await) })
        .buffer_unordered(DEFAULT_WORKERS)
        .collect::<HashMap<_, _>>()
        .await
}

/// A raw commit id; only its length is checked.
pub fn resolve_commit(value: &str) -> Result<Resolution, ResolveError> {
    if value.chars().count() < SHORT_SHA_LEN {
        return Err(ResolveError::ShaTooShort);
    }
    Ok(Resolution {
        commit_id: value.to_string(),
        display_ref: short_sha(value),
    })
}

/// Short branch name for a listed ref, or `None` for tags.
///
/// ```
/// use gitsnap::engine::resolver::branch_short_name;
///
/// assert_eq!(branch_short_name("refs/heads/develop"), Some("develop"));
/// assert_eq!(branch_short_name("heads/main"), Some("main"));
/// assert_eq!(branch_short_name("CR-Luglio"), Some("CR-Luglio"));
/// assert_eq!(branch_short_name("refs/tags/v1"), None);
/// ```
pub fn branch_short_name(full_name: &str) -> Option<&str> {
    let name = full_name.trim();
    if name.is_empty() || name.starts_with(TAG_PREFIX) {
        return None;
    }
    name.strip_prefix(BRANCH_PREFIX)
        .or_else(|| name.strip_prefix("heads/"))
        .or(Some(name))
}

/// Match `value` against listed branch refs.
///
/// Tiers are tried in order: exact short name, case-insensitive short name,
/// full name ending in `/<value>`. Refs without an object id never match.
pub fn select_branch(refs: &[GitRef], value: &str) -> Option<Resolution> {
    let candidates: Vec<(&str, &str, &str)> = refs
        .iter()
        .filter_map(|r| {
            let short = branch_short_name(&r.name)?;
            let object_id = r.object_id.as_deref().filter(|id| !id.is_empty())?;
            Some((r.name.as_str(), short, object_id))
        })
        .collect();

    let lowered = value.to_lowercase();
    let suffix = format!("/{value}");

    candidates
        .iter()
        .find(|(_, short, _)| *short == value)
        .or_else(|| {
            candidates
                .iter()
                .find(|(_, short, _)| short.to_lowercase() == lowered)
        })
        .or_else(|| candidates.iter().find(|(full, _, _)| full.ends_with(&suffix)))
        .map(|(_, short, object_id)| Resolution {
            commit_id: object_id.to_string(),
            display_ref: short.to_string(),
        })
}

async fn resolve_branch(
    forge: &dyn Forge,
    repo_id: &str,
    value: &str,
) -> Result<Resolution, ResolveError> {
    let refs = forge.list_refs(repo_id, Some(BRANCH_PREFIX)).await?;
    select_branch(&refs, value).ok_or_else(|| {
        debug!(
            repo_id,
            branch = value,
            available = refs.len(),
            "branch not found"
        );
        ResolveError::BranchNotFound(value.to_string())
    })
}

/// Compile a tag glob (`*`, `?`, `[...]`).
pub fn compile_pattern(pattern: &str) -> Result<Pattern, ResolveError> {
    Pattern::new(pattern).map_err(|e| ResolveError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })
}

/// A listed tag whose short name matched a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedTag {
    /// Short tag name (without `refs/tags/`)
    pub name: String,
    pub object_id: Option<String>,
    pub peeled_object_id: Option<String>,
}

/// Tags whose short name matches `pattern`, in listing order.
pub fn match_tags(refs: &[GitRef], pattern: &Pattern) -> Vec<MatchedTag> {
    let options = MatchOptions::new();
    refs.iter()
        .filter_map(|r| {
            let name = r.name.trim().strip_prefix(TAG_PREFIX)?;
            if !pattern.matches_with(name, options) {
                return None;
            }
            Some(MatchedTag {
                name: name.to_string(),
                object_id: r.object_id.clone().filter(|id| !id.is_empty()),
                peeled_object_id: r.peeled_object_id.clone().filter(|id| !id.is_empty()),
            })
        })
        .collect()
}

/// Parse an ISO 8601 / RFC 3339 timestamp.
pub fn parse_date(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Pick the most recently dated candidate.
///
/// Undated candidates sort after dated ones; ties keep input order.
pub fn select_latest_tag(mut candidates: Vec<TagCandidate>) -> Option<TagCandidate> {
    candidates.sort_by(|a, b| b.date.cmp(&a.date));
    candidates.into_iter().next()
}

async fn resolve_tag_pattern(
    forge: &dyn Forge,
    repo_id: &str,
    pattern: &str,
) -> Result<Resolution, ResolveError> {
    let compiled = compile_pattern(pattern)?;
    let refs = forge.list_refs(repo_id, Some(TAG_PREFIX)).await?;

    let matching = match_tags(&refs, &compiled);
    if matching.is_empty() {
        return Err(ResolveError::NoMatchingTags(pattern.to_string()));
    }
    debug!(repo_id, pattern, matches = matching.len(), "tags matching pattern");

    let lookups = matching.into_iter().filter(|tag| tag.object_id.is_some());
    let candidates: Vec<TagCandidate> = stream::iter(lookups)
        .map(|tag| async move { resolve_tag(forge, repo_id, tag).await })
        .buffered(TAG_LOOKUP_CONCURRENCY)
        .collect()
        .await;

    select_latest_tag(candidates)
        .map(|tag| Resolution {
            commit_id: tag.commit_id,
            display_ref: tag.name,
        })
        .ok_or_else(|| ResolveError::NoResolvableTags(pattern.to_string()))
}

/// Resolve one tag to its commit.
///
/// Tries the commit history at the tag first, then annotated tag metadata.
/// A peeled id from the listing is the commit of an annotated tag; without
/// one the ref's object is taken as the commit of a lightweight tag.
async fn resolve_tag(forge: &dyn Forge, repo_id: &str, tag: MatchedTag) -> TagCandidate {
    let MatchedTag {
        name,
        object_id,
        peeled_object_id: peeled,
    } = tag;
    let object_id = object_id.unwrap_or_default();

    let criteria = SearchCriteria::at(VersionDescriptor::tag(name.as_str()));
    match forge.get_commits(repo_id, &criteria, 1).await {
        Ok(commits) => {
            if let Some(commit) = commits.into_iter().next() {
                return TagCandidate {
                    date: parse_date(commit.date.as_deref()),
                    commit_id: commit.commit_id,
                    name,
                };
            }
        }
        Err(e) => debug!(repo_id, tag = %name, error = %e, "commit lookup at tag failed"),
    }

    match forge.get_annotated_tag(repo_id, &object_id).await {
        Ok(Some(annotated)) => {
            let target = peeled
                .clone()
                .or(annotated.tagged_object_id.filter(|id| !id.is_empty()));
            if let Some(commit_id) = target {
                return TagCandidate {
                    name,
                    commit_id,
                    date: parse_date(annotated.date.as_deref()),
                };
            }
        }
        Ok(None) => {}
        Err(e) => debug!(repo_id, tag = %name, error = %e, "annotated tag lookup failed"),
    }

    TagCandidate {
        name,
        commit_id: peeled.unwrap_or(object_id),
        date: None,
    }
}
