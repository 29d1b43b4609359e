//! engine::diff
//!
//! Compares resolved SOURCE and TARGET commits for each repository and
//! classifies the result.
//!
//! # Direction
//!
//! The diff endpoint is called with base = TARGET and target = SOURCE, so
//! the ahead count and the changed files describe what SOURCE has that
//! TARGET does not.
//!
//! # Failure policy
//!
//! A repository never aborts the batch. Resolution failures and diff
//! failures become an `error` report with a note; failures while listing
//! commits or fetching commit metadata only leave those fields empty.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tracing::debug;

use super::compare::DEFAULT_WORKERS;
use crate::core::types::{
    short_sha, CommitMeta, CommitSummary, DiffReport, DiffStatus, RefKind, Repository,
    ResolvedRef,
};
use crate::forge::{CommitInfo, DiffSummary, Forge, ForgeError, VersionDescriptor};

/// Changed files listed per report.
pub const MAX_FILES_DISPLAY: usize = 100;

/// Commits listed per report.
pub const MAX_COMMITS_DISPLAY: usize = 20;

/// Note for a repository that resolved to the same commit on both sides.
pub const NOTE_SAME_COMMIT: &str = "same commit";

/// Note for a repository the service reports no difference for.
pub const NOTE_NO_DIFFERENCES: &str = "no differences";

/// Note for a transport "not found" during the comparison.
pub const NOTE_NOT_FOUND: &str = "ref not found or repository inaccessible";

/// Diff every repository, preserving input order.
///
/// `source_resolved` and `target_resolved` are keyed like
/// [`Repository::key`]; a missing entry is reported as unresolved.
pub async fn compute_diffs(
    forge: &dyn Forge,
    repos: &[Repository],
    source_resolved: &HashMap<String, ResolvedRef>,
    target_resolved: &HashMap<String, ResolvedRef>,
    source_kind: RefKind,
    target_kind: RefKind,
) -> Vec<DiffReport> {
    stream::iter(repos)
        .map(|repo| {
            let key = repo.key();
            let source = key.and_then(|k| source_resolved.get(k));
            let target = key.and_then(|k| target_resolved.get(k));
            diff_repository(forge, repo, source, target, source_kind, target_kind)
        })
        .buffered(DEFAULT_WORKERS)
        .collect::<Vec<_>>()
        .await
}

/// Compare one repository.
pub async fn diff_repository(
    forge: &dyn Forge,
    repo: &Repository,
    source: Option<&ResolvedRef>,
    target: Option<&ResolvedRef>,
    source_kind: RefKind,
    target_kind: RefKind,
) -> DiffReport {
    let Some(repo_id) = repo.key() else {
        return DiffReport {
            source_kind,
            target_kind,
            ..DiffReport::error(None, repo.name.clone(), "repository has no id")
        };
    };

    let source_commit = source.and_then(|r| r.commit_id.as_deref());
    let target_commit = target.and_then(|r| r.commit_id.as_deref());

    let mut report = DiffReport {
        repo_id: Some(repo_id.to_string()),
        repo_name: if repo.name.is_empty() {
            repo_id.to_string()
        } else {
            repo.name.clone()
        },
        status: DiffStatus::Error,
        source_kind,
        target_kind,
        source_ref: display_ref(source),
        target_ref: display_ref(target),
        source_commit: source_commit.map(short_sha).unwrap_or_default(),
        target_commit: target_commit.map(short_sha).unwrap_or_default(),
        ..Default::default()
    };

    if let Some(error) = source.and_then(|r| r.error.as_deref()) {
        report.note = format!("SOURCE: {error}");
        return report;
    }
    if let Some(error) = target.and_then(|r| r.error.as_deref()) {
        report.note = format!("TARGET: {error}");
        return report;
    }
    let (Some(source_commit), Some(target_commit)) = (source_commit, target_commit) else {
        report.note = "ref not resolved".to_string();
        return report;
    };

    if source_commit == target_commit {
        report.status = DiffStatus::Aligned;
        report.note = NOTE_SAME_COMMIT.to_string();
        return report;
    }

    let diff = match forge
        .get_diff(
            repo_id,
            &VersionDescriptor::commit(target_commit),
            &VersionDescriptor::commit(source_commit),
            MAX_FILES_DISPLAY as u32,
            0,
        )
        .await
    {
        Ok(diff) => diff,
        Err(e) => {
            debug!(repo = %report.repo_name, error = %e, "diff failed");
            report.note = failure_note(&e);
            return report;
        }
    };

    apply_diff(&mut report, &diff);

    if report.ahead_count > 0 {
        report.commits = commits_ahead(forge, repo_id, source_commit, target_commit).await;
    }

    let (source_meta, target_meta) = futures::join!(
        commit_meta(forge, repo_id, source_commit),
        commit_meta(forge, repo_id, target_commit),
    );
    report.source_meta = source_meta;
    report.target_meta = target_meta;

    debug!(
        repo = %report.repo_name,
        status = %report.status,
        ahead = report.ahead_count,
        files = report.file_count,
        "diff computed"
    );
    report
}

/// Copy counts, files and the classification from a diff into a report.
pub fn apply_diff(report: &mut DiffReport, diff: &DiffSummary) {
    let (status, note) = classify(diff);
    report.status = status;
    report.note = note;
    report.file_count = diff.total_changes();
    report.ahead_count = diff.ahead_count;
    report.behind_count = diff.behind_count;
    report.commit_count = diff.ahead_count;
    report.files = diff
        .changes
        .iter()
        .take(MAX_FILES_DISPLAY)
        .map(|c| c.path.clone())
        .collect();
}

/// Status and note for a diff between two distinct commits.
///
/// ```
/// use std::collections::BTreeMap;
/// use gitsnap::core::types::DiffStatus;
/// use gitsnap::engine::diff::classify;
/// use gitsnap::forge::DiffSummary;
///
/// let diff = DiffSummary {
///     change_counts: BTreeMap::from([("edit".to_string(), 3)]),
///     ahead_count: 2,
///     ..Default::default()
/// };
/// let (status, note) = classify(&diff);
/// assert_eq!(status, DiffStatus::Divergent);
/// assert_eq!(note, "2 commits ahead, 3 files changed");
/// ```
pub fn classify(diff: &DiffSummary) -> (DiffStatus, String) {
    let files = diff.total_changes();
    if files == 0 && diff.ahead_count == 0 {
        (DiffStatus::Aligned, NOTE_NO_DIFFERENCES.to_string())
    } else {
        (
            DiffStatus::Divergent,
            format!("{} commits ahead, {} files changed", diff.ahead_count, files),
        )
    }
}

/// Note for a failed comparison.
pub fn failure_note(error: &ForgeError) -> String {
    match error {
        ForgeError::NotFound(_) => NOTE_NOT_FOUND.to_string(),
        other => other.to_string(),
    }
}

fn display_ref(resolved: Option<&ResolvedRef>) -> String {
    match resolved {
        Some(r) if !r.display_ref.is_empty() => r.display_ref.clone(),
        Some(r) => r.commit_id.as_deref().map(short_sha).unwrap_or_default(),
        None => String::new(),
    }
}

impl From<CommitInfo> for CommitSummary {
    fn from(c: CommitInfo) -> Self {
        CommitSummary {
            short_id: short_sha(&c.commit_id),
            message: c.message,
            author: c.author,
            date: c.date.unwrap_or_default(),
        }
    }
}

impl From<CommitInfo> for CommitMeta {
    fn from(c: CommitInfo) -> Self {
        CommitMeta {
            message: c.message,
            author: c.author,
            date: c.date.unwrap_or_default(),
        }
    }
}

/// Commits in SOURCE but not in TARGET, capped; empty on failure.
async fn commits_ahead(
    forge: &dyn Forge,
    repo_id: &str,
    source_commit: &str,
    target_commit: &str,
) -> Vec<CommitSummary> {
    match forge
        .compare_commits(
            repo_id,
            source_commit,
            target_commit,
            MAX_COMMITS_DISPLAY as u32,
        )
        .await
    {
        Ok(commits) => commits
            .into_iter()
            .take(MAX_COMMITS_DISPLAY)
            .map(CommitSummary::from)
            .collect(),
        Err(e) => {
            debug!(repo_id, error = %e, "commit list unavailable");
            Vec::new()
        }
    }
}

/// Message, author and date of one commit; empty on failure.
async fn commit_meta(forge: &dyn Forge, repo_id: &str, commit_id: &str) -> CommitMeta {
    match forge.get_commit_by_id(repo_id, commit_id).await {
        Ok(Some(commit)) => commit.into(),
        Ok(None) => CommitMeta::default(),
        Err(e) => {
            debug!(repo_id, commit = %short_sha(commit_id), error = %e, "commit metadata unavailable");
            CommitMeta::default()
        }
    }
}
