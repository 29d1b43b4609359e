//! engine::compare
//!
//! Runs a SOURCE vs TARGET comparison over a set of repositories.
//!
//! # Design
//!
//! Each repository is one unit of work: resolve SOURCE, resolve TARGET,
//! then diff. Units run through a bounded `buffered` stream so at most
//! `workers` repositories talk to the remote at once, and results come back
//! in input order regardless of completion order.
//!
//! # Cancellation
//!
//! A [`CancellationToken`] stops the run cooperatively. Repositories not yet
//! started are skipped and in-flight ones are abandoned at their next await
//! point. Reports already produced are kept.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::diff::diff_repository;
use super::resolver::resolve_to_ref;
use crate::core::types::{DiffReport, DiffStatus, RefSpec, Repository};
use crate::forge::Forge;

/// Repositories processed concurrently by default.
pub const DEFAULT_WORKERS: usize = 4;

/// A SOURCE vs TARGET comparison.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub source: RefSpec,
    pub target: RefSpec,
    /// Repositories processed concurrently (at least 1)
    pub workers: usize,
}

/// Result of a comparison run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonOutcome {
    /// Completed reports, in input order
    pub reports: Vec<DiffReport>,
    /// Names of repositories that produced no report
    pub skipped: Vec<String>,
    /// Whether the run was cancelled
    pub cancelled: bool,
}

/// Number of reports per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub aligned: usize,
    pub divergent: usize,
    pub error: usize,
}

impl ComparisonOutcome {
    /// Count reports by status.
    pub fn counts(&self) -> StatusCounts {
        self.reports
            .iter()
            .fold(StatusCounts::default(), |mut counts, report| {
                match report.status {
                    DiffStatus::Aligned => counts.aligned += 1,
                    DiffStatus::Divergent => counts.divergent += 1,
                    DiffStatus::Error => counts.error += 1,
                }
                counts
            })
    }

    /// Whether every completed repository is aligned.
    pub fn all_aligned(&self) -> bool {
        self.reports.iter().all(|r| r.status == DiffStatus::Aligned)
    }
}

impl Comparison {
    /// Create a comparison with the default worker count.
    pub fn new(source: RefSpec, target: RefSpec) -> Self {
        Self {
            source,
            target,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Set the number of concurrent workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Compare every repository; one report per repository, in input order.
    pub async fn run(&self, forge: &dyn Forge, repos: &[Repository]) -> Vec<DiffReport> {
        self.run_until_cancelled(forge, repos, &CancellationToken::new())
            .await
            .reports
    }

    /// Compare every repository until `cancel` fires.
    pub async fn run_until_cancelled(
        &self,
        forge: &dyn Forge,
        repos: &[Repository],
        cancel: &CancellationToken,
    ) -> ComparisonOutcome {
        info!(
            repositories = repos.len(),
            workers = self.workers.max(1),
            source = %self.source.value,
            target = %self.target.value,
            "starting comparison"
        );

        let results: Vec<Option<DiffReport>> = stream::iter(repos)
            .map(|repo| self.compare_unless_cancelled(forge, repo, cancel))
            .buffered(self.workers.max(1))
            .collect()
            .await;

        let mut outcome = ComparisonOutcome {
            cancelled: cancel.is_cancelled(),
            ..Default::default()
        };
        for (repo, result) in repos.iter().zip(results) {
            match result {
                Some(report) => outcome.reports.push(report),
                None => outcome
                    .skipped
                    .push(repo.key().unwrap_or(repo.name.as_str()).to_string()),
            }
        }

        if outcome.cancelled {
            info!(
                completed = outcome.reports.len(),
                skipped = outcome.skipped.len(),
                "comparison cancelled"
            );
        }
        outcome
    }

    /// Resolve both refs and diff one repository.
    pub async fn compare_repository(&self, forge: &dyn Forge, repo: &Repository) -> DiffReport {
        let Some(key) = repo.key() else {
            return diff_repository(forge, repo, None, None, self.source.kind, self.target.kind)
                .await;
        };

        let (source, target) = futures::join!(
            resolve_to_ref(forge, key, &self.source),
            resolve_to_ref(forge, key, &self.target),
        );
        diff_repository(
            forge,
            repo,
            Some(&source),
            Some(&target),
            self.source.kind,
            self.target.kind,
        )
        .await
    }

    async fn compare_unless_cancelled(
        &self,
        forge: &dyn Forge,
        repo: &Repository,
        cancel: &CancellationToken,
    ) -> Option<DiffReport> {
        if cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(repo = %repo.name, "abandoned");
                None
            }
            report = self.compare_repository(forge, repo) => Some(report),
        }
    }
}
