//! engine
//!
//! Resolves references and compares them across repositories.
//!
//! # Architecture
//!
//! ```text
//! repositories -> resolver (SOURCE, TARGET) -> diff -> reports
//! ```
//!
//! - [`resolver`]: branch / tag pattern / commit to a concrete commit
//! - [`diff`]: SOURCE vs TARGET classification per repository
//! - [`compare`]: bounded, ordered, cancellable run over many repositories
//!
//! Everything here talks to the remote only through `&dyn Forge`, so the
//! whole pipeline runs unchanged against the in-memory mock.
//!
//! # Invariants
//!
//! - Exactly one report per input repository, in input order
//! - A repository whose SOURCE or TARGET failed to resolve is never diffed
//! - One repository's failure never aborts the others
//!
//! # Example
//!
//! ```
//! use gitsnap::core::types::{DiffStatus, RefKind, RefSpec, Repository};
//! use gitsnap::engine::Comparison;
//! use gitsnap::forge::mock::MockForge;
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new()
//!     .with_branch("r1", "develop", "aaa1111ffff")
//!     .with_branch("r1", "master", "aaa1111ffff");
//! let repos = vec![Repository::new("r1", "alpha")];
//!
//! let comparison = Comparison::new(
//!     RefSpec::new(RefKind::Branch, "develop"),
//!     RefSpec::new(RefKind::Branch, "master"),
//! );
//! let reports = comparison.run(&forge, &repos).await;
//! assert_eq!(reports[0].status, DiffStatus::Aligned);
//! # });
//! ```

pub mod compare;
pub mod diff;
pub mod resolver;

pub use compare::{Comparison, ComparisonOutcome, StatusCounts, DEFAULT_WORKERS};
pub use diff::{compute_diffs, diff_repository, MAX_COMMITS_DISPLAY, MAX_FILES_DISPLAY};
pub use resolver::{resolve_for_repositories, resolve_ref, ResolveError, Resolution};
