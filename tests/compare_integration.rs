//! End-to-end comparison tests against MockForge.
//!
//! These tests drive the whole pipeline (resolve SOURCE and TARGET, diff,
//! collect reports) through the public engine API.

use std::collections::BTreeMap;

use gitsnap::core::types::{DiffStatus, RefKind, RefSpec, Repository};
use gitsnap::engine::{compute_diffs, resolve_for_repositories, resolve_ref, Comparison};
use gitsnap::forge::mock::{FailOn, MockForge, MockOperation};
use gitsnap::forge::{AnnotatedTag, CommitInfo, DiffSummary, FileChange, ForgeError};

const ALPHA_SOURCE: &str = "aaa1111000000000000000000000000000000000";
const ALPHA_TARGET: &str = "bbb2222000000000000000000000000000000000";

fn commit(id: &str, message: &str, date: &str) -> CommitInfo {
    CommitInfo {
        commit_id: id.to_string(),
        message: message.to_string(),
        author: "Ada".to_string(),
        date: Some(date.to_string()),
    }
}

fn branches(source: &str, target: &str) -> Comparison {
    Comparison::new(
        RefSpec::new(RefKind::Branch, source),
        RefSpec::new(RefKind::Branch, target),
    )
}

/// Alpha: develop is two commits and three files ahead of master.
fn alpha_forge() -> MockForge {
    MockForge::new()
        .with_branch("r-alpha", "develop", ALPHA_SOURCE)
        .with_branch("r-alpha", "master", ALPHA_TARGET)
        .with_diff(
            "r-alpha",
            ALPHA_TARGET,
            ALPHA_SOURCE,
            DiffSummary {
                change_counts: BTreeMap::from([("edit".to_string(), 2), ("add".to_string(), 1)]),
                changes: vec![
                    FileChange {
                        path: "/src/lib.rs".into(),
                        change_type: Some("edit".into()),
                    },
                    FileChange {
                        path: "/src/new.rs".into(),
                        change_type: Some("add".into()),
                    },
                    FileChange {
                        path: "/Cargo.toml".into(),
                        change_type: Some("edit".into()),
                    },
                ],
                ahead_count: 2,
                ..Default::default()
            },
        )
        .with_compare(
            "r-alpha",
            ALPHA_SOURCE,
            ALPHA_TARGET,
            vec![
                commit("ccc3333000", "Add new module", "2024-05-02T10:00:00Z"),
                commit(ALPHA_SOURCE, "Bump version", "2024-05-03T10:00:00Z"),
            ],
        )
        .with_commit("r-alpha", commit(ALPHA_SOURCE, "Bump version", "2024-05-03T10:00:00Z"))
        .with_commit("r-alpha", commit(ALPHA_TARGET, "Release 1.0", "2024-04-01T10:00:00Z"))
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn alpha_divergent_branches() {
        let forge = alpha_forge();
        let repos = vec![Repository::new("r-alpha", "Alpha")];

        let reports = branches("develop", "master").run(&forge, &repos).await;
        let report = &reports[0];

        assert_eq!(report.status, DiffStatus::Divergent);
        assert_eq!(report.commit_count, 2);
        assert_eq!(report.file_count, 3);
        assert!(report.note.contains('2'));
        assert!(report.note.contains('3'));
        assert_eq!(report.source_ref, "develop");
        assert_eq!(report.target_ref, "master");
        assert_eq!(report.source_commit, "aaa1111");
        assert_eq!(report.target_commit, "bbb2222");
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.commits.len(), 2);
        assert_eq!(report.commits[0].short_id, "ccc3333");
        assert_eq!(report.source_meta.message, "Bump version");
        assert_eq!(report.target_meta.message, "Release 1.0");
    }

    #[tokio::test]
    async fn beta_latest_tag_wins() {
        let forge = MockForge::new()
            .with_tag("r-beta", "prod-1", "t1")
            .with_tag("r-beta", "prod-2", "t2")
            .with_tag("r-beta", "staging-9", "t9")
            .with_tag_commit("r-beta", "prod-1", commit("c1", "one", "2024-01-01T00:00:00Z"))
            .with_tag_commit("r-beta", "prod-2", commit("c2", "two", "2024-02-01T00:00:00Z"))
            .with_tag_commit("r-beta", "staging-9", commit("c9", "nine", "2024-03-01T00:00:00Z"));

        let spec = RefSpec::new(RefKind::TagPattern, "prod*");
        let resolution = resolve_ref(&forge, "r-beta", &spec).await.unwrap();

        assert_eq!(resolution.display_ref, "prod-2");
        assert_eq!(resolution.commit_id, "c2");
    }

    #[tokio::test]
    async fn beta_annotated_and_lightweight_tags() {
        // prod-1 is annotated and newest; prod-2 is lightweight and undated.
        let forge = MockForge::new()
            .with_tag("r-beta", "prod-1", "tag-object-1")
            .with_tag("r-beta", "prod-2", "c2")
            .with_annotated_tag(
                "r-beta",
                AnnotatedTag {
                    name: "prod-1".into(),
                    object_id: "tag-object-1".into(),
                    tagged_object_id: Some("c1".into()),
                    date: Some("2024-06-01T00:00:00Z".into()),
                    ..Default::default()
                },
            );

        let spec = RefSpec::new(RefKind::TagPattern, "prod-*");
        let resolution = resolve_ref(&forge, "r-beta", &spec).await.unwrap();

        assert_eq!(resolution.display_ref, "prod-1");
        assert_eq!(resolution.commit_id, "c1");
    }

    #[tokio::test]
    async fn gamma_empty_target() {
        let forge = MockForge::new().with_branch("r-gamma", "develop", ALPHA_SOURCE);
        let repos = vec![Repository::new("r-gamma", "Gamma")];

        let comparison = Comparison::new(
            RefSpec::new(RefKind::Branch, "develop"),
            RefSpec::new(RefKind::Branch, ""),
        );
        let reports = comparison.run(&forge, &repos).await;

        assert_eq!(reports[0].status, DiffStatus::Error);
        assert_eq!(reports[0].note, "TARGET: Ref value is empty.");
    }

    #[tokio::test]
    async fn delta_short_sha() {
        let forge = MockForge::new();
        let spec = RefSpec::new(RefKind::Commit, "abc12");

        let err = resolve_ref(&forge, "r-delta", &spec).await.unwrap_err();
        assert_eq!(err.to_string(), "Commit SHA too short.");
    }
}

mod properties {
    use super::*;

    #[tokio::test]
    async fn one_report_per_repository_in_order() {
        let forge = alpha_forge()
            .with_branch("r2", "develop", "same000")
            .with_branch("r2", "master", "same000")
            .fail_on(FailOn::ListRefs {
                repo_id: Some("r3".into()),
                error: ForgeError::NetworkError("connection reset".into()),
            });
        let repos = vec![
            Repository::new("r3", "zeta"),
            Repository::new("r-alpha", "Alpha"),
            Repository::new("r4", "missing"),
            Repository::new("r2", "beta"),
        ];

        let reports = branches("develop", "master")
            .with_workers(3)
            .run(&forge, &repos)
            .await;

        let names: Vec<_> = reports.iter().map(|r| r.repo_name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "Alpha", "missing", "beta"]);
        assert_eq!(reports[0].status, DiffStatus::Error);
        assert!(reports[0].note.starts_with("SOURCE: "));
        assert!(reports[0].note.contains("connection reset"));
        assert_eq!(reports[1].status, DiffStatus::Divergent);
        assert_eq!(reports[2].status, DiffStatus::Error);
        assert_eq!(reports[3].status, DiffStatus::Aligned);
    }

    #[tokio::test]
    async fn same_commit_is_aligned_for_any_kind() {
        let forge = MockForge::new()
            .with_branch("r1", "develop", ALPHA_SOURCE)
            .with_tag("r1", "prod-1", "t1")
            .with_tag_commit("r1", "prod-1", commit(ALPHA_SOURCE, "x", "2024-01-01T00:00:00Z"));
        let repos = vec![Repository::new("r1", "alpha")];

        let comparison = Comparison::new(
            RefSpec::new(RefKind::TagPattern, "prod-*"),
            RefSpec::new(RefKind::Commit, ALPHA_SOURCE),
        );
        let reports = comparison.run(&forge, &repos).await;

        assert_eq!(reports[0].status, DiffStatus::Aligned);
        assert_eq!(reports[0].ahead_count, 0);
        assert_eq!(reports[0].behind_count, 0);
        assert!(!forge
            .operations()
            .iter()
            .any(|op| matches!(op, MockOperation::GetDiff { .. })));
    }

    #[tokio::test]
    async fn resolution_error_never_diffs() {
        let forge = MockForge::new().with_branch("r1", "master", ALPHA_TARGET);
        let repos = vec![Repository::new("r1", "alpha")];

        let reports = branches("develop", "master").run(&forge, &repos).await;

        assert_eq!(reports[0].status, DiffStatus::Error);
        assert_eq!(reports[0].note, "SOURCE: Branch not found: develop");
        assert!(!forge
            .operations()
            .iter()
            .any(|op| matches!(op, MockOperation::GetDiff { .. })));
    }

    #[tokio::test]
    async fn branch_matched_by_suffix() {
        let forge = MockForge::new()
            .with_branch("r1", "team/develop", "abc1234")
            .with_branch("r1", "master", "abc1234");
        let spec = RefSpec::new(RefKind::Branch, "develop");

        let resolution = resolve_ref(&forge, "r1", &spec).await.unwrap();
        assert_eq!(resolution.commit_id, "abc1234");
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let forge = alpha_forge();
        let repos = vec![Repository::new("r-alpha", "Alpha"), Repository::new("r9", "empty")];
        let comparison = branches("develop", "master");

        let first = comparison.run(&forge, &repos).await;
        let second = comparison.run(&forge, &repos).await;

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn not_found_diff_note() {
        let forge = alpha_forge().fail_on(FailOn::GetDiff {
            repo_id: Some("r-alpha".into()),
            error: ForgeError::NotFound("TF401019".into()),
        });
        let repos = vec![Repository::new("r-alpha", "Alpha")];

        let reports = branches("develop", "master").run(&forge, &repos).await;
        assert_eq!(reports[0].status, DiffStatus::Error);
        assert_eq!(reports[0].note, "ref not found or repository inaccessible");
    }
}

mod batch {
    use super::*;

    #[tokio::test]
    async fn resolve_then_diff_in_two_passes() {
        let forge = alpha_forge();
        let repos = vec![Repository::new("r-alpha", "Alpha")];
        let source = RefSpec::new(RefKind::Branch, "develop");
        let target = RefSpec::new(RefKind::Branch, "master");

        let source_refs = resolve_for_repositories(&forge, &repos, &source).await;
        let target_refs = resolve_for_repositories(&forge, &repos, &target).await;
        assert!(source_refs["r-alpha"].is_resolved());

        let reports = compute_diffs(
            &forge,
            &repos,
            &source_refs,
            &target_refs,
            source.kind,
            target.kind,
        )
        .await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, DiffStatus::Divergent);
    }

    #[tokio::test]
    async fn repository_without_id_or_name() {
        let forge = MockForge::new();
        let repos = vec![Repository::default()];

        let reports = branches("develop", "master").run(&forge, &repos).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].note, "repository has no id");
        assert!(forge.operations().is_empty());
    }
}
