//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON.
//! Rendering functions return strings so they can be tested without
//! capturing stdout.

use std::fmt::Display;

use reqwest::Url;
use serde::Serialize;

use crate::core::types::{DiffReport, DiffStatus, RefKind, RefSpec, Repository};
use crate::engine::{ComparisonOutcome, StatusCounts};
use crate::forge::azure::DEFAULT_BASE_URL;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format rows as left-aligned columns separated by two spaces.
fn format_columns(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    rows.iter()
        .map(|row| {
            let line = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                .collect::<Vec<_>>()
                .join("  ");
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Repository listing: name, id and default branch.
pub fn render_repositories(repos: &[Repository]) -> String {
    let mut rows = vec![vec![
        "NAME".to_string(),
        "ID".to_string(),
        "DEFAULT BRANCH".to_string(),
    ]];
    rows.extend(repos.iter().map(|r| {
        vec![
            r.name.clone(),
            r.id.clone().unwrap_or_default(),
            r.default_branch
                .as_deref()
                .map(|b| b.trim_start_matches("refs/heads/").to_string())
                .unwrap_or_default(),
        ]
    }));
    format_columns(&rows)
}

/// Summary table, one row per report.
pub fn render_table(reports: &[DiffReport]) -> String {
    let mut rows = vec![vec![
        "REPO".to_string(),
        "STATUS".to_string(),
        "COMMITS".to_string(),
        "FILES".to_string(),
        "SOURCE".to_string(),
        "TARGET".to_string(),
        "NOTE".to_string(),
    ]];
    rows.extend(reports.iter().map(|r| {
        vec![
            r.repo_name.clone(),
            r.status.to_string(),
            r.commit_count.to_string(),
            r.file_count.to_string(),
            with_commit(&r.source_ref, &r.source_commit),
            with_commit(&r.target_ref, &r.target_commit),
            r.note.clone(),
        ]
    }));
    format_columns(&rows)
}

fn with_commit(display_ref: &str, short_id: &str) -> String {
    if short_id.is_empty() || display_ref == short_id {
        display_ref.to_string()
    } else {
        format!("{display_ref} ({short_id})")
    }
}

/// Detailed view of one report: commit metadata, commits and files.
pub fn render_details(report: &DiffReport) -> String {
    let mut out = vec![format!("{} [{}]", report.repo_name, report.status)];
    for (label, display_ref, short_id, meta) in [
        ("SOURCE", &report.source_ref, &report.source_commit, &report.source_meta),
        ("TARGET", &report.target_ref, &report.target_commit, &report.target_meta),
    ] {
        let mut line = format!("  {label}: {}", with_commit(display_ref, short_id));
        if !meta.message.is_empty() {
            let subject = meta.message.lines().next().unwrap_or_default();
            line.push_str(&format!(" {subject}"));
        }
        if !meta.author.is_empty() {
            line.push_str(&format!(" ({}, {})", meta.author, meta.date));
        }
        out.push(line);
    }
    out.push(format!(
        "  ahead {}, behind {}, {} files changed",
        report.ahead_count, report.behind_count, report.file_count
    ));

    if !report.commits.is_empty() {
        out.push("  Commits:".to_string());
        let lines: Vec<String> = report
            .commits
            .iter()
            .map(|c| {
                let subject = c.message.lines().next().unwrap_or_default();
                format!("{} {} ({})", c.short_id, subject, c.author)
            })
            .collect();
        out.push(format_list(&lines, "    "));
    }

    if !report.files.is_empty() {
        out.push("  Files:".to_string());
        out.push(format_list(&report.files, "    "));
        let listed = report.files.len() as u64;
        if report.file_count > listed {
            out.push(format!("    ... and {} more", report.file_count - listed));
        }
    }

    out.join("\n")
}

/// One-line summary of status counts.
pub fn render_summary(counts: &StatusCounts, skipped: usize) -> String {
    let mut line = format!(
        "{} aligned, {} divergent, {} error",
        counts.aligned, counts.divergent, counts.error
    );
    if skipped > 0 {
        line.push_str(&format!(", {} skipped (cancelled)", skipped));
    }
    line
}

/// Whether a report is shown under `--hide-aligned`.
pub fn is_noteworthy(report: &DiffReport) -> bool {
    report.status != DiffStatus::Aligned
}

/// Machine-readable comparison output.
#[derive(Debug, Serialize)]
pub struct JsonOutput<'a> {
    pub source: &'a RefSpec,
    pub target: &'a RefSpec,
    pub summary: &'a StatusCounts,
    pub reports: Vec<&'a DiffReport>,
    pub skipped: &'a [String],
    pub cancelled: bool,
}

/// Render a comparison as pretty-printed JSON.
pub fn render_json(
    source: &RefSpec,
    target: &RefSpec,
    outcome: &ComparisonOutcome,
    reports: Vec<&DiffReport>,
) -> Result<String, serde_json::Error> {
    let summary = outcome.counts();
    serde_json::to_string_pretty(&JsonOutput {
        source,
        target,
        summary: &summary,
        reports,
        skipped: &outcome.skipped,
        cancelled: outcome.cancelled,
    })
}

/// Web version string for a ref (`GB` branch, `GT` tag, `GC` commit).
fn web_version(kind: RefKind, display_ref: &str) -> String {
    let prefix = match kind {
        RefKind::Branch => "GB",
        RefKind::TagPattern => "GT",
        RefKind::Commit => "GC",
    };
    format!("{prefix}{display_ref}")
}

/// Link to the web compare page for a report.
///
/// Returns `None` when either side has no display ref or the base URL is
/// unusable.
///
/// ```
/// use gitsnap::core::types::{DiffReport, RefKind};
/// use gitsnap::ui::output::compare_url;
///
/// let report = DiffReport {
///     repo_name: "alpha".into(),
///     source_ref: "develop".into(),
///     target_ref: "prod-2".into(),
///     source_kind: RefKind::Branch,
///     target_kind: RefKind::TagPattern,
///     ..Default::default()
/// };
/// let url = compare_url(None, "contoso", "Mobile", &report).unwrap();
/// assert_eq!(
///     url,
///     "https://dev.azure.com/contoso/Mobile/_git/alpha/branchCompare?baseVersion=GTprod-2&targetVersion=GBdevelop&_a=commits"
/// );
/// ```
pub fn compare_url(
    base_url: Option<&str>,
    organization: &str,
    project: &str,
    report: &DiffReport,
) -> Option<String> {
    if report.source_ref.is_empty() || report.target_ref.is_empty() || report.repo_name.is_empty() {
        return None;
    }

    let base = base_url
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/');
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend([
            organization,
            project,
            "_git",
            report.repo_name.as_str(),
            "branchCompare",
        ]);
    url.query_pairs_mut()
        .append_pair("baseVersion", &web_version(report.target_kind, &report.target_ref))
        .append_pair("targetVersion", &web_version(report.source_kind, &report.source_ref))
        .append_pair("_a", "commits");
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CommitMeta, CommitSummary};

    fn divergent() -> DiffReport {
        DiffReport {
            repo_id: Some("r1".into()),
            repo_name: "alpha".into(),
            status: DiffStatus::Divergent,
            commit_count: 2,
            file_count: 3,
            ahead_count: 2,
            files: vec!["/a.rs".into(), "/b.rs".into()],
            commits: vec![CommitSummary {
                short_id: "aaa1111".into(),
                message: "Fix login\n\nlong body".into(),
                author: "Ada".into(),
                date: "2024-01-01T00:00:00Z".into(),
            }],
            note: "2 commits ahead, 3 files changed".into(),
            source_ref: "develop".into(),
            target_ref: "master".into(),
            source_commit: "aaa1111".into(),
            target_commit: "bbb2222".into(),
            source_meta: CommitMeta {
                message: "tip".into(),
                author: "Ada".into(),
                date: "2024-01-01".into(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn table_has_header_and_rows() {
        let table = render_table(&[divergent()]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("REPO"));
        assert!(lines[1].contains("divergent"));
        assert!(lines[1].contains("develop (aaa1111)"));
    }

    #[test]
    fn commit_display_not_repeated() {
        assert_eq!(with_commit("aaa1111", "aaa1111"), "aaa1111");
        assert_eq!(with_commit("develop", ""), "develop");
    }

    #[test]
    fn details_list_commits_and_remaining_files() {
        let details = render_details(&divergent());
        assert!(details.contains("aaa1111 Fix login (Ada)"));
        assert!(!details.contains("long body"));
        assert!(details.contains("    /a.rs"));
        assert!(details.contains("... and 1 more"));
    }

    #[test]
    fn summary_mentions_skipped() {
        let counts = StatusCounts {
            aligned: 1,
            divergent: 2,
            error: 0,
        };
        assert_eq!(render_summary(&counts, 0), "1 aligned, 2 divergent, 0 error");
        assert!(render_summary(&counts, 3).ends_with("3 skipped (cancelled)"));
    }

    #[test]
    fn json_contains_reports() {
        let source = RefSpec::new(RefKind::Branch, "develop");
        let target = RefSpec::new(RefKind::Branch, "master");
        let outcome = ComparisonOutcome {
            reports: vec![divergent()],
            ..Default::default()
        };
        let json = render_json(&source, &target, &outcome, outcome.reports.iter().collect()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["reports"][0]["status"], "divergent");
        assert_eq!(value["summary"]["divergent"], 1);
        assert_eq!(value["source"]["kind"], "branch");
    }

    #[test]
    fn compare_url_on_prem_encodes_segments() {
        let mut report = divergent();
        report.repo_name = "my repo".into();
        report.target_kind = RefKind::Commit;
        report.target_ref = "bbb2222".into();
        let url = compare_url(Some("http://tfs.local:8080/tfs/"), "DefaultCollection", "APP", &report)
            .unwrap();
        assert_eq!(
            url,
            "http://tfs.local:8080/tfs/DefaultCollection/APP/_git/my%20repo/branchCompare?baseVersion=GCbbb2222&targetVersion=GBdevelop&_a=commits"
        );
    }

    #[test]
    fn compare_url_requires_refs() {
        let mut report = divergent();
        report.target_ref.clear();
        assert!(compare_url(None, "o", "p", &report).is_none());
    }

    #[test]
    fn repositories_table() {
        let mut repo = Repository::new("guid-1", "alpha");
        repo.default_branch = Some("refs/heads/main".into());
        let table = render_repositories(&[repo]);
        assert!(table.lines().nth(1).unwrap().contains("main"));
    }
}
