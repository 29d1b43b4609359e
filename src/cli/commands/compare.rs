//! cli::commands::compare
//!
//! Compare SOURCE and TARGET across the repositories of a project.
//!
//! # Design
//!
//! SOURCE, TARGET, the repository selection and the worker count come from
//! flags first and the config file second. The comparison runs on a tokio
//! runtime owned by this command; Ctrl-C cancels it cooperatively and the
//! reports completed so far are still printed.
//!
//! # Example
//!
//! ```bash
//! gitsnap compare --source develop --target master
//! gitsnap compare --target-kind tag_pattern --target 'prod-*' --hide-aligned
//! ```

use anyhow::{bail, Context as _, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{connection_params, select_repositories};
use crate::cli::args::{CompareArgs, ConnectionArgs};
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::types::{DiffReport, RefKind, RefSpec};
use crate::engine::{Comparison, ComparisonOutcome};
use crate::forge::azure::AzureDevOpsForge;
use crate::forge::Forge;
use crate::ui::output::{self, Verbosity};

/// Run the compare command.
pub fn compare(ctx: &Context, connection: &ConnectionArgs, args: &CompareArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let source = ref_spec("SOURCE", args.source_kind, args.source.as_deref(), config.source())?;
    let target = ref_spec("TARGET", args.target_kind, args.target.as_deref(), config.target())?;
    let workers = args
        .workers
        .map(usize::from)
        .unwrap_or_else(|| config.workers());
    let params = connection_params(&config, connection)?.with_max_concurrent_requests(workers);
    let forge = AzureDevOpsForge::new(params).context("Failed to set up the connection")?;

    let comparison = Comparison::new(source, target).with_workers(workers);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(compare_async(ctx, &config, &forge, &comparison, args))
}

async fn compare_async(
    ctx: &Context,
    config: &Config,
    forge: &AzureDevOpsForge,
    comparison: &Comparison,
    args: &CompareArgs,
) -> Result<()> {
    let verbosity = ctx.verbosity();

    let listed = forge
        .list_repositories()
        .await
        .context("Failed to list repositories")?;
    let selectors = if args.repos.is_empty() {
        config.repositories()
    } else {
        args.repos.as_slice()
    };
    let (repos, unmatched) = select_repositories(listed, selectors);
    for selector in &unmatched {
        output::warn(format!("no repository named '{}'", selector), verbosity);
    }
    if repos.is_empty() {
        output::print("No repositories to compare.", verbosity);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            trigger.cancel();
        }
    });

    output::debug(
        format!(
            "comparing {} repositories with {} workers",
            repos.len(),
            comparison.workers
        ),
        verbosity,
    );
    let outcome = comparison
        .run_until_cancelled(forge, &repos, &cancel)
        .await;
    watcher.abort();

    let hide_aligned = args.hide_aligned || config.hide_aligned();
    let shown: Vec<&DiffReport> = outcome
        .reports
        .iter()
        .filter(|r| !hide_aligned || output::is_noteworthy(r))
        .collect();

    if args.json {
        let json = output::render_json(&comparison.source, &comparison.target, &outcome, shown)?;
        println!("{}", json);
    } else {
        print_human(forge, &outcome, &shown, args.details, verbosity);
    }

    if outcome.cancelled {
        bail!(
            "Comparison cancelled; {} repositories not compared",
            outcome.skipped.len()
        );
    }
    Ok(())
}

fn print_human(
    forge: &AzureDevOpsForge,
    outcome: &ComparisonOutcome,
    shown: &[&DiffReport],
    details: bool,
    verbosity: Verbosity,
) {
    if shown.is_empty() {
        output::print("All repositories are aligned.", verbosity);
    } else {
        let rows: Vec<DiffReport> = shown.iter().map(|r| (*r).clone()).collect();
        output::print(output::render_table(&rows), verbosity);
    }

    if details {
        for report in shown.iter().filter(|r| output::is_noteworthy(r)) {
            output::print("", verbosity);
            output::print(output::render_details(report), verbosity);
            if let Some(url) = output::compare_url(
                Some(forge.base_url()),
                forge.organization(),
                forge.project(),
                report,
            ) {
                output::print(format!("  {}", url), verbosity);
            }
        }
    }

    output::print("", verbosity);
    output::print(
        output::render_summary(&outcome.counts(), outcome.skipped.len()),
        verbosity,
    );
}

/// Pick a reference from flags or the config file.
///
/// A value given on the command line keeps the configured kind unless a
/// kind flag is also given.
fn ref_spec(
    label: &str,
    kind: Option<RefKind>,
    value: Option<&str>,
    configured: Option<&RefSpec>,
) -> Result<RefSpec> {
    match (value, configured) {
        (Some(value), configured) => {
            let kind = kind
                .or(configured.map(|c| c.kind))
                .unwrap_or_default();
            Ok(RefSpec::new(kind, value))
        }
        (None, Some(configured)) => Ok(RefSpec {
            kind: kind.unwrap_or(configured.kind),
            value: configured.value.clone(),
        }),
        (None, None) => bail!(
            "No {} reference. Pass --{} or set [{}] in the config file.",
            label,
            label.to_lowercase(),
            label.to_lowercase()
        ),
    }
}
