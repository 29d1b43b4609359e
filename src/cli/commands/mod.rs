//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Merges its flags with the config file
//! 2. Builds the forge and runs the engine
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Commands that talk to the server create a tokio runtime and `block_on`
//! their async implementation, so the dispatch layer stays synchronous.

mod check;
mod compare;
mod config_cmd;
mod repos;

pub use check::check;
pub use compare::compare;
pub use config_cmd::{init as config_init, show as config_show};
pub use repos::repos;

use anyhow::{bail, Context as _, Result};

use crate::cli::args::{Command, ConfigAction, ConnectionArgs};
use crate::cli::Context;
use crate::core::config::{Config, PAT_ENV};
use crate::core::types::Repository;
use crate::forge::azure::{AzureDevOpsForge, ConnectionParams};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Check { connection } => check(ctx, &connection),
        Command::Repos { connection, json } => repos(ctx, &connection, json),
        Command::Compare { connection, args } => compare(ctx, &connection, &args),
        Command::Config { action } => match action {
            ConfigAction::Show => config_show(ctx),
            ConfigAction::Init {
                org,
                project,
                base_url,
                force,
            } => config_init(ctx, &org, &project, base_url.as_deref(), force),
        },
    }
}

/// Connection parameters from flags, falling back to the config file.
pub(crate) fn connection_params(config: &Config, args: &ConnectionArgs) -> Result<ConnectionParams> {
    let Some(organization) = non_blank(args.org.as_deref()).or(config.organization()) else {
        bail!("No organization configured. Pass --org or run 'gitsnap config init'.");
    };
    let Some(project) = non_blank(args.project.as_deref()).or(config.project()) else {
        bail!("No project configured. Pass --project or run 'gitsnap config init'.");
    };
    let Some(token) = non_blank(args.pat.as_deref()) else {
        bail!("No personal access token. Pass --pat or set {}.", PAT_ENV);
    };

    let mut params = ConnectionParams::new(organization, project, token)
        .with_retry(config.retry_policy())
        .with_timeout(config.timeout())
        .with_max_concurrent_requests(config.workers());
    if let Some(base_url) = non_blank(args.base_url.as_deref()).or(config.base_url()) {
        params = params.with_base_url(base_url);
    }
    if let Some(username) = non_blank(args.username.as_deref()).or(config.username()) {
        params = params.with_username(username);
    }
    Ok(params)
}

/// Build the forge for a command.
pub(crate) fn connect(config: &Config, args: &ConnectionArgs) -> Result<AzureDevOpsForge> {
    let params = connection_params(config, args)?;
    AzureDevOpsForge::new(params).context("Failed to set up the connection")
}

/// Keep the repositories named by `selectors`; all of them when empty.
///
/// Returns the selection and the selectors that matched nothing.
pub(crate) fn select_repositories(
    repos: Vec<Repository>,
    selectors: &[String],
) -> (Vec<Repository>, Vec<String>) {
    if selectors.is_empty() {
        return (repos, Vec::new());
    }

    let unmatched = selectors
        .iter()
        .filter(|s| !repos.iter().any(|r| r.matches(s)))
        .cloned()
        .collect();
    let selected = repos
        .into_iter()
        .filter(|r| selectors.iter().any(|s| r.matches(s)))
        .collect();
    (selected, unmatched)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ConnectionConfig, GitsnapConfig};

    fn configured() -> Config {
        let mut config = Config::default();
        config.file = GitsnapConfig {
            connection: Some(ConnectionConfig {
                organization: Some("contoso".into()),
                project: Some("Mobile".into()),
                base_url: Some("http://tfs:8080/tfs".into()),
                username: None,
            }),
            ..Default::default()
        };
        config
    }

    mod connection {
        use super::*;

        #[test]
        fn config_values_used() {
            let args = ConnectionArgs {
                pat: Some("secret".into()),
                ..Default::default()
            };
            let params = connection_params(&configured(), &args).unwrap();
            assert_eq!(params.organization, "contoso");
            assert_eq!(params.project, "Mobile");
            assert_eq!(params.base_url.as_deref(), Some("http://tfs:8080/tfs"));
            assert_eq!(params.username, None);
        }

        #[test]
        fn base_url_flag_reaches_forge() {
            let args = ConnectionArgs {
                base_url: Some("http://onprem:8080/tfs".into()),
                pat: Some("secret".into()),
                ..Default::default()
            };
            let forge = connect(&configured(), &args).unwrap();
            assert_eq!(forge.base_url(), "http://onprem:8080/tfs");
        }

        #[test]
        fn request_limit_follows_workers() {
            let args = ConnectionArgs {
                pat: Some("secret".into()),
                ..Default::default()
            };
            let params = connection_params(&configured(), &args).unwrap();
            assert_eq!(params.max_concurrent_requests, 4);
        }

        #[test]
        fn flags_override_config() {
            let args = ConnectionArgs {
                org: Some("fabrikam".into()),
                username: Some("me".into()),
                pat: Some("secret".into()),
                ..Default::default()
            };
            let params = connection_params(&configured(), &args).unwrap();
            assert_eq!(params.organization, "fabrikam");
            assert_eq!(params.project, "Mobile");
            assert_eq!(params.username.as_deref(), Some("me"));
        }

        #[test]
        fn missing_organization() {
            let args = ConnectionArgs {
                pat: Some("secret".into()),
                ..Default::default()
            };
            let err = connection_params(&Config::default(), &args).unwrap_err();
            assert!(err.to_string().contains("No organization configured"));
        }

        #[test]
        fn blank_token_rejected() {
            let args = ConnectionArgs {
                pat: Some("  ".into()),
                ..Default::default()
            };
            let err = connection_params(&configured(), &args).unwrap_err();
            assert!(err.to_string().contains("personal access token"));
        }
    }

    mod selection {
        use super::*;

        fn repos() -> Vec<Repository> {
            vec![
                Repository::new("r1", "alpha"),
                Repository::new("r2", "beta"),
                Repository::new("r3", "gamma"),
            ]
        }

        #[test]
        fn empty_selects_all() {
            let (selected, unmatched) = select_repositories(repos(), &[]);
            assert_eq!(selected.len(), 3);
            assert!(unmatched.is_empty());
        }

        #[test]
        fn by_name_or_id_in_listing_order() {
            let selectors = vec!["gamma".to_string(), "r1".to_string()];
            let (selected, _) = select_repositories(repos(), &selectors);
            let names: Vec<_> = selected.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["alpha", "gamma"]);
        }

        #[test]
        fn reports_unmatched() {
            let selectors = vec!["beta".to_string(), "delta".to_string()];
            let (selected, unmatched) = select_repositories(repos(), &selectors);
            assert_eq!(selected.len(), 1);
            assert_eq!(unmatched, vec!["delta"]);
        }
    }
}
