//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file instead of the default locations
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::config::PAT_ENV;
use crate::core::types::RefKind;

/// gitsnap - Compare SOURCE and TARGET refs across Azure DevOps repositories
#[derive(Parser, Debug)]
#[command(name = "gitsnap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Connection flags shared by every command that talks to the server.
///
/// Each flag overrides the matching `[connection]` value from the config
/// file. The token is only ever read from `--pat` or the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Organization (cloud) or collection (on-premises)
    #[arg(long, value_name = "NAME")]
    pub org: Option<String>,

    /// Project name
    #[arg(long, value_name = "NAME")]
    pub project: Option<String>,

    /// Server base URL for on-premises installations
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Username for basic authentication
    #[arg(long, value_name = "USER")]
    pub username: Option<String>,

    /// Personal access token
    #[arg(long, env = PAT_ENV, hide_env_values = true, value_name = "TOKEN")]
    pub pat: Option<String>,
}

/// Flags of the `compare` command.
#[derive(Args, Debug, Clone, Default)]
pub struct CompareArgs {
    /// How to interpret --source (branch, tag_pattern, commit)
    #[arg(long, value_name = "KIND")]
    pub source_kind: Option<RefKind>,

    /// SOURCE reference: branch name, tag glob, or commit SHA
    #[arg(long, value_name = "REF")]
    pub source: Option<String>,

    /// How to interpret --target (branch, tag_pattern, commit)
    #[arg(long, value_name = "KIND")]
    pub target_kind: Option<RefKind>,

    /// TARGET reference: branch name, tag glob, or commit SHA
    #[arg(long, value_name = "REF")]
    pub target: Option<String>,

    /// Only compare this repository (id or name); repeatable
    #[arg(long = "repo", value_name = "REPO")]
    pub repos: Vec<String>,

    /// Hide aligned repositories; divergent and failed ones stay
    #[arg(long, visible_alias = "only-divergent")]
    pub hide_aligned: bool,

    /// Show commits, files and a compare link for each divergent repository
    #[arg(long, conflicts_with = "json")]
    pub details: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of repositories compared concurrently
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify that the server is reachable and the token is accepted
    #[command(
        name = "check",
        long_about = "Verify that the server is reachable and the token is accepted.\n\n\
            Probes the server with each known API version and reports the one \
            that works. Use this first when setting up a new organization or an \
            on-premises server."
    )]
    Check {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// List the repositories of the project
    #[command(name = "repos")]
    Repos {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare SOURCE and TARGET in every repository
    #[command(
        name = "compare",
        long_about = "Compare SOURCE and TARGET in every repository of the project.\n\n\
            Each side is a branch name, a tag glob (the most recent matching tag \
            wins), or a commit SHA. A repository is aligned when both sides \
            point at the same commit or have no file differences, divergent \
            when SOURCE has changes TARGET lacks, and error when a side cannot \
            be resolved.\n\n\
            Defaults for SOURCE, TARGET and the repository selection come from \
            the config file; flags override them.",
        after_help = "\
EXAMPLES:
    # Branch against branch
    gitsnap compare --source develop --target master

    # Branch against the latest production tag
    gitsnap compare --source develop --target-kind tag_pattern --target 'prod-*'

    # Two repositories only, with commit and file details
    gitsnap compare --repo api --repo web --details

    # Machine-readable output for scripts
    gitsnap compare --json --hide-aligned"
    )]
    Compare {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        args: CompareArgs,
    },

    /// Show or create the config file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write a starter config file
    Init {
        /// Organization (cloud) or collection (on-premises)
        #[arg(long, value_name = "NAME")]
        org: String,

        /// Project name
        #[arg(long, value_name = "NAME")]
        project: String,

        /// Server base URL for on-premises installations
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
}
