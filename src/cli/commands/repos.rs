//! repos command - List the repositories of the project

use anyhow::{Context as _, Result};

use super::connect;
use crate::cli::args::ConnectionArgs;
use crate::cli::Context;
use crate::forge::Forge;
use crate::ui::output;

/// Run the repos command.
pub fn repos(ctx: &Context, connection: &ConnectionArgs, json: bool) -> Result<()> {
    let config = ctx.load_config()?;
    let forge = connect(&config, connection)?;

    let rt = tokio::runtime::Runtime::new()?;
    let repos = rt
        .block_on(forge.list_repositories())
        .context("Failed to list repositories")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&repos)?);
        return Ok(());
    }

    let verbosity = ctx.verbosity();
    if repos.is_empty() {
        output::print("No repositories found.", verbosity);
    } else {
        output::print(output::render_repositories(&repos), verbosity);
    }
    Ok(())
}
