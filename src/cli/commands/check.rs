//! check command - Verify connectivity and credentials

use anyhow::{Context as _, Result};

use super::connect;
use crate::cli::args::ConnectionArgs;
use crate::cli::Context;
use crate::forge::Forge;
use crate::ui::output;

/// Run the check command.
pub fn check(ctx: &Context, connection: &ConnectionArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let forge = connect(&config, connection)?;
    let verbosity = ctx.verbosity();

    output::debug(format!("connecting: {:?}", forge), verbosity);

    let rt = tokio::runtime::Runtime::new()?;
    let version = rt
        .block_on(forge.test_connection())
        .with_context(|| {
            format!(
                "Cannot reach project '{}' in '{}'",
                forge.project(),
                forge.organization()
            )
        })?;

    output::print(
        format!(
            "Connected to {}/{} (API version {})",
            forge.organization(),
            forge.project(),
            version
        ),
        verbosity,
    );
    Ok(())
}
