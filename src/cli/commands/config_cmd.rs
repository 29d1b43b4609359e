//! config command - Show or create the config file

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::config::{Config, GitsnapConfig, NetworkConfig};
use crate::ui::output;

/// Show the effective configuration as TOML.
///
/// Network settings are always shown with their defaults filled in. The
/// token is never part of the file and is never printed.
pub fn show(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;

    match config.loaded_from() {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No config file found; showing defaults"),
    }

    let mut effective = config.file.clone();
    if effective.network.is_none() {
        effective.network = Some(NetworkConfig::default());
    }
    let rendered = toml::to_string_pretty(&effective).context("Failed to render config")?;
    print!("{}", rendered);
    Ok(())
}

/// Write a starter config file.
///
/// Writes to `--config` when given, otherwise `~/.gitsnap/config.toml`.
pub fn init(
    ctx: &Context,
    org: &str,
    project: &str,
    base_url: Option<&str>,
    force: bool,
) -> Result<()> {
    let path = match &ctx.config_path {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    let mut file = GitsnapConfig::example(org, project);
    if let Some(connection) = file.connection.as_mut() {
        connection.base_url = base_url.map(str::to_string);
    }

    Config::write(&path, &file, force)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    output::print(format!("Wrote {}", path.display()), ctx.verbosity());
    Ok(())
}
