//! Config command - View and validate the Hearth configuration
//!
//! Provides the `hearth config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates it and reports every error found
//! 3. Writes a default configuration file to start from

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;

use hearth_core::config::Config;

use crate::context::AppContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration
    Validate,
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Validate => execute_validate(ctx),
            ConfigCommand::Init { force } => execute_init(ctx, *force),
        }
    }
}

fn execute_show(ctx: &AppContext) -> Result<()> {
    let formatter = ctx.formatter();
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if ctx.is_json() {
        let json =
            serde_json::to_value(&ctx.config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
    formatter.info("");
    let yaml =
        serde_yaml::to_string(&ctx.config).context("Failed to serialize configuration to YAML")?;
    for line in yaml.lines() {
        formatter.info(line);
    }
    Ok(())
}

fn execute_validate(ctx: &AppContext) -> Result<()> {
    let formatter = ctx.formatter();
    let errors = ctx.config.validate();

    if ctx.is_json() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "path": ctx.config_path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
    } else {
        for error in &errors {
            formatter.error(&error.to_string());
        }
    }

    if !errors.is_empty() {
        bail!("{} configuration errors", errors.len());
    }
    Ok(())
}

fn execute_init(ctx: &AppContext, force: bool) -> Result<()> {
    let path = &ctx.config_path;
    if path.exists() && !force {
        bail!(
            "{} already exists; use --force to overwrite it",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(&Config::default())
        .context("Failed to serialize default configuration")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    ctx.formatter()
        .success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}
