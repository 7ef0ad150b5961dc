//! `courier config`: show or create the YAML config.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use courier_core::{config, CourierConfig};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as YAML.
    Show,
    /// Write a config file with every default spelled out.
    Init(InitArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(command: ConfigCommand, database: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let resolved = super::resolve(database)?;
            let path = config::config_path_at(&resolved.home);
            let mut effective = resolved.config;
            effective.database = Some(resolved.database);

            println!(
                "# {} ({})",
                path.display(),
                if path.exists() { "loaded" } else { "defaults" }
            );
            print!(
                "{}",
                serde_yaml::to_string(&effective).context("failed to render config")?
            );
        }
        ConfigCommand::Init(args) => {
            let home = dirs::home_dir().context("could not determine home directory")?;
            let path = config::config_path_at(&home);
            if path.exists() && !args.force {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            let written = config::save_at(
                &home,
                &CourierConfig {
                    database,
                    ..CourierConfig::default()
                },
            )
            .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", written.display());
        }
    }
    Ok(())
}
