use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use super::runtime::load_config;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file, then environment overrides)
    Show,

    /// Validate configuration
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let loaded = load_config(config_path).await?;
            println!("# effective configuration ({})", loaded.path.display());
            print!("{}", serde_yaml::to_string(&loaded.config)?);
        }
        ConfigAction::Validate => {
            let loaded = load_config(config_path).await?;
            if loaded.path.exists() {
                println!("Configuration file {} is valid", loaded.path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    loaded.path.display()
                );
            }
        }
    }
    Ok(())
}
