use std::path::Path;

use reqtree_core::{Config, ProjectId, SectionPrefix, UserId};
use tracing::instrument;

use crate::cli::{config_path, terminal::Colorize};

const KEYS: &str = "default_prefix, project, user, store_file";

#[derive(Debug, clap::Parser)]
/// Show or modify workspace configuration
///
/// Configuration is stored in .req/config.toml.
///
/// Available configuration keys:
///   `default_prefix`  Prefix for root paths of projects without their own
///   project          The project commands operate on
///   user             The acting user
///   `store_file`      Document snapshot, relative to .req/ (read-only)
pub struct Command {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, clap::Parser)]
enum ConfigCommand {
    /// Show all configuration values
    Show,

    /// Get a specific configuration value
    Get {
        /// Configuration key to retrieve
        key: String,
    },

    /// Set a configuration value
    ///
    /// Examples:
    ///   req config set project mobile-app
    ///   req config set `default_prefix` SYS
    Set {
        /// Configuration key to set
        key: String,

        /// Value to set
        value: String,
    },
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = config_path(root);
        let mut config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            Config::default()
        };

        match self.command {
            ConfigCommand::Show => {
                show_config(&config);
                Ok(())
            }
            ConfigCommand::Get { key } => get_config(&config, &key),
            ConfigCommand::Set { key, value } => set_config(&mut config, &config_path, &key, value),
        }
    }
}

fn unset() -> String {
    "(unset)".dim()
}

fn show_config(config: &Config) {
    println!("Configuration:");
    println!("  default_prefix: {}", config.default_prefix().as_str());
    println!(
        "  project: {}",
        config.project.as_ref().map_or_else(unset, ToString::to_string)
    );
    println!(
        "  user: {}",
        config.user.as_ref().map_or_else(unset, ToString::to_string)
    );
    println!("  store_file: {}", config.store_file().display());
}

fn get_config(config: &Config, key: &str) -> anyhow::Result<()> {
    match key {
        "default_prefix" => println!("{}", config.default_prefix().as_str()),
        "project" => println!(
            "{}",
            config.project.as_ref().map_or_else(String::new, ToString::to_string)
        ),
        "user" => println!(
            "{}",
            config.user.as_ref().map_or_else(String::new, ToString::to_string)
        ),
        "store_file" => println!("{}", config.store_file().display()),
        _ => anyhow::bail!("Unknown configuration key: '{key}'\nAvailable keys: {KEYS}"),
    }
    Ok(())
}

fn set_config(
    config: &mut Config,
    config_path: &Path,
    key: &str,
    value: String,
) -> anyhow::Result<()> {
    match key {
        "default_prefix" => {
            let prefix: SectionPrefix = value.parse()?;
            config.set_default_prefix(prefix);
        }
        "project" => config.project = Some(ProjectId::new(value)),
        "user" => config.user = Some(UserId::new(value)),
        "store_file" => anyhow::bail!("'store_file' is read-only"),
        _ => anyhow::bail!(
            "Unknown configuration key: '{key}'\nSettable keys: default_prefix, project, user"
        ),
    }

    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    config.save(config_path)?;
    println!("{}", format!("✅ Set {key}").success());

    if key == "default_prefix" {
        println!(
            "\n{}",
            "Existing paths keep their prefix until `req regenerate` is run".dim()
        );
    }
    Ok(())
}
