//! Configuration management commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::Config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show,
    /// Initialize a configuration file with the defaults
    Init {
        /// Where to write the file
        #[arg(default_value = "tabula.toml")]
        path: PathBuf,
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub fn run(cmd: ConfigCommands, config: &Config, source: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config, source),
        ConfigCommands::Init { path, force } => init(&path, force).map(|written| {
            if written {
                println!("Configuration file created: {}", path.display());
            } else {
                println!("Configuration file already exists: {}", path.display());
                println!("Use --force to overwrite");
            }
        }),
    }
}

fn show(config: &Config, source: Option<&Path>) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    match source {
        Some(path) => println!("Config file: {}\n", path.display()),
        None => println!("No configuration file found. Using defaults.\n"),
    }
    println!("{}", config.to_toml()?);

    Ok(())
}

/// Write the default configuration to `path`; returns whether it was written
fn init(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let contents = Config::default().to_toml()?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabula.toml");

        assert!(init(&path, false).unwrap());
        let loaded = Config::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.training, Config::default().training);
        assert_eq!(loaded.gridworld, Config::default().gridworld);
    }

    #[test]
    fn test_init_respects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabula.toml");
        std::fs::write(&path, "[training]\nepisodes = 5\n").unwrap();

        assert!(!init(&path, false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[training]\nepisodes = 5\n");

        assert!(init(&path, true).unwrap());
        let loaded = Config::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.training.episodes, 100_000);
    }
}
