//! Configuration loading for the Tabula CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use tabula_env::{Easy21Rules, GridSpec};
use tabula_rl::TrainingParams;

/// Configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub training: TrainingConfig,
    pub easy21: Easy21Rules,
    pub gridworld: GridSpec,
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub algorithm: String,
    pub episodes: u64,
    pub n0: f64,
    pub first_visit: bool,
    pub lambda: f64,
    /// Seed for policy sampling
    pub seed: Option<u64>,
    /// Seed for the environment's own random source
    pub env_seed: Option<u64>,
    pub max_episode_steps: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            algorithm: "monte_carlo".to_string(),
            episodes: 100_000,
            n0: 100.0,
            first_visit: false,
            lambda: 0.5,
            seed: None,
            env_seed: None,
            max_episode_steps: None,
        }
    }
}

impl TrainingConfig {
    pub fn params(&self) -> TrainingParams {
        TrainingParams {
            n0: self.n0,
            seed: self.seed,
            max_episode_steps: self.max_episode_steps,
        }
    }

    /// Parameters handed to the active algorithm
    pub fn algorithm_params(&self) -> serde_json::Value {
        serde_json::json!({
            "first_visit": self.first_visit,
            "lambda": self.lambda,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Games played by `simulate`
    pub games: u64,
    /// Monte Carlo episodes for the comparison reference
    pub reference_episodes: u64,
    /// SARSA(lambda) episodes per sweep point
    pub sweep_episodes: u64,
    /// Step cap while simulating a fixed policy
    pub max_episode_steps: Option<usize>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            games: 1000,
            reference_episodes: 100_000,
            sweep_episodes: 1000,
            max_episode_steps: Some(1000),
        }
    }
}

impl Config {
    /// Load configuration from `path` (if any) and environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Add environment variables with TABULA_ prefix
        builder = builder.add_source(
            Environment::with_prefix("TABULA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Find the configuration file
    pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        // Check in order: --config, TABULA_CONFIG env, ./tabula.toml, ~/.config/tabula/tabula.toml
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var("TABULA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("tabula.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("tabula").join("tabula.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
