//! Training command

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use tabula_core::FiniteEnvironment;

use super::{surface_points, train_on, write_json, EnvKind};
use crate::config::{Config, TrainingConfig};

#[derive(Args)]
pub struct TrainArgs {
    /// Environment to train on
    #[arg(short, long, value_enum, default_value_t = EnvKind::Easy21)]
    pub env: EnvKind,

    /// Algorithm (monte_carlo, sarsa, sarsa_lambda)
    #[arg(short, long)]
    pub algorithm: Option<String>,

    /// Number of training episodes
    #[arg(short = 'n', long)]
    pub episodes: Option<u64>,

    /// Trace decay for sarsa_lambda
    #[arg(long)]
    pub lambda: Option<f64>,

    /// First-visit Monte Carlo
    #[arg(long)]
    pub first_visit: bool,

    /// Every-visit Monte Carlo
    #[arg(long, conflicts_with = "first_visit")]
    pub every_visit: bool,

    /// Seed for policy sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the value surface as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the training report as JSON
    #[arg(long)]
    pub json: bool,
}

impl TrainArgs {
    /// Command-line flags take precedence over the configuration
    pub fn apply(&self, training: &mut TrainingConfig) {
        if let Some(algorithm) = &self.algorithm {
            training.algorithm.clone_from(algorithm);
        }
        if let Some(episodes) = self.episodes {
            training.episodes = episodes;
        }
        if let Some(lambda) = self.lambda {
            training.lambda = lambda;
        }
        if self.first_visit {
            training.first_visit = true;
        }
        if self.every_visit {
            training.first_visit = false;
        }
        if self.seed.is_some() {
            training.seed = self.seed;
        }
    }
}

pub fn run(args: TrainArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config.training);

    match args.env {
        EnvKind::Easy21 => {
            let mut env = super::easy21(&config)?;
            execute(&mut env, &args, &config.training)
        }
        EnvKind::Gridworld => {
            let mut env = super::gridworld(&config)?;
            execute(&mut env, &args, &config.training)
        }
    }
}

fn execute<E>(env: &mut E, args: &TrainArgs, training: &TrainingConfig) -> Result<()>
where
    E: FiniteEnvironment,
    E::State: Ord + Serialize,
{
    let trained = train_on(env, training)?;
    let report = &trained.report;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("Training Report");
        println!("===============\n");
        println!("Run:          {}", report.run_id);
        println!("Algorithm:    {} {}", report.algorithm, report.params);
        println!("Environment:  {}", report.environment);
        println!("Started:      {}", report.started_at.to_rfc3339());
        println!("Episodes:     {}", report.episodes);
        println!("Steps:        {}", report.steps);
        println!(
            "Outcomes:     {} wins / {} draws / {} losses",
            report.outcomes.wins, report.outcomes.draws, report.outcomes.losses
        );
        println!("Mean reward:  {:.4}", report.mean_terminal_reward);
        println!(
            "States:       {} of {}",
            report.states_visited,
            env.states().len()
        );
        println!("Policy size:  {}", trained.policy.len());
        println!("Duration:     {} ms", report.duration_ms);
    }

    if let Some(path) = &args.output {
        write_json(path, &surface_points(&trained.q))?;
        info!("Value surface written to {}", path.display());
    }

    Ok(())
}
