//! SARSA(lambda) versus Monte Carlo comparison command

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use tabula_env::easy21;
use tabula_rl::{lambda_sweep, monte_carlo, Policy, SparseTable, SweepPoint};

use super::write_json;
use crate::config::Config;

type EasyTable = SparseTable<easy21::State, easy21::Action>;

#[derive(Args)]
pub struct CompareArgs {
    /// Monte Carlo episodes for the reference value store
    #[arg(long)]
    pub reference_episodes: Option<u64>,

    /// SARSA(lambda) episodes per lambda
    #[arg(short = 'n', long)]
    pub episodes: Option<u64>,

    /// Write the sweep as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: CompareArgs, config: Config) -> Result<()> {
    let points = sweep(&args, &config)?;

    println!("Lambda   Squared error");
    println!("------   -------------");
    for point in &points {
        println!("{:>6.1}   {:>13.4}", point.lambda, point.error);
    }

    if let Some(path) = &args.output {
        write_json(path, &points)?;
        info!("Sweep written to {}", path.display());
    }

    Ok(())
}

fn sweep(args: &CompareArgs, config: &Config) -> Result<Vec<SweepPoint>> {
    let mut env = super::easy21(config)?;
    let params = config.training.params();

    let reference_episodes = args
        .reference_episodes
        .unwrap_or(config.evaluation.reference_episodes);
    info!(reference_episodes, "Training Monte Carlo reference");
    let (reference, _): (EasyTable, _) = monte_carlo(
        &mut env,
        Policy::new(),
        reference_episodes,
        config.training.first_visit,
        &params,
    )?;

    let episodes = args.episodes.unwrap_or(config.evaluation.sweep_episodes);
    let points = lambda_sweep::<_, EasyTable, _>(&mut env, &reference, episodes, &params)?;
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_has_eleven_points() {
        let mut config = Config::default();
        config.training.seed = Some(5);
        config.training.env_seed = Some(5);
        let args = CompareArgs {
            reference_episodes: Some(500),
            episodes: Some(20),
            output: None,
        };

        let points = sweep(&args, &config).unwrap();
        assert_eq!(points.len(), 11);
        assert!(points.iter().all(|p| p.error >= 0.0));
    }
}
