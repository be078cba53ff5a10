//! Fixed-policy simulation command

use anyhow::Result;
use clap::{Args, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use tabula_core::FiniteEnvironment;
use tabula_rl::{greedy_policy, simulate_with, Policy, Tally, TrajectoryGenerator};

use super::{train_on, EnvKind};
use crate::config::Config;

/// Policy played during simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    /// Uniformly random actions
    Random,
    /// Greedy policy extracted from a freshly trained value store
    Greedy,
    /// The epsilon-greedy behavior policy left by training
    Behavior,
}

#[derive(Args)]
pub struct SimulateArgs {
    #[arg(short, long, value_enum, default_value_t = EnvKind::Easy21)]
    pub env: EnvKind,

    #[arg(short, long, value_enum, default_value_t = PolicyKind::Random)]
    pub policy: PolicyKind,

    /// Number of games to play
    #[arg(short, long)]
    pub games: Option<u64>,

    /// Seed for the simulation's policy sampling
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: SimulateArgs, config: Config) -> Result<()> {
    let tally = match args.env {
        EnvKind::Easy21 => execute(&mut super::easy21(&config)?, &args, &config)?,
        EnvKind::Gridworld => execute(&mut super::gridworld(&config)?, &args, &config)?,
    };

    println!("Simulation ({:?} policy)", args.policy);
    println!("======================\n");
    println!("Games:     {}", tally.total());
    println!("Wins:      {}", tally.wins);
    println!("Draws:     {}", tally.draws);
    println!("Losses:    {}", tally.losses);
    println!("Win rate:  {:.2}%", tally.win_rate() * 100.0);

    Ok(())
}

fn execute<E>(env: &mut E, args: &SimulateArgs, config: &Config) -> Result<Tally>
where
    E: FiniteEnvironment,
{
    let policy = match args.policy {
        PolicyKind::Random => Policy::new(),
        PolicyKind::Greedy => greedy_policy(&train_on(env, &config.training)?.q),
        PolicyKind::Behavior => train_on(env, &config.training)?.policy,
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let generator = TrajectoryGenerator {
        max_steps: config.evaluation.max_episode_steps,
    };
    let games = args.games.unwrap_or(config.evaluation.games);

    Ok(simulate_with(&generator, env, &policy, games, &mut rng)?)
}
