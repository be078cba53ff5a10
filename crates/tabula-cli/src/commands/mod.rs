//! CLI command modules

pub mod compare;
pub mod config;
pub mod plan;
pub mod simulate;
pub mod train;

use std::hash::Hash;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use tabula_core::{DiscreteAction, FiniteEnvironment};
use tabula_env::{Easy21, GridWorld};
use tabula_rl::{ControlEngine, Policy, SparseTable, TrainingContext, TrainingReport};

use crate::config::{Config, TrainingConfig};

/// Environment selector shared by the commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnvKind {
    Easy21,
    Gridworld,
}

pub fn easy21(config: &Config) -> Result<Easy21> {
    let env = match config.training.env_seed {
        Some(seed) => Easy21::seeded(config.easy21.clone(), seed),
        None => Easy21::new(config.easy21.clone()),
    };
    env.context("Invalid Easy21 rules")
}

pub fn gridworld(config: &Config) -> Result<GridWorld> {
    let env = match config.training.env_seed {
        Some(seed) => GridWorld::seeded(config.gridworld.clone(), seed),
        None => GridWorld::new(config.gridworld.clone()),
    };
    env.context("Invalid gridworld layout")
}

/// Output of a training run
pub struct Trained<S, A> {
    pub q: SparseTable<S, A>,
    pub policy: Policy<S, A>,
    pub report: TrainingReport,
}

/// Train the configured algorithm against `env`
pub fn train_on<E: FiniteEnvironment>(
    env: &mut E,
    training: &TrainingConfig,
) -> Result<Trained<E::State, E::Action>> {
    let mut engine: ControlEngine<E, SparseTable<E::State, E::Action>> = ControlEngine::new();
    engine.set_algorithm(&training.algorithm)?;
    engine.set_algorithm_params(training.algorithm_params())?;

    let mut ctx =
        TrainingContext::from_params(SparseTable::new(), Policy::new(), &training.params())?;
    let report = engine.train(env, &mut ctx, training.episodes)?;
    let (q, policy) = ctx.into_parts();

    Ok(Trained { q, policy, report })
}

/// One entry of an exported value surface
#[derive(Debug, Serialize)]
pub struct SurfacePoint<S> {
    pub state: S,
    pub value: f64,
}

/// Value surface sorted by state
pub fn surface_points<S, A>(q: &SparseTable<S, A>) -> Vec<SurfacePoint<S>>
where
    S: Ord + Clone + Hash,
    A: DiscreteAction,
{
    let mut points: Vec<SurfacePoint<S>> = tabula_rl::value_surface(q)
        .into_iter()
        .map(|(state, value)| SurfacePoint { state, value })
        .collect();
    points.sort_by(|a, b| a.state.cmp(&b.state));
    points
}

/// Write `value` as pretty JSON to `path`
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))
}
