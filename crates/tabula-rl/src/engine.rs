//! Control Engine - Coordinates training runs across registered algorithms

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tabula_core::{Environment, FiniteEnvironment, Result, TabulaError};

use crate::algorithm::{ControlAlgorithm, MonteCarlo, Sarsa, SarsaLambda};
use crate::context::{TrainingContext, TrainingParams};
use crate::evaluation::Tally;
use crate::policy::Policy;
use crate::value::ValueStore;

/// Summary of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub algorithm: String,
    pub environment: String,
    pub params: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub episodes: u64,
    pub steps: u64,
    /// Terminal-reward tally over the learning episodes
    pub outcomes: Tally,
    pub mean_terminal_reward: f64,
    pub states_visited: usize,
    pub duration_ms: u64,
}

impl TrainingReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run `episodes` learning episodes of `algorithm` against `env`
pub fn train<E, Q, C>(
    algorithm: &mut C,
    env: &mut E,
    ctx: &mut TrainingContext<E::State, E::Action, Q>,
    episodes: u64,
) -> Result<TrainingReport>
where
    E: Environment,
    Q: ValueStore<E::State, E::Action>,
    C: ControlAlgorithm<E, Q> + ?Sized,
{
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let clock = Instant::now();

    info!(
        %run_id,
        algorithm = algorithm.name(),
        environment = env.name(),
        episodes,
        "Starting training run"
    );
    if episodes == 0 {
        warn!("Training run requested with zero episodes");
    }

    let progress_every = (episodes / 10).max(1);
    let mut outcomes = Tally::default();
    let mut reward_sum = 0.0;
    let mut steps = 0u64;

    for episode in 1..=episodes {
        let outcome = algorithm.run_episode(env, ctx)?;
        outcomes.record(outcome.terminal_reward);
        reward_sum += outcome.terminal_reward;
        steps += outcome.steps as u64;

        if episode % progress_every == 0 {
            debug!(
                episode,
                wins = outcomes.wins,
                draws = outcomes.draws,
                losses = outcomes.losses,
                "Training progress"
            );
        }
    }

    let report = TrainingReport {
        run_id,
        algorithm: algorithm.name().to_string(),
        environment: env.name().to_string(),
        params: algorithm.params(),
        started_at,
        episodes,
        steps,
        outcomes,
        mean_terminal_reward: if episodes > 0 {
            reward_sum / episodes as f64
        } else {
            0.0
        },
        states_visited: ctx.q.states().len(),
        duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    info!(
        %run_id,
        steps,
        mean_terminal_reward = report.mean_terminal_reward,
        duration_ms = report.duration_ms,
        "Training run complete"
    );

    Ok(report)
}

/// Control Engine for managing algorithms and training runs
pub struct ControlEngine<E: Environment, Q: ValueStore<E::State, E::Action>> {
    algorithms: HashMap<String, Box<dyn ControlAlgorithm<E, Q>>>,
    active_algorithm: String,
    history: Vec<TrainingReport>,
}

impl<E, Q> ControlEngine<E, Q>
where
    E: FiniteEnvironment,
    Q: ValueStore<E::State, E::Action>,
{
    /// Create a new engine with the default algorithms registered
    pub fn new() -> Self {
        let mut engine = Self::empty();

        engine.register(Box::new(MonteCarlo::default()));
        engine.register(Box::new(Sarsa));
        engine.register(Box::new(SarsaLambda::default()));
        engine.active_algorithm = "monte_carlo".to_string();

        engine
    }
}

impl<E, Q> ControlEngine<E, Q>
where
    E: Environment,
    Q: ValueStore<E::State, E::Action>,
{
    /// Create an engine with no algorithms registered
    pub fn empty() -> Self {
        Self {
            algorithms: HashMap::new(),
            active_algorithm: String::new(),
            history: Vec::new(),
        }
    }

    /// Register an algorithm under its own name; the first one becomes active
    pub fn register(&mut self, algorithm: Box<dyn ControlAlgorithm<E, Q>>) {
        let name = algorithm.name().to_string();
        if self.active_algorithm.is_empty() {
            self.active_algorithm.clone_from(&name);
        }
        self.algorithms.insert(name, algorithm);
    }

    /// Set the active algorithm
    pub fn set_algorithm(&mut self, name: &str) -> Result<()> {
        if self.algorithms.contains_key(name) {
            self.active_algorithm = name.to_string();
            info!("Active algorithm set to: {}", name);
            Ok(())
        } else {
            Err(TabulaError::UnknownAlgorithm(name.to_string()))
        }
    }

    /// Get the active algorithm name
    pub fn active_algorithm(&self) -> &str {
        &self.active_algorithm
    }

    /// List available algorithms
    pub fn list_algorithms(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.algorithms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get algorithm parameters
    pub fn get_algorithm_params(&self) -> serde_json::Value {
        self.algorithms
            .get(&self.active_algorithm)
            .map(|alg| alg.params())
            .unwrap_or(serde_json::Value::Null)
    }

    /// Set algorithm parameters
    pub fn set_algorithm_params(&mut self, params: serde_json::Value) -> Result<()> {
        if let Some(algorithm) = self.algorithms.get_mut(&self.active_algorithm) {
            algorithm.set_params(params)?;
        }
        Ok(())
    }

    /// Train the active algorithm for `episodes` episodes
    pub fn train(
        &mut self,
        env: &mut E,
        ctx: &mut TrainingContext<E::State, E::Action, Q>,
        episodes: u64,
    ) -> Result<TrainingReport> {
        let algorithm = self
            .algorithms
            .get_mut(&self.active_algorithm)
            .ok_or_else(|| TabulaError::UnknownAlgorithm(self.active_algorithm.clone()))?;

        let report = train(algorithm.as_mut(), env, ctx, episodes)?;
        self.history.push(report.clone());
        Ok(report)
    }

    /// Reports of completed runs, oldest first
    pub fn history(&self) -> &[TrainingReport] {
        &self.history
    }

    /// Get statistics
    pub fn stats(&self) -> EngineStats {
        let total_episodes: u64 = self.history.iter().map(|r| r.episodes).sum();
        let reward_sum: f64 = self
            .history
            .iter()
            .map(|r| r.mean_terminal_reward * r.episodes as f64)
            .sum();

        EngineStats {
            runs: self.history.len(),
            total_episodes,
            total_steps: self.history.iter().map(|r| r.steps).sum(),
            average_terminal_reward: if total_episodes > 0 {
                reward_sum / total_episodes as f64
            } else {
                0.0
            },
            active_algorithm: self.active_algorithm.clone(),
        }
    }
}

impl<E, Q> Default for ControlEngine<E, Q>
where
    E: FiniteEnvironment,
    Q: ValueStore<E::State, E::Action>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub runs: usize,
    pub total_episodes: u64,
    pub total_steps: u64,
    pub average_terminal_reward: f64,
    pub active_algorithm: String,
}

fn run<E, Q, C>(
    mut algorithm: C,
    env: &mut E,
    policy: Policy<E::State, E::Action>,
    episodes: u64,
    params: &TrainingParams,
) -> Result<(Q, Policy<E::State, E::Action>)>
where
    E: Environment,
    Q: ValueStore<E::State, E::Action> + Default,
    C: ControlAlgorithm<E, Q>,
{
    let mut ctx = TrainingContext::from_params(Q::default(), policy, params)?;
    train(&mut algorithm, env, &mut ctx, episodes)?;
    Ok(ctx.into_parts())
}

/// Monte Carlo control from `policy` for `episodes` episodes
pub fn monte_carlo<E, Q>(
    env: &mut E,
    policy: Policy<E::State, E::Action>,
    episodes: u64,
    first_visit: bool,
    params: &TrainingParams,
) -> Result<(Q, Policy<E::State, E::Action>)>
where
    E: Environment,
    Q: ValueStore<E::State, E::Action> + Default,
{
    run(MonteCarlo { first_visit }, env, policy, episodes, params)
}

/// SARSA control from `policy` for `episodes` episodes
pub fn sarsa<E, Q>(
    env: &mut E,
    policy: Policy<E::State, E::Action>,
    episodes: u64,
    params: &TrainingParams,
) -> Result<(Q, Policy<E::State, E::Action>)>
where
    E: Environment,
    Q: ValueStore<E::State, E::Action> + Default,
{
    run(Sarsa, env, policy, episodes, params)
}

/// SARSA(lambda) control from `policy` for `episodes` episodes
pub fn sarsa_lambda<E, Q>(
    env: &mut E,
    policy: Policy<E::State, E::Action>,
    lambda: f64,
    episodes: u64,
    params: &TrainingParams,
) -> Result<(Q, Policy<E::State, E::Action>)>
where
    E: FiniteEnvironment,
    Q: ValueStore<E::State, E::Action> + Default,
{
    run(SarsaLambda::new(lambda)?, env, policy, episodes, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SparseTable;
    use tabula_core::{DiscreteAction, Transition};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Pull {
        Once,
    }

    impl DiscreteAction for Pull {
        const ALL: &'static [Self] = &[Pull::Once];

        fn to_index(self) -> usize {
            0
        }
    }

    /// Single-step game alternating win and loss
    struct Slot {
        pulls: u64,
    }

    impl Environment for Slot {
        type State = ();
        type Action = Pull;

        fn name(&self) -> &str {
            "slot"
        }

        fn reset(&mut self) {}

        fn step(&mut self, _state: &(), _action: Pull) -> Result<Transition<()>> {
            self.pulls += 1;
            let reward = if self.pulls % 2 == 1 { 1.0 } else { -1.0 };
            Ok(Transition::terminal(reward))
        }
    }

    impl FiniteEnvironment for Slot {
        fn states(&self) -> Vec<()> {
            vec![()]
        }
    }

    type Engine = ControlEngine<Slot, SparseTable<(), Pull>>;

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new();
        assert_eq!(engine.active_algorithm(), "monte_carlo");
    }

    #[test]
    fn test_list_algorithms() {
        let engine = Engine::new();
        assert_eq!(
            engine.list_algorithms(),
            vec!["monte_carlo", "sarsa", "sarsa_lambda"]
        );
    }

    #[test]
    fn test_set_algorithm() {
        let mut engine = Engine::new();

        assert!(engine.set_algorithm("sarsa").is_ok());
        assert_eq!(engine.active_algorithm(), "sarsa");

        let err = engine.set_algorithm("q_learning").unwrap_err();
        assert!(matches!(err, TabulaError::UnknownAlgorithm(_)));
        assert_eq!(engine.active_algorithm(), "sarsa");
    }

    #[test]
    fn test_algorithm_params() {
        let mut engine = Engine::new();
        engine.set_algorithm("sarsa_lambda").unwrap();
        engine
            .set_algorithm_params(serde_json::json!({ "lambda": 0.2 }))
            .unwrap();
        assert_eq!(engine.get_algorithm_params()["lambda"], 0.2);
    }

    #[test]
    fn test_train_report_and_stats() {
        let mut engine = Engine::new();
        let mut env = Slot { pulls: 0 };
        let mut ctx = TrainingContext::default().with_seed(0);

        let report = engine.train(&mut env, &mut ctx, 10).unwrap();
        assert_eq!(report.episodes, 10);
        assert_eq!(report.steps, 10);
        assert_eq!(report.outcomes.wins, 5);
        assert_eq!(report.outcomes.losses, 5);
        assert_eq!(report.mean_terminal_reward, 0.0);
        assert_eq!(report.states_visited, 1);
        assert_eq!(report.environment, "slot");

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["algorithm"], "monte_carlo");
        assert_eq!(json["outcomes"]["wins"], 5);

        engine.train(&mut env, &mut ctx, 10).unwrap();
        let stats = engine.stats();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.total_episodes, 20);
        assert_eq!(ctx.q.count(&(), Pull::Once), 20);
    }

    #[test]
    fn test_empty_engine_rejects_training() {
        let mut engine = Engine::empty();
        let mut env = Slot { pulls: 0 };
        let mut ctx = TrainingContext::default();
        assert!(engine.train(&mut env, &mut ctx, 1).is_err());
    }
}
