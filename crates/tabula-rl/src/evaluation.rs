//! Evaluation helpers: fixed-policy simulation, value-store comparison and
//! the lambda sweep

use std::collections::HashMap;
use std::hash::Hash;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tabula_core::{DiscreteAction, Environment, FiniteEnvironment, Result, Reward};

use crate::context::TrainingParams;
use crate::engine::sarsa_lambda;
use crate::policy::Policy;
use crate::trajectory::TrajectoryGenerator;
use crate::value::ValueStore;

/// Win / draw / loss counts by the sign of the terminal reward
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
}

impl Tally {
    pub fn record(&mut self, terminal_reward: Reward) {
        if terminal_reward > 0.0 {
            self.wins += 1;
        } else if terminal_reward < 0.0 {
            self.losses += 1;
        } else {
            self.draws += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.wins + self.draws + self.losses
    }

    pub fn win_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.wins as f64 / n as f64,
        }
    }
}

/// Play `n` episodes under a fixed `policy` without learning
pub fn simulate<E, R>(
    env: &mut E,
    policy: &Policy<E::State, E::Action>,
    n: u64,
    rng: &mut R,
) -> Result<Tally>
where
    E: Environment,
    R: Rng + ?Sized,
{
    simulate_with(&TrajectoryGenerator::default(), env, policy, n, rng)
}

/// [`simulate`] with an explicit trajectory generator (e.g. a step cap)
pub fn simulate_with<E, R>(
    generator: &TrajectoryGenerator,
    env: &mut E,
    policy: &Policy<E::State, E::Action>,
    n: u64,
    rng: &mut R,
) -> Result<Tally>
where
    E: Environment,
    R: Rng + ?Sized,
{
    let mut tally = Tally::default();
    for _ in 0..n {
        let episode = generator.generate(env, policy, rng)?;
        tally.record(episode.terminal_reward().unwrap_or(0.0));
    }
    debug!(
        environment = env.name(),
        wins = tally.wins,
        draws = tally.draws,
        losses = tally.losses,
        "Simulation complete"
    );
    Ok(tally)
}

/// Sum of squared estimate differences over `states` and every action
pub fn squared_error<S, A, Q1, Q2>(a: &Q1, b: &Q2, states: &[S]) -> f64
where
    A: DiscreteAction,
    Q1: ValueStore<S, A>,
    Q2: ValueStore<S, A>,
{
    states
        .iter()
        .flat_map(|state| {
            A::ALL.iter().map(move |&action| {
                let diff = a.value(state, action) - b.value(state, action);
                diff * diff
            })
        })
        .sum()
}

/// max_a Q(s, a) for every state holding a row
pub fn value_surface<S, A, Q>(q: &Q) -> HashMap<S, f64>
where
    S: Eq + Hash,
    A: DiscreteAction,
    Q: ValueStore<S, A>,
{
    q.states()
        .into_iter()
        .filter_map(|state| q.best_value(&state).map(|v| (state, v)))
        .collect()
}

/// Error of one SARSA(lambda) run against a reference store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub lambda: f64,
    pub error: f64,
}

/// Train SARSA(lambda) for lambda = 0.0, 0.1, ..., 1.0 and measure each
/// result against `reference` over the full state space of `env`
pub fn lambda_sweep<E, Q, R>(
    env: &mut E,
    reference: &R,
    episodes: u64,
    params: &TrainingParams,
) -> Result<Vec<SweepPoint>>
where
    E: FiniteEnvironment,
    Q: ValueStore<E::State, E::Action> + Default,
    R: ValueStore<E::State, E::Action>,
{
    let states = env.states();
    let mut points = Vec::with_capacity(11);

    for step in 0..=10u32 {
        let lambda = f64::from(step) / 10.0;
        let (q, _): (Q, _) = sarsa_lambda(env, Policy::new(), lambda, episodes, params)?;
        let error = squared_error(reference, &q, &states);
        info!(lambda, error, "Lambda sweep point");
        points.push(SweepPoint { lambda, error });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SparseTable;
    use float_eq::assert_float_eq;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Bet {
        Low,
        High,
    }

    impl DiscreteAction for Bet {
        const ALL: &'static [Self] = &[Bet::Low, Bet::High];

        fn to_index(self) -> usize {
            self as usize
        }
    }

    #[test]
    fn test_tally_by_sign() {
        let mut tally = Tally::default();
        for reward in [1.0, 0.0, -1.0, 2.5, -0.5] {
            tally.record(reward);
        }
        assert_eq!(
            tally,
            Tally {
                wins: 2,
                draws: 1,
                losses: 2
            }
        );
        assert_eq!(tally.total(), 5);
        assert_float_eq!(tally.win_rate(), 0.4, abs <= 1e-12);
        assert_eq!(Tally::default().win_rate(), 0.0);
    }

    #[test]
    fn test_squared_error_counts_missing_rows_as_zero() {
        let mut a: SparseTable<u8, Bet> = SparseTable::new();
        let b: SparseTable<u8, Bet> = SparseTable::new();
        a.update_mean(&0, Bet::High, 2.0);
        a.update_mean(&1, Bet::Low, -1.0);

        assert_float_eq!(squared_error(&a, &b, &[0u8, 1, 2]), 5.0, abs <= 1e-12);
        assert_float_eq!(squared_error(&a, &b, &[0u8]), 4.0, abs <= 1e-12);
        assert_eq!(squared_error(&a, &a, &[0u8, 1]), 0.0);
    }

    #[test]
    fn test_value_surface_takes_best_action() {
        let mut q: SparseTable<u8, Bet> = SparseTable::new();
        q.update_mean(&0, Bet::Low, -1.0);
        q.update_mean(&0, Bet::High, -0.5);
        q.update_mean(&1, Bet::High, 0.75);

        let surface = value_surface(&q);
        assert_eq!(surface.len(), 2);
        assert_eq!(surface[&0], -0.5);
        assert_eq!(surface[&1], 0.75);
    }
}
