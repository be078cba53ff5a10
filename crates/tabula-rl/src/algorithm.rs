//! Control algorithm trait and the tabular implementations

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use tabula_core::{
    DiscreteAction, Environment, Episode, FiniteEnvironment, Result, Reward, TabulaError,
};

use crate::context::TrainingContext;
use crate::value::ValueStore;

/// Summary of one learning episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub steps: usize,
    pub terminal_reward: Reward,
    pub total_reward: Reward,
}

impl EpisodeOutcome {
    pub fn from_episode<S, A>(episode: &Episode<S, A>) -> Self {
        Self {
            steps: episode.len(),
            terminal_reward: episode.terminal_reward().unwrap_or(0.0),
            total_reward: episode.total_reward(),
        }
    }
}

/// Trait for control algorithms
pub trait ControlAlgorithm<E: Environment, Q: ValueStore<E::State, E::Action>> {
    /// Algorithm name
    fn name(&self) -> &str;

    /// Learn from one episode, updating the value store and behavior policy
    fn run_episode(
        &mut self,
        env: &mut E,
        ctx: &mut TrainingContext<E::State, E::Action, Q>,
    ) -> Result<EpisodeOutcome>;

    /// Get algorithm parameters as JSON
    fn params(&self) -> serde_json::Value;

    /// Set algorithm parameters from JSON
    fn set_params(&mut self, params: serde_json::Value) -> Result<()>;
}

/// Monte Carlo control over full episodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonteCarlo {
    /// Only the first occurrence of a (state, action) pair in an episode
    /// contributes its return
    pub first_visit: bool,
}

impl MonteCarlo {
    pub fn first_visit() -> Self {
        Self { first_visit: true }
    }

    pub fn every_visit() -> Self {
        Self { first_visit: false }
    }
}

impl<E, Q> ControlAlgorithm<E, Q> for MonteCarlo
where
    E: Environment,
    Q: ValueStore<E::State, E::Action>,
{
    fn name(&self) -> &str {
        "monte_carlo"
    }

    fn run_episode(
        &mut self,
        env: &mut E,
        ctx: &mut TrainingContext<E::State, E::Action, Q>,
    ) -> Result<EpisodeOutcome> {
        let episode = ctx.generate(env)?;
        let returns = episode.returns();
        let first_visits = episode.first_visits();

        for ((step, g), first) in episode.iter().zip(returns).zip(first_visits) {
            if self.first_visit && !first {
                continue;
            }
            ctx.q.update_mean(&step.state, step.action, g);
            ctx.improve(&step.state);
        }

        trace!(steps = episode.len(), "Monte Carlo episode applied");
        Ok(EpisodeOutcome::from_episode(&episode))
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "first_visit": self.first_visit })
    }

    fn set_params(&mut self, params: serde_json::Value) -> Result<()> {
        if let Some(first_visit) = params["first_visit"].as_bool() {
            self.first_visit = first_visit;
        }
        Ok(())
    }
}

/// One-step on-policy TD control with `alpha = 1 / N(s, a)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sarsa;

impl<E, Q> ControlAlgorithm<E, Q> for Sarsa
where
    E: Environment,
    Q: ValueStore<E::State, E::Action>,
{
    fn name(&self) -> &str {
        "sarsa"
    }

    fn run_episode(
        &mut self,
        env: &mut E,
        ctx: &mut TrainingContext<E::State, E::Action, Q>,
    ) -> Result<EpisodeOutcome> {
        let mut state = env.reset();
        let mut action = ctx.sample(&state)?;
        let mut steps = 0;
        let mut total = 0.0;

        loop {
            let transition = env.step(&state, action)?;
            steps += 1;
            total += transition.reward;

            let next = match transition.next_state {
                Some(next_state) => {
                    let next_action = ctx.sample(&next_state)?;
                    Some((next_state, next_action))
                }
                None => None,
            };

            let target = transition.reward + ctx.q.successor_value(next.as_ref());
            ctx.q.update_mean(&state, action, target);
            ctx.improve(&state);

            match next {
                Some((next_state, next_action)) => {
                    ctx.generator.check(steps)?;
                    state = next_state;
                    action = next_action;
                }
                None => {
                    return Ok(EpisodeOutcome {
                        steps,
                        terminal_reward: transition.reward,
                        total_reward: total,
                    })
                }
            }
        }
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    fn set_params(&mut self, _params: serde_json::Value) -> Result<()> {
        Ok(())
    }
}

/// SARSA with accumulating eligibility traces.
///
/// Every step sweeps the full state-action space of the environment, so an
/// environment whose policy can fail to reach a terminal state should be run
/// with a step cap on the trajectory generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SarsaLambda {
    pub lambda: f64,
}

impl SarsaLambda {
    pub fn new(lambda: f64) -> Result<Self> {
        validate_lambda(lambda)?;
        Ok(Self { lambda })
    }
}

impl Default for SarsaLambda {
    fn default() -> Self {
        Self { lambda: 0.5 }
    }
}

fn validate_lambda(lambda: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&lambda) {
        return Err(TabulaError::InvalidParameter(format!(
            "lambda must be in [0, 1], got {lambda}"
        )));
    }
    Ok(())
}

impl<E, Q> ControlAlgorithm<E, Q> for SarsaLambda
where
    E: FiniteEnvironment,
    Q: ValueStore<E::State, E::Action>,
{
    fn name(&self) -> &str {
        "sarsa_lambda"
    }

    fn run_episode(
        &mut self,
        env: &mut E,
        ctx: &mut TrainingContext<E::State, E::Action, Q>,
    ) -> Result<EpisodeOutcome> {
        let space = env.states();
        let index: HashMap<&E::State, usize> =
            space.iter().enumerate().map(|(i, s)| (s, i)).collect();
        let width = E::Action::action_space_size();
        let mut traces = vec![0.0; space.len() * width];

        let mut state = env.reset();
        let mut action = ctx.sample(&state)?;
        let mut steps = 0;
        let mut total = 0.0;

        loop {
            let transition = env.step(&state, action)?;
            steps += 1;
            total += transition.reward;

            let next = match transition.next_state {
                Some(next_state) => {
                    let next_action = ctx.sample(&next_state)?;
                    Some((next_state, next_action))
                }
                None => None,
            };

            let delta = transition.reward + ctx.q.successor_value(next.as_ref())
                - ctx.q.value(&state, action);

            let Some(&slot) = index.get(&state) else {
                return Err(TabulaError::InvalidParameter(format!(
                    "state {state:?} is outside the state space of {}",
                    env.name()
                )));
            };
            traces[slot * width + action.to_index()] += 1.0;
            let alpha = 1.0 / ctx.q.increment(&state, action) as f64;

            for (i, s) in space.iter().enumerate() {
                let row_traces = &mut traces[i * width..(i + 1) * width];
                // rows with no credit are left untouched
                if row_traces.iter().all(|e| *e == 0.0) {
                    continue;
                }
                for (entry, e) in ctx.q.row_mut(s).iter_mut().zip(row_traces.iter_mut()) {
                    entry.value += alpha * delta * *e;
                    *e *= self.lambda;
                }
            }
            ctx.improve(&state);

            match next {
                Some((next_state, next_action)) => {
                    ctx.generator.check(steps)?;
                    state = next_state;
                    action = next_action;
                }
                None => {
                    return Ok(EpisodeOutcome {
                        steps,
                        terminal_reward: transition.reward,
                        total_reward: total,
                    })
                }
            }
        }
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "lambda": self.lambda })
    }

    fn set_params(&mut self, params: serde_json::Value) -> Result<()> {
        if let Some(lambda) = params["lambda"].as_f64() {
            validate_lambda(lambda)?;
            self.lambda = lambda;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Glie, Policy};
    use crate::trajectory::TrajectoryGenerator;
    use crate::value::SparseTable;
    use float_eq::assert_float_eq;
    use tabula_core::Transition;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Dir {
        Left,
        Right,
    }

    impl DiscreteAction for Dir {
        const ALL: &'static [Self] = &[Dir::Left, Dir::Right];

        fn to_index(self) -> usize {
            self as usize
        }
    }

    /// Three-cell chain: Right from cell 2 ends the episode with +1, Left
    /// from cell 0 stays put
    struct Chain;

    impl Environment for Chain {
        type State = u8;
        type Action = Dir;

        fn name(&self) -> &str {
            "chain"
        }

        fn reset(&mut self) -> u8 {
            0
        }

        fn step(&mut self, state: &u8, action: Dir) -> Result<Transition<u8>> {
            Ok(match (state, action) {
                (2, Dir::Right) => Transition::terminal(1.0),
                (s, Dir::Right) => Transition::to(s + 1, 0.0),
                (s, Dir::Left) => Transition::to(s.saturating_sub(1), 0.0),
            })
        }
    }

    impl FiniteEnvironment for Chain {
        fn states(&self) -> Vec<u8> {
            vec![0, 1, 2]
        }
    }

    fn context(policy: Policy<u8, Dir>) -> TrainingContext<u8, Dir, SparseTable<u8, Dir>> {
        TrainingContext::new(SparseTable::new(), policy).with_seed(1)
    }

    #[test]
    fn test_monte_carlo_credits_terminal_return() {
        let mut ctx = context(Policy::always(Dir::Right));
        let mut mc = MonteCarlo::every_visit();
        let outcome =
            ControlAlgorithm::<Chain, _>::run_episode(&mut mc, &mut Chain, &mut ctx).unwrap();

        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.terminal_reward, 1.0);
        for s in 0..3 {
            assert_eq!(ctx.q.value(&s, Dir::Right), 1.0);
            assert_eq!(ctx.q.count(&s, Dir::Right), 1);
        }
    }

    #[test]
    fn test_sarsa_bootstraps_from_successor() {
        let mut ctx = context(Policy::always(Dir::Right));
        let mut sarsa = Sarsa;
        ControlAlgorithm::<Chain, _>::run_episode(&mut sarsa, &mut Chain, &mut ctx).unwrap();

        // first pass: only the last step sees the reward
        assert_eq!(ctx.q.value(&2, Dir::Right), 1.0);
        assert_eq!(ctx.q.value(&1, Dir::Right), 0.0);

        ctx.policy = Policy::always(Dir::Right);
        ControlAlgorithm::<Chain, _>::run_episode(&mut sarsa, &mut Chain, &mut ctx).unwrap();
        assert_float_eq!(ctx.q.value(&1, Dir::Right), 0.5, abs <= 1e-12);
        assert_eq!(ctx.q.count(&1, Dir::Right), 2);
    }

    #[test]
    fn test_full_trace_propagates_to_every_visited_pair() {
        let mut ctx = context(Policy::always(Dir::Right));
        let mut algo = SarsaLambda::new(1.0).unwrap();
        ControlAlgorithm::<Chain, _>::run_episode(&mut algo, &mut Chain, &mut ctx).unwrap();

        // alpha of the final step is 1 and traces never decay
        for s in 0..3 {
            assert_float_eq!(ctx.q.value(&s, Dir::Right), 1.0, abs <= 1e-12);
        }
    }

    #[test]
    fn test_zero_lambda_keeps_credit_local() {
        let mut ctx = context(Policy::always(Dir::Right));
        let mut algo = SarsaLambda::new(0.0).unwrap();
        ControlAlgorithm::<Chain, _>::run_episode(&mut algo, &mut Chain, &mut ctx).unwrap();

        assert_eq!(ctx.q.value(&2, Dir::Right), 1.0);
        assert_eq!(ctx.q.value(&0, Dir::Right), 0.0);
        assert_eq!(ctx.q.len(), 3);
    }

    #[test]
    fn test_lambda_bounds() {
        assert!(SarsaLambda::new(-0.1).is_err());
        assert!(SarsaLambda::new(1.1).is_err());
        assert!(SarsaLambda::new(f64::NAN).is_err());

        let mut algo = SarsaLambda::new(0.3).unwrap();
        let err = ControlAlgorithm::<Chain, SparseTable<u8, Dir>>::set_params(
            &mut algo,
            serde_json::json!({ "lambda": 2.0 }),
        );
        assert!(err.is_err());
        assert_eq!(algo.lambda, 0.3);
    }

    #[test]
    fn test_step_cap_aborts_sarsa() {
        // near-zero exploration keeps the agent pinned against the left wall
        let mut ctx = context(Policy::always(Dir::Left))
            .with_glie(Glie::new(1e-12).unwrap())
            .with_generator(TrajectoryGenerator::with_max_steps(25));
        let err = ControlAlgorithm::<Chain, _>::run_episode(&mut Sarsa, &mut Chain, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, TabulaError::EpisodeTimeout { steps: 25 }));
    }
}
