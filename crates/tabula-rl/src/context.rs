//! Per-run training state shared by the control algorithms

use std::hash::Hash;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use tabula_core::{DiscreteAction, Environment, Episode, Result};

use crate::policy::{improve, Glie, Policy};
use crate::trajectory::TrajectoryGenerator;
use crate::value::ValueStore;

/// Training parameters shared by every algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// GLIE exploration constant
    pub n0: f64,
    /// Seed for the policy-sampling random stream
    pub seed: Option<u64>,
    /// Episode step cap; exceeding it aborts the run
    pub max_episode_steps: Option<usize>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            n0: 100.0,
            seed: None,
            max_episode_steps: None,
        }
    }
}

/// Value Store, Behavior Policy and exploration state owned by one run
pub struct TrainingContext<S, A, Q> {
    pub q: Q,
    pub policy: Policy<S, A>,
    pub glie: Glie,
    pub generator: TrajectoryGenerator,
    rng: StdRng,
}

impl<S, A, Q> TrainingContext<S, A, Q>
where
    S: Eq + Hash + Clone,
    A: DiscreteAction,
    Q: ValueStore<S, A>,
{
    pub fn new(q: Q, policy: Policy<S, A>) -> Self {
        Self {
            q,
            policy,
            glie: Glie::default(),
            generator: TrajectoryGenerator::default(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_params(q: Q, policy: Policy<S, A>, params: &TrainingParams) -> Result<Self> {
        let mut ctx = Self::new(q, policy).with_glie(Glie::new(params.n0)?);
        ctx.generator = TrajectoryGenerator {
            max_steps: params.max_episode_steps,
        };
        if let Some(seed) = params.seed {
            ctx = ctx.with_seed(seed);
        }
        Ok(ctx)
    }

    pub fn with_glie(mut self, glie: Glie) -> Self {
        self.glie = glie;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_generator(mut self, generator: TrajectoryGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Draw an action from the behavior policy
    pub fn sample(&mut self, state: &S) -> Result<A> {
        self.policy.sample(state, &mut self.rng)
    }

    /// Current GLIE epsilon for `state`
    pub fn epsilon(&self, state: &S) -> f64 {
        self.glie.epsilon(self.q.visits(state))
    }

    /// Refresh the behavior policy for `state` from the current estimates
    pub fn improve(&mut self, state: &S) {
        let epsilon = self.epsilon(state);
        improve(&mut self.policy, state, &self.q, epsilon);
    }

    /// Generate a full episode under the behavior policy
    pub fn generate<E>(&mut self, env: &mut E) -> Result<Episode<S, A>>
    where
        E: Environment<State = S, Action = A>,
    {
        self.generator.generate(env, &self.policy, &mut self.rng)
    }

    pub fn into_parts(self) -> (Q, Policy<S, A>) {
        (self.q, self.policy)
    }
}

impl<S, A, Q> Default for TrainingContext<S, A, Q>
where
    S: Eq + Hash + Clone,
    A: DiscreteAction,
    Q: ValueStore<S, A> + Default,
{
    fn default() -> Self {
        Self::new(Q::default(), Policy::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SparseTable;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Coin {
        Heads,
        Tails,
    }

    impl DiscreteAction for Coin {
        const ALL: &'static [Self] = &[Coin::Heads, Coin::Tails];

        fn to_index(self) -> usize {
            self as usize
        }
    }

    type CoinContext = TrainingContext<u8, Coin, SparseTable<u8, Coin>>;

    #[test]
    fn test_from_params() {
        let params = TrainingParams {
            n0: 10.0,
            seed: Some(3),
            max_episode_steps: Some(7),
        };
        let ctx: CoinContext =
            TrainingContext::from_params(SparseTable::new(), Policy::new(), &params).unwrap();
        assert_eq!(ctx.glie.n0, 10.0);
        assert_eq!(ctx.generator.max_steps, Some(7));
    }

    #[test]
    fn test_from_params_rejects_bad_n0() {
        let params = TrainingParams {
            n0: 0.0,
            ..TrainingParams::default()
        };
        let ctx: Result<CoinContext> =
            TrainingContext::from_params(SparseTable::new(), Policy::new(), &params);
        assert!(ctx.is_err());
    }

    #[test]
    fn test_improve_uses_state_visits() {
        let mut ctx = CoinContext::default();
        assert_eq!(ctx.epsilon(&0), 1.0);
        for _ in 0..100 {
            ctx.q.update_mean(&0, Coin::Heads, 1.0);
        }
        // n0 = 100 and N(s) = 100
        assert_eq!(ctx.epsilon(&0), 0.5);
        ctx.improve(&0);
        assert_eq!(ctx.policy.probability(&0, Coin::Heads), 0.75);
        assert_eq!(ctx.policy.probability(&0, Coin::Tails), 0.25);
        assert_eq!(ctx.epsilon(&1), 1.0);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let mut a = CoinContext::default().with_seed(5);
        let mut b = CoinContext::default().with_seed(5);
        let draws: Vec<Coin> = (0..50).map(|_| a.sample(&0).unwrap()).collect();
        for &expected in &draws {
            assert_eq!(b.sample(&0).unwrap(), expected);
        }
        assert!(draws.contains(&Coin::Heads));
        assert!(draws.contains(&Coin::Tails));
    }
}
