//! Behavior policy, GLIE exploration schedule and epsilon-greedy improvement

use std::collections::HashMap;
use std::hash::Hash;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use tabula_core::{DiscreteAction, Result, TabulaError};

use crate::value::ValueStore;

/// Distribution used for states the policy has no entry for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback<A> {
    /// Uniformly random over the action set
    Uniform,
    /// Always the given action
    Always(A),
}

/// Mapping state -> distribution over actions.
///
/// Weights are indexed by [`DiscreteAction::to_index`].
#[derive(Debug, Clone)]
pub struct Policy<S, A> {
    table: HashMap<S, Vec<f64>>,
    fallback: Fallback<A>,
}

impl<S: Eq + Hash + Clone, A: DiscreteAction> Policy<S, A> {
    /// Empty policy falling back to uniform-random
    pub fn new() -> Self {
        Self::with_fallback(Fallback::Uniform)
    }

    pub fn with_fallback(fallback: Fallback<A>) -> Self {
        Self {
            table: HashMap::new(),
            fallback,
        }
    }

    /// Deterministic policy choosing `action` everywhere
    pub fn always(action: A) -> Self {
        Self::with_fallback(Fallback::Always(action))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains(&self, state: &S) -> bool {
        self.table.contains_key(state)
    }

    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.table.keys()
    }

    /// Replace the distribution for `state`
    pub fn set(&mut self, state: S, weights: Vec<f64>) -> Result<()> {
        if weights.len() != A::action_space_size() {
            return Err(TabulaError::InvalidPolicy(format!(
                "expected {} weights, got {}",
                A::action_space_size(),
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(TabulaError::InvalidPolicy(format!(
                "weights must be finite and non-negative: {weights:?}"
            )));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(TabulaError::InvalidPolicy(format!(
                "weights must sum to 1, got {total}"
            )));
        }
        self.table.insert(state, weights);
        Ok(())
    }

    /// Action probabilities for `state`, including the fallback case
    pub fn distribution(&self, state: &S) -> Vec<f64> {
        if let Some(weights) = self.table.get(state) {
            return weights.clone();
        }
        let n = A::action_space_size();
        match self.fallback {
            Fallback::Uniform => vec![1.0 / n as f64; n],
            Fallback::Always(action) => {
                let mut weights = vec![0.0; n];
                weights[action.to_index()] = 1.0;
                weights
            }
        }
    }

    pub fn probability(&self, state: &S, action: A) -> f64 {
        match self.table.get(state) {
            Some(weights) => weights[action.to_index()],
            None => self.distribution(state)[action.to_index()],
        }
    }

    /// Draw an action for `state`
    pub fn sample<R: Rng + ?Sized>(&self, state: &S, rng: &mut R) -> Result<A> {
        let Some(weights) = self.table.get(state) else {
            return Ok(match self.fallback {
                Fallback::Uniform => *A::ALL
                    .choose(rng)
                    .ok_or_else(|| TabulaError::InvalidPolicy("empty action set".to_string()))?,
                Fallback::Always(action) => action,
            });
        };
        let dist = WeightedIndex::new(weights)
            .map_err(|e| TabulaError::InvalidPolicy(format!("{e}: {weights:?}")))?;
        Ok(A::ALL[dist.sample(rng)])
    }

    /// Most probable action for `state` (first in canonical order on ties)
    pub fn mode(&self, state: &S) -> A {
        let weights = self.distribution(state);
        let mut best = 0;
        for (i, w) in weights.iter().enumerate().skip(1) {
            if *w > weights[best] {
                best = i;
            }
        }
        A::ALL[best]
    }

    /// Epsilon-greedy improvement of `state` with respect to `q`
    pub fn improve<Q: ValueStore<S, A>>(&mut self, state: &S, q: &Q, epsilon: f64) {
        improve(self, state, q, epsilon);
    }
}

impl<S: Eq + Hash + Clone, A: DiscreteAction> Default for Policy<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write an epsilon-greedy distribution for `state` into `policy`.
///
/// The greedy action (first maximum of `q[state]` in canonical order) gets
/// `1 - epsilon + epsilon / |A|`, every other action `epsilon / |A|`.
pub fn improve<S, A, Q>(policy: &mut Policy<S, A>, state: &S, q: &Q, epsilon: f64)
where
    S: Eq + Hash + Clone,
    A: DiscreteAction,
    Q: ValueStore<S, A>,
{
    let epsilon = epsilon.clamp(0.0, 1.0);
    let n = A::action_space_size();
    let greedy = q.greedy_action(state).to_index();
    let explore = epsilon / n as f64;
    let weights = (0..n)
        .map(|i| {
            if i == greedy {
                1.0 - epsilon + explore
            } else {
                explore
            }
        })
        .collect();
    policy.table.insert(state.clone(), weights);
}

/// Greedy-in-the-limit exploration schedule `epsilon = n0 / (n0 + N(s))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glie {
    pub n0: f64,
}

impl Glie {
    pub fn new(n0: f64) -> Result<Self> {
        if !n0.is_finite() || n0 <= 0.0 {
            return Err(TabulaError::InvalidParameter(format!(
                "n0 must be positive, got {n0}"
            )));
        }
        Ok(Self { n0 })
    }

    pub fn epsilon(&self, visits: u64) -> f64 {
        self.n0 / (self.n0 + visits as f64)
    }
}

impl Default for Glie {
    fn default() -> Self {
        Self { n0: 100.0 }
    }
}

/// Deterministic greedy policy extracted from `q` for every state it holds
pub fn greedy_policy<S, A, Q>(q: &Q) -> Policy<S, A>
where
    S: Eq + Hash + Clone,
    A: DiscreteAction,
    Q: ValueStore<S, A>,
{
    let mut policy = Policy::new();
    for state in q.states() {
        improve(&mut policy, &state, q, 0.0);
    }
    policy
}
