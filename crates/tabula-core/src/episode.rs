//! Episodes: ordered (state, action, reward) trajectories

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::Reward;

/// A single (s, a, r) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step<S, A> {
    pub state: S,
    pub action: A,
    pub reward: Reward,
}

impl<S, A> Step<S, A> {
    pub fn new(state: S, action: A, reward: Reward) -> Self {
        Self {
            state,
            action,
            reward,
        }
    }
}

/// One complete run from an initial to a terminal state.
///
/// Append-only while it is generated, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode<S, A> {
    steps: Vec<Step<S, A>>,
}

impl<S, A> Episode<S, A> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn push(&mut self, step: Step<S, A>) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step<S, A>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step<S, A>> {
        self.steps.iter()
    }

    /// Reward of the final transition
    pub fn terminal_reward(&self) -> Option<Reward> {
        self.steps.last().map(|step| step.reward)
    }

    /// Sum of all rewards
    pub fn total_reward(&self) -> Reward {
        self.steps.iter().map(|step| step.reward).sum()
    }

    /// Undiscounted return from every step to the end, accumulated backward
    pub fn returns(&self) -> Vec<Reward> {
        let mut returns = vec![0.0; self.steps.len()];
        let mut g = 0.0;
        for (t, step) in self.steps.iter().enumerate().rev() {
            g += step.reward;
            returns[t] = g;
        }
        returns
    }

    /// Same returns as [`Episode::returns`], derived forward from cumulative
    /// reward totals: `G_t = total - sum(r_0..r_{t-1})`
    pub fn returns_from_totals(&self) -> Vec<Reward> {
        let total = self.total_reward();
        let mut seen = 0.0;
        self.steps
            .iter()
            .map(|step| {
                let g = total - seen;
                seen += step.reward;
                g
            })
            .collect()
    }
}

impl<S: Eq + Hash + Clone, A: Eq + Hash + Copy> Episode<S, A> {
    /// For each step, whether it is the first occurrence of its
    /// (state, action) pair in the episode
    pub fn first_visits(&self) -> Vec<bool> {
        let mut seen = HashSet::with_capacity(self.steps.len());
        self.steps
            .iter()
            .map(|step| seen.insert((step.state.clone(), step.action)))
            .collect()
    }
}

impl<S, A> Default for Episode<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A> FromIterator<Step<S, A>> for Episode<S, A> {
    fn from_iter<I: IntoIterator<Item = Step<S, A>>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl<'a, S, A> IntoIterator for &'a Episode<S, A> {
    type Item = &'a Step<S, A>;
    type IntoIter = std::slice::Iter<'a, Step<S, A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
