//! Environment and action contracts consumed by the control engine

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::Result;
use crate::Reward;

/// A finite, fixed-size action set with a canonical enumeration order
pub trait DiscreteAction: Copy + Eq + Hash + Debug + 'static {
    /// Every action, in canonical order
    const ALL: &'static [Self];

    /// Position of the action in [`DiscreteAction::ALL`]
    fn to_index(self) -> usize;

    /// Action at a given canonical position
    fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Number of discrete actions
    fn action_space_size() -> usize {
        Self::ALL.len()
    }
}

/// Outcome of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    /// Successor state, `None` when the episode terminated
    pub next_state: Option<S>,
    pub reward: Reward,
}

impl<S> Transition<S> {
    pub fn to(next_state: S, reward: Reward) -> Self {
        Self {
            next_state: Some(next_state),
            reward,
        }
    }

    pub fn terminal(reward: Reward) -> Self {
        Self {
            next_state: None,
            reward,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_state.is_none()
    }
}

/// An episodic MDP simulator.
///
/// Implementations hold no cross-call state besides their own random
/// source: `step` is a function of `(state, action)` and that source only.
pub trait Environment {
    type State: Clone + Eq + Hash + Debug;
    type Action: DiscreteAction;

    /// Environment name, used in logs and reports
    fn name(&self) -> &str;

    /// Draw an initial non-terminal state
    fn reset(&mut self) -> Self::State;

    /// Apply `action` in `state`.
    ///
    /// Stepping from a terminal state is a contract violation and returns
    /// [`crate::TabulaError::TerminalTransition`].
    fn step(&mut self, state: &Self::State, action: Self::Action) -> Result<Transition<Self::State>>;
}

/// Environment whose non-terminal state space can be enumerated
pub trait FiniteEnvironment: Environment {
    /// Every non-terminal state
    fn states(&self) -> Vec<Self::State>;
}

/// Injective encoding of a state into `0..CAPACITY`
pub trait DenseIndex: Sized {
    const CAPACITY: usize;

    fn dense_index(&self) -> usize;

    fn from_dense_index(index: usize) -> Option<Self>;
}
