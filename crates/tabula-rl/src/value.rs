//! Value stores: Q(s, a) estimates and visit counts N(s, a)

use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use tabula_core::{DenseIndex, DiscreteAction};

/// Estimate and visit count for one (state, action) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub value: f64,
    pub count: u64,
}

/// Mapping state -> action -> (estimate, visit count).
///
/// Rows are indexed by [`DiscreteAction::to_index`]. Missing rows and
/// terminal successors read as estimate 0 with count 0.
pub trait ValueStore<S, A: DiscreteAction> {
    /// Row for `state`, if one exists
    fn row(&self, state: &S) -> Option<&[ActionValue]>;

    /// Row for `state`, created zeroed on first access
    fn row_mut(&mut self, state: &S) -> &mut [ActionValue];

    /// States holding a row
    fn states(&self) -> Vec<S>;

    fn value(&self, state: &S, action: A) -> f64 {
        self.row(state).map_or(0.0, |row| row[action.to_index()].value)
    }

    /// Q(s', a'), or 0 when the successor is terminal
    fn successor_value(&self, next: Option<&(S, A)>) -> f64 {
        next.map_or(0.0, |(state, action)| self.value(state, *action))
    }

    fn count(&self, state: &S, action: A) -> u64 {
        self.row(state).map_or(0, |row| row[action.to_index()].count)
    }

    /// N(s): total visits across all actions
    fn visits(&self, state: &S) -> u64 {
        self.row(state)
            .map_or(0, |row| row.iter().map(|entry| entry.count).sum())
    }

    /// Increment N(s, a) and return the new count
    fn increment(&mut self, state: &S, action: A) -> u64 {
        let entry = &mut self.row_mut(state)[action.to_index()];
        entry.count += 1;
        entry.count
    }

    /// `Q += (1 / N) * (target - Q)` with N incremented first; returns the
    /// new estimate.
    ///
    /// After k calls with targets `G_1..G_k` the estimate is their mean.
    fn update_mean(&mut self, state: &S, action: A, target: f64) -> f64 {
        let entry = &mut self.row_mut(state)[action.to_index()];
        entry.count += 1;
        let alpha = 1.0 / entry.count as f64;
        entry.value += alpha * (target - entry.value);
        entry.value
    }

    /// Action with the highest estimate; ties go to the first action in
    /// canonical order
    fn greedy_action(&self, state: &S) -> A {
        let mut best = A::ALL[0];
        let mut best_value = self.value(state, best);
        for &action in &A::ALL[1..] {
            let value = self.value(state, action);
            if value > best_value {
                best = action;
                best_value = value;
            }
        }
        best
    }

    /// max_a Q(s, a), if the state has a row
    fn best_value(&self, state: &S) -> Option<f64> {
        self.row(state).map(|row| {
            row.iter()
                .map(|entry| entry.value)
                .fold(f64::NEG_INFINITY, f64::max)
        })
    }
}

/// Lazily populated hash-map store for arbitrary hashable states
#[derive(Debug, Clone)]
pub struct SparseTable<S, A> {
    rows: HashMap<S, Vec<ActionValue>>,
    _actions: PhantomData<A>,
}

impl<S: Eq + Hash + Clone, A: DiscreteAction> SparseTable<S, A> {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
            _actions: PhantomData,
        }
    }

    /// Eagerly create a zeroed row for every state
    pub fn with_states(states: impl IntoIterator<Item = S>) -> Self {
        let mut table = Self::new();
        for state in states {
            table.row_mut(&state);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<S: Eq + Hash + Clone, A: DiscreteAction> Default for SparseTable<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Eq + Hash + Clone, A: DiscreteAction> ValueStore<S, A> for SparseTable<S, A> {
    fn row(&self, state: &S) -> Option<&[ActionValue]> {
        self.rows.get(state).map(Vec::as_slice)
    }

    fn row_mut(&mut self, state: &S) -> &mut [ActionValue] {
        self.rows
            .entry(state.clone())
            .or_insert_with(|| vec![ActionValue::default(); A::action_space_size()])
    }

    fn states(&self) -> Vec<S> {
        self.rows.keys().cloned().collect()
    }
}

/// Fixed-size store over a densely indexed state space.
///
/// Every row exists from construction; `states` reports rows written so far.
#[derive(Debug, Clone)]
pub struct DenseTable<S, A> {
    entries: Vec<ActionValue>,
    written: Vec<bool>,
    _marker: PhantomData<(S, A)>,
}

impl<S: DenseIndex, A: DiscreteAction> DenseTable<S, A> {
    pub fn new() -> Self {
        Self {
            entries: vec![ActionValue::default(); S::CAPACITY * A::action_space_size()],
            written: vec![false; S::CAPACITY],
            _marker: PhantomData,
        }
    }

    fn span(state: &S) -> std::ops::Range<usize> {
        let width = A::action_space_size();
        let start = state.dense_index() * width;
        start..start + width
    }
}

impl<S: DenseIndex, A: DiscreteAction> Default for DenseTable<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DenseIndex, A: DiscreteAction> ValueStore<S, A> for DenseTable<S, A> {
    fn row(&self, state: &S) -> Option<&[ActionValue]> {
        self.entries.get(Self::span(state))
    }

    fn row_mut(&mut self, state: &S) -> &mut [ActionValue] {
        self.written[state.dense_index()] = true;
        &mut self.entries[Self::span(state)]
    }

    fn states(&self) -> Vec<S> {
        self.written
            .iter()
            .enumerate()
            .filter(|(_, &written)| written)
            .filter_map(|(i, _)| S::from_dense_index(i))
            .collect()
    }
}
