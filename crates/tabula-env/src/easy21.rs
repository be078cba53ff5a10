//! Easy21: a stochastic blackjack variant
//!
//! Cards are drawn with replacement from `1..=card_max`; a card is red
//! (subtracted) with probability `red_probability`, black (added) otherwise.
//! The player hits or sticks; on stick the dealer draws until reaching
//! `dealer_stick`. Any sum outside `min_sum..=max_sum` is a bust.

use std::fmt;

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use tabula_core::{
    DenseIndex, DiscreteAction, Environment, FiniteEnvironment, Result, TabulaError, Transition,
};

/// Largest card value any rule set may use
pub const MAX_CARD: i32 = 11;

/// Largest non-bust sum any rule set may use
pub const MAX_SUM: i32 = 21;

/// Game rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Easy21Rules {
    pub card_max: i32,
    pub red_probability: f64,
    pub dealer_stick: i32,
    pub min_sum: i32,
    pub max_sum: i32,
}

impl Default for Easy21Rules {
    fn default() -> Self {
        Self {
            card_max: 10,
            red_probability: 1.0 / 3.0,
            dealer_stick: 17,
            min_sum: 1,
            max_sum: 21,
        }
    }
}

impl Easy21Rules {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CARD).contains(&self.card_max) {
            return Err(TabulaError::InvalidParameter(format!(
                "card_max must be in 1..={MAX_CARD}, got {}",
                self.card_max
            )));
        }
        if !(0.0..=1.0).contains(&self.red_probability) {
            return Err(TabulaError::InvalidParameter(format!(
                "red_probability must be in [0, 1], got {}",
                self.red_probability
            )));
        }
        if self.min_sum < 1 || self.max_sum > MAX_SUM || self.min_sum > self.max_sum {
            return Err(TabulaError::InvalidParameter(format!(
                "sum bounds must satisfy 1 <= min_sum <= max_sum <= {MAX_SUM}, got {}..={}",
                self.min_sum, self.max_sum
            )));
        }
        if self.card_max > self.max_sum {
            return Err(TabulaError::InvalidParameter(format!(
                "card_max {} exceeds max_sum {}",
                self.card_max, self.max_sum
            )));
        }
        if self.min_sum > self.card_max {
            return Err(TabulaError::InvalidParameter(format!(
                "min_sum {} exceeds card_max {}, no opening hand is playable",
                self.min_sum, self.card_max
            )));
        }
        Ok(())
    }

    pub fn is_bust(&self, sum: i32) -> bool {
        sum < self.min_sum || sum > self.max_sum
    }
}

/// Player decision point: the dealer's face-up card and the player's sum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct State {
    pub dealer_card: i32,
    pub player_sum: i32,
}

impl State {
    pub fn new(dealer_card: i32, player_sum: i32) -> Self {
        Self {
            dealer_card,
            player_sum,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dealer={}, player={})", self.dealer_card, self.player_sum)
    }
}

impl DenseIndex for State {
    const CAPACITY: usize = (MAX_CARD * MAX_SUM) as usize;

    fn dense_index(&self) -> usize {
        debug_assert!((1..=MAX_CARD).contains(&self.dealer_card));
        debug_assert!((1..=MAX_SUM).contains(&self.player_sum));
        ((self.dealer_card - 1) * MAX_SUM + (self.player_sum - 1)) as usize
    }

    fn from_dense_index(index: usize) -> Option<Self> {
        if index >= Self::CAPACITY {
            return None;
        }
        let index = index as i32;
        Some(Self::new(index / MAX_SUM + 1, index % MAX_SUM + 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Hit,
    Stick,
}

impl DiscreteAction for Action {
    const ALL: &'static [Self] = &[Action::Hit, Action::Stick];

    fn to_index(self) -> usize {
        match self {
            Action::Hit => 0,
            Action::Stick => 1,
        }
    }
}

/// Easy21 simulator with its own random source
pub struct Easy21 {
    rules: Easy21Rules,
    rng: StdRng,
}

impl Easy21 {
    pub fn new(rules: Easy21Rules) -> Result<Self> {
        Self::with_rng(rules, StdRng::from_entropy())
    }

    pub fn seeded(rules: Easy21Rules, seed: u64) -> Result<Self> {
        Self::with_rng(rules, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rules: Easy21Rules, rng: StdRng) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules, rng })
    }

    pub fn rules(&self) -> &Easy21Rules {
        &self.rules
    }

    /// Draw a signed card value
    pub fn draw_card(&mut self) -> i32 {
        let value = self.draw_black();
        if self.rng.gen_bool(self.rules.red_probability) {
            -value
        } else {
            value
        }
    }

    fn draw_black(&mut self) -> i32 {
        self.rng.gen_range(1..=self.rules.card_max)
    }

    /// Play out the dealer's hand; `None` if the dealer busts
    pub fn play_dealer(&mut self, dealer_card: i32) -> Option<i32> {
        let mut dealer_sum = dealer_card;
        while dealer_sum < self.rules.dealer_stick {
            dealer_sum += self.draw_card();
            if self.rules.is_bust(dealer_sum) {
                return None;
            }
        }
        Some(dealer_sum)
    }
}

impl Default for Easy21 {
    fn default() -> Self {
        Self {
            rules: Easy21Rules::default(),
            rng: StdRng::from_entropy(),
        }
    }
}

impl Environment for Easy21 {
    type State = State;
    type Action = Action;

    fn name(&self) -> &str {
        "easy21"
    }

    fn reset(&mut self) -> State {
        let dealer_card = self.draw_black();
        // opening hands below the floor would already be bust
        let player_sum = self.rng.gen_range(self.rules.min_sum..=self.rules.card_max);
        State::new(dealer_card, player_sum)
    }

    fn step(&mut self, state: &State, action: Action) -> Result<Transition<State>> {
        match action {
            Action::Hit => {
                let card = self.draw_card();
                let player_sum = state.player_sum + card;
                trace!(%state, card, player_sum, "hit");
                if self.rules.is_bust(player_sum) {
                    return Ok(Transition::terminal(-1.0));
                }
                Ok(Transition::to(State::new(state.dealer_card, player_sum), 0.0))
            }
            Action::Stick => {
                let Some(dealer_sum) = self.play_dealer(state.dealer_card) else {
                    trace!(%state, "dealer bust");
                    return Ok(Transition::terminal(1.0));
                };
                trace!(%state, dealer_sum, "stick");
                let reward = match state.player_sum.cmp(&dealer_sum) {
                    std::cmp::Ordering::Greater => 1.0,
                    std::cmp::Ordering::Equal => 0.0,
                    std::cmp::Ordering::Less => -1.0,
                };
                Ok(Transition::terminal(reward))
            }
        }
    }
}

impl FiniteEnvironment for Easy21 {
    fn states(&self) -> Vec<State> {
        (1..=self.rules.card_max)
            .flat_map(|dealer| {
                (self.rules.min_sum..=self.rules.max_sum).map(move |player| State::new(dealer, player))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_black_ones() -> Easy21Rules {
        Easy21Rules {
            card_max: 1,
            red_probability: 0.0,
            ..Easy21Rules::default()
        }
    }

    #[test]
    fn test_default_rules_are_valid() {
        assert!(Easy21Rules::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let rules = Easy21Rules {
            card_max: 12,
            ..Easy21Rules::default()
        };
        assert!(matches!(
            Easy21::new(rules),
            Err(TabulaError::InvalidParameter(_))
        ));

        let rules = Easy21Rules {
            red_probability: 1.5,
            ..Easy21Rules::default()
        };
        assert!(Easy21::new(rules).is_err());

        let rules = Easy21Rules {
            min_sum: 0,
            ..Easy21Rules::default()
        };
        assert!(Easy21::new(rules).is_err());
    }

    #[test]
    fn test_reset_draws_black_cards() {
        let mut env = Easy21::seeded(Easy21Rules::default(), 7).unwrap();
        for _ in 0..500 {
            let s = env.reset();
            assert!((1..=10).contains(&s.dealer_card));
            assert!((1..=10).contains(&s.player_sum));
        }
    }

    #[test]
    fn test_reset_respects_min_sum() {
        let rules = Easy21Rules {
            min_sum: 5,
            ..Easy21Rules::default()
        };
        let mut env = Easy21::seeded(rules, 1).unwrap();
        let states = env.states();
        for _ in 0..1000 {
            let s = env.reset();
            assert!(!env.rules().is_bust(s.player_sum), "bust opening hand {s}");
            assert!(states.contains(&s), "{s} outside the state space");
        }
    }

    #[test]
    fn test_min_sum_above_card_max_rejected() {
        let rules = Easy21Rules {
            min_sum: 11,
            ..Easy21Rules::default()
        };
        assert!(matches!(
            Easy21::new(rules),
            Err(TabulaError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_hit_adds_card() {
        let mut env = Easy21::seeded(only_black_ones(), 1).unwrap();
        let t = env.step(&State::new(5, 12), Action::Hit).unwrap();
        assert_eq!(t.next_state, Some(State::new(5, 13)));
        assert_eq!(t.reward, 0.0);
    }

    #[test]
    fn test_hit_bust_above_max() {
        let mut env = Easy21::seeded(only_black_ones(), 1).unwrap();
        let t = env.step(&State::new(5, 21), Action::Hit).unwrap();
        assert!(t.is_terminal());
        assert_eq!(t.reward, -1.0);
    }

    #[test]
    fn test_hit_bust_below_min() {
        let rules = Easy21Rules {
            card_max: 1,
            red_probability: 1.0,
            ..Easy21Rules::default()
        };
        let mut env = Easy21::seeded(rules, 1).unwrap();
        let t = env.step(&State::new(5, 1), Action::Hit).unwrap();
        assert!(t.is_terminal());
        assert_eq!(t.reward, -1.0);
    }

    #[test]
    fn test_stick_comparison() {
        // dealer draws +1 cards from 10 up to exactly 17
        let mut env = Easy21::seeded(only_black_ones(), 1).unwrap();
        assert_eq!(env.step(&State::new(10, 20), Action::Stick).unwrap().reward, 1.0);
        assert_eq!(env.step(&State::new(10, 17), Action::Stick).unwrap().reward, 0.0);
        assert_eq!(env.step(&State::new(10, 16), Action::Stick).unwrap().reward, -1.0);
    }

    #[test]
    fn test_dealer_bust_pays_player() {
        let rules = Easy21Rules {
            card_max: 1,
            red_probability: 1.0,
            ..Easy21Rules::default()
        };
        let mut env = Easy21::seeded(rules, 1).unwrap();
        assert_eq!(env.play_dealer(1), None);
        let t = env.step(&State::new(1, 2), Action::Stick).unwrap();
        assert_eq!(t.reward, 1.0);
    }

    #[test]
    fn test_red_card_frequency() {
        let mut env = Easy21::seeded(Easy21Rules::default(), 42).unwrap();
        let n = 30_000;
        let red = (0..n).filter(|_| env.draw_card() < 0).count();
        let freq = red as f64 / n as f64;
        assert!((freq - 1.0 / 3.0).abs() < 0.02, "red frequency {freq}");
    }

    #[test]
    fn test_seeded_environments_agree() {
        let mut a = Easy21::seeded(Easy21Rules::default(), 99).unwrap();
        let mut b = Easy21::seeded(Easy21Rules::default(), 99).unwrap();
        for _ in 0..100 {
            assert_eq!(a.reset(), b.reset());
            assert_eq!(a.draw_card(), b.draw_card());
        }
    }

    #[test]
    fn test_state_space() {
        let env = Easy21::default();
        let states = env.states();
        assert_eq!(states.len(), 10 * 21);
        assert!(states.contains(&State::new(10, 21)));
        assert!(!states.contains(&State::new(11, 21)));
    }

    #[test]
    fn test_dense_index_is_injective() {
        let mut seen = vec![false; State::CAPACITY];
        for dealer in 1..=MAX_CARD {
            for player in 1..=MAX_SUM {
                let s = State::new(dealer, player);
                let i = s.dense_index();
                assert!(!seen[i]);
                seen[i] = true;
                assert_eq!(State::from_dense_index(i), Some(s));
            }
        }
        assert!(seen.iter().all(|&x| x));
        assert_eq!(State::from_dense_index(State::CAPACITY), None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::new(10, 20).to_string(), "(dealer=10, player=20)");
    }
}
