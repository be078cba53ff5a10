//! Tabula Env - Environments for tabular control
//!
//! Two toy MDPs: the stochastic Easy21 card game and a deterministic
//! gridworld, plus dynamic-programming planners for the gridworld.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]

pub mod easy21;
pub mod gridworld;

pub use easy21::{Easy21, Easy21Rules};
pub use gridworld::{Cell, GridSpec, GridWorld, Move, Start};
