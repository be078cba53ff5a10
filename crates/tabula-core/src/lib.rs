//! Tabula Core - Core types and traits shared by every Tabula crate
//!
//! This crate defines the contract between environments and the
//! tabular control engine: actions, transitions, episodes and errors.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod environment;
pub mod episode;
pub mod error;

pub use environment::{DenseIndex, DiscreteAction, Environment, FiniteEnvironment, Transition};
pub use episode::{Episode, Step};
pub use error::{Result, TabulaError};

/// Reward value from an environment
pub type Reward = f64;
