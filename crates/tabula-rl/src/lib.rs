//! Tabula RL - Tabular model-free control
//!
//! This crate provides Monte Carlo, SARSA and SARSA(lambda) control over
//! any [`tabula_core::Environment`], GLIE epsilon-greedy policy improvement,
//! and the evaluation helpers used to compare learned value functions.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod algorithm;
pub mod context;
pub mod engine;
pub mod evaluation;
pub mod policy;
pub mod trajectory;
pub mod value;

pub use algorithm::{ControlAlgorithm, EpisodeOutcome, MonteCarlo, Sarsa, SarsaLambda};
pub use context::{TrainingContext, TrainingParams};
pub use engine::{
    monte_carlo, sarsa, sarsa_lambda, train, ControlEngine, EngineStats, TrainingReport,
};
pub use evaluation::{
    lambda_sweep, simulate, simulate_with, squared_error, value_surface, SweepPoint, Tally,
};
pub use policy::{greedy_policy, improve, Fallback, Glie, Policy};
pub use trajectory::TrajectoryGenerator;
pub use value::{ActionValue, DenseTable, SparseTable, ValueStore};
