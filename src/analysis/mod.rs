//! Budget evaluation and Monte Carlo analysis
//!
//! [`PowerTree::budget`](crate::model::PowerTree::budget) performs a single
//! evaluation pass; [`MonteCarlo`] repeats passes with sampled parameters
//! and reduces them to [`SampleStats`].

pub mod budget;
pub mod monte_carlo;

pub use budget::{NodeReading, Overload, SourceBudget};
pub use monte_carlo::{MonteCarlo, MonteCarloSummary, SampleStats};
