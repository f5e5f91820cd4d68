//! PBT: Power Budget Toolkit
//!
//! A toolkit for steady-state power-budget analysis of DC distribution
//! trees described as plain-text netlists. Sources feed load switches and
//! loads; every electrical parameter carries optional bounds and a
//! distribution, so the same tree evaluates nominally or by Monte Carlo
//! sampling.

pub mod analysis;
pub mod cli;
pub mod core;
pub mod model;
