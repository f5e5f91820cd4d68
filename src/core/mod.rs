//! Core module - statistical parameters, errors, tracing, configuration

pub mod config;
pub mod error;
pub mod param;
pub mod trace;

pub use config::Config;
pub use error::ModelError;
pub use param::{BoundKind, Distribution, EvalMode, StatParam};
pub use trace::{NoopTrace, TraceSink};
