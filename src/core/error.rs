//! Typed errors for model construction and evaluation

use thiserror::Error;

/// Errors raised while building or evaluating a power model.
///
/// Overload findings are not errors: a pass that detects demand above a
/// source's rating still completes and reports the condition on the budget.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A constructor argument failed a shape or range check.
    #[error("invalid argument for {context}: {reason}")]
    Validation { context: String, reason: String },

    /// Fields that are individually valid but inconsistent with each other.
    #[error("inconsistent configuration for {context}: {reason}")]
    Configuration { context: String, reason: String },

    /// Attaching the component would make it a descendant of itself.
    #[error("component {child_id} cannot be added under {parent_id}: it is an ancestor of that node")]
    Cycle { child_id: u32, parent_id: u32 },

    /// No physically meaningful operating point exists for the model.
    #[error("no operating point for {context}: {reason}")]
    Unsolvable { context: String, reason: String },
}

impl ModelError {
    pub fn validation(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::Validation {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::Configuration {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn unsolvable(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::Unsolvable {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
