//! Statistical parameters
//!
//! Every numeric quantity on a component (a voltage, a current rating, a
//! resistance) is a `StatParam`: a named value with units, a nominal, and an
//! optional bounded distribution for Monte Carlo evaluation. Parameters are
//! immutable after construction and are read through [`StatParam::get_value`].

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::ModelError;

/// How a parameter is evaluated during an analysis pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMode {
    /// Use the stored nominal value
    Nominal,
    /// Draw one sample from the configured distribution
    MonteCarlo,
}

impl Default for EvalMode {
    fn default() -> Self {
        EvalMode::Nominal
    }
}

impl fmt::Display for EvalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalMode::Nominal => write!(f, "nominal"),
            EvalMode::MonteCarlo => write!(f, "monte_carlo"),
        }
    }
}

impl FromStr for EvalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nominal" | "nom" => Ok(EvalMode::Nominal),
            "monte_carlo" | "monte-carlo" | "mc" => Ok(EvalMode::MonteCarlo),
            _ => Err(format!("Invalid evaluation mode: {}", s)),
        }
    }
}

/// How low/high bounds are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    /// Bounds are absolute values in the parameter's own units
    Value,
    /// Bounds are percentage offsets from the nominal
    Percent,
}

impl Default for BoundKind {
    fn default() -> Self {
        BoundKind::Value
    }
}

/// Statistical distribution for Monte Carlo sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Normal (Gaussian), with the bounds treated as a ±3σ envelope
    Normal,
    /// Uniform between the resolved bounds
    Uniform,
}

/// One physical quantity: a fixed nominal plus an optional bounded distribution
#[derive(Debug, Clone, PartialEq)]
pub struct StatParam {
    name: String,
    units: String,
    nominal: f64,
    bound_kind: BoundKind,
    distribution: Option<Distribution>,
    low: Option<f64>,
    high: Option<f64>,
}

impl StatParam {
    /// Create a fixed parameter with no distribution
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        nominal: f64,
    ) -> Result<Self, ModelError> {
        Self::from_parts(name, units, nominal, None, None, None, None)
    }

    /// Create a parameter with a bounded distribution
    pub fn with_distribution(
        name: impl Into<String>,
        units: impl Into<String>,
        nominal: f64,
        bound_kind: BoundKind,
        distribution: Distribution,
        low: f64,
        high: f64,
    ) -> Result<Self, ModelError> {
        Self::from_parts(
            name,
            units,
            nominal,
            Some(bound_kind),
            Some(distribution),
            Some(low),
            Some(high),
        )
    }

    /// Create a parameter from optional pieces, validating their shape.
    ///
    /// This is the single construction path: a distribution requires both
    /// bounds, and every numeric field must be finite.
    pub fn from_parts(
        name: impl Into<String>,
        units: impl Into<String>,
        nominal: f64,
        bound_kind: Option<BoundKind>,
        distribution: Option<Distribution>,
        low: Option<f64>,
        high: Option<f64>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::validation("parameter", "name must not be empty"));
        }
        if !nominal.is_finite() {
            return Err(ModelError::validation(
                &name,
                "nominal value must be a finite number",
            ));
        }
        if distribution.is_some() && (low.is_none() || high.is_none()) {
            return Err(ModelError::validation(
                &name,
                "a distribution requires both a low and a high bound",
            ));
        }
        for bound in [low, high].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(ModelError::validation(
                    &name,
                    "bounds must be finite numbers",
                ));
            }
        }
        Ok(Self {
            name,
            units: units.into(),
            nominal,
            bound_kind: bound_kind.unwrap_or_default(),
            distribution,
            low,
            high,
        })
    }

    /// Constant parameter built from values known to be valid.
    ///
    /// Only for internally generated defaults; external input goes through
    /// [`StatParam::from_parts`].
    pub(crate) fn constant(name: &str, units: &str, nominal: f64) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            nominal,
            bound_kind: BoundKind::Value,
            distribution: None,
            low: None,
            high: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    pub fn distribution(&self) -> Option<Distribution> {
        self.distribution
    }

    pub fn bound_kind(&self) -> BoundKind {
        self.bound_kind
    }

    /// Read the parameter under the given evaluation mode.
    ///
    /// Nominal mode returns the stored value unchanged. Monte Carlo mode
    /// draws one sample from the configured distribution, clamped to the
    /// resolved bounds; without a distribution it degrades to the nominal.
    pub fn get_value<R: Rng>(&self, mode: EvalMode, rng: &mut R) -> Result<f64, ModelError> {
        match mode {
            EvalMode::Nominal => Ok(self.nominal),
            EvalMode::MonteCarlo => {
                let dist = match self.distribution {
                    Some(dist) => dist,
                    None => return Ok(self.nominal),
                };
                let (low, high) = self.resolved_bounds()?;
                let value = match dist {
                    Distribution::Uniform => rng.random_range(low..=high),
                    Distribution::Normal => {
                        // Box-Muller transform; the bound span is a 6σ window
                        let sigma = (high - low) / 6.0;
                        let u1: f64 = rng.random();
                        let u2: f64 = rng.random();
                        let z = (-2.0_f64 * u1.ln()).sqrt()
                            * (2.0_f64 * std::f64::consts::PI * u2).cos();
                        (self.nominal + sigma * z).clamp(low, high)
                    }
                };
                Ok(value)
            }
        }
    }

    /// Resolve the bounds into absolute values in the parameter's units.
    ///
    /// Percent bounds are offsets from the nominal. The resolved interval
    /// must be ordered and must bracket the nominal; anything else means the
    /// bounds were written for the wrong interpretation.
    pub fn resolved_bounds(&self) -> Result<(f64, f64), ModelError> {
        let (low, high) = match (self.low, self.high) {
            (Some(low), Some(high)) => (low, high),
            _ => {
                return Err(ModelError::configuration(
                    &self.name,
                    "a distribution is set but bounds are missing",
                ))
            }
        };
        let (low, high) = match self.bound_kind {
            BoundKind::Value => (low, high),
            BoundKind::Percent => (
                self.nominal * (1.0 + low / 100.0),
                self.nominal * (1.0 + high / 100.0),
            ),
        };
        if low > high || self.nominal < low || self.nominal > high {
            return Err(ModelError::configuration(
                &self.name,
                format!(
                    "bounds resolve to [{}, {}], which does not bracket the nominal {}; \
                     check that they match the {:?} interpretation",
                    low, high, self.nominal, self.bound_kind
                ),
            ));
        }
        Ok((low, high))
    }
}

impl fmt::Display for StatParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {}", self.name, self.nominal, self.units)
    }
}
