//! Converter efficiency models
//!
//! A source's conversion efficiency is either a constant or a piecewise
//! curve over load current. Curve lookups interpolate linearly between
//! sample points and clamp flat outside the sampled range, so an
//! efficiency can never leave (0, 1] through extrapolation.

use crate::core::error::ModelError;

#[derive(Debug, Clone, PartialEq)]
enum Repr {
    Fixed(f64),
    Curve {
        currents: Vec<f64>,
        efficiencies: Vec<f64>,
    },
}

/// Maps a load current to a conversion efficiency in (0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyModel {
    repr: Repr,
}

impl EfficiencyModel {
    /// Constant efficiency regardless of load current
    pub fn fixed(efficiency: f64) -> Result<Self, ModelError> {
        check_efficiency(efficiency)?;
        Ok(Self {
            repr: Repr::Fixed(efficiency),
        })
    }

    /// Efficiency sampled over ascending current points.
    ///
    /// Both sequences must be the same non-zero length and the currents must
    /// be strictly increasing.
    pub fn curve(currents: Vec<f64>, efficiencies: Vec<f64>) -> Result<Self, ModelError> {
        if currents.is_empty() {
            return Err(ModelError::validation(
                "efficiency curve",
                "at least one sample point is required",
            ));
        }
        if currents.len() != efficiencies.len() {
            return Err(ModelError::validation(
                "efficiency curve",
                format!(
                    "{} current points but {} efficiency points",
                    currents.len(),
                    efficiencies.len()
                ),
            ));
        }
        for window in currents.windows(2) {
            if window[1] <= window[0] {
                return Err(ModelError::validation(
                    "efficiency curve",
                    "current sample points must be strictly increasing",
                ));
            }
        }
        for &current in &currents {
            if !current.is_finite() {
                return Err(ModelError::validation(
                    "efficiency curve",
                    "current sample points must be finite",
                ));
            }
        }
        for &efficiency in &efficiencies {
            check_efficiency(efficiency)?;
        }
        Ok(Self {
            repr: Repr::Curve {
                currents,
                efficiencies,
            },
        })
    }

    pub fn is_curve(&self) -> bool {
        matches!(self.repr, Repr::Curve { .. })
    }

    /// Look up the efficiency for a load current.
    ///
    /// The fixed form ignores `current`; the curve form requires it.
    pub fn get_efficiency(&self, current: Option<f64>) -> Result<f64, ModelError> {
        match &self.repr {
            Repr::Fixed(efficiency) => Ok(*efficiency),
            Repr::Curve {
                currents,
                efficiencies,
            } => {
                let current = current.ok_or_else(|| {
                    ModelError::validation(
                        "efficiency curve",
                        "a load current is required to look up a curve efficiency",
                    )
                })?;
                if !current.is_finite() {
                    return Err(ModelError::validation(
                        "efficiency curve",
                        format!("cannot look up the efficiency at {} A", current),
                    ));
                }
                Ok(interpolate(currents, efficiencies, current))
            }
        }
    }
}

fn check_efficiency(efficiency: f64) -> Result<(), ModelError> {
    if !efficiency.is_finite() || efficiency <= 0.0 || efficiency > 1.0 {
        return Err(ModelError::validation(
            "efficiency",
            format!("{} is outside (0, 1]", efficiency),
        ));
    }
    Ok(())
}

/// Linear interpolation with flat clamping outside the sampled range.
///
/// Callers guarantee `xs` is non-empty, strictly increasing, and the same
/// length as `ys`.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    let i = xs.partition_point(|&p| p < x);
    if xs[i] == x {
        return ys[i];
    }
    let t = (x - xs[i - 1]) / (xs[i] - xs[i - 1]);
    ys[i - 1] + t * (ys[i] - ys[i - 1])
}
