//! Terminal loads
//!
//! A load is a leaf in the power tree. Its current draw depends on the
//! variant: resistive loads obey Ohm's law, constant-current loads draw a
//! fixed current, and constant-power loads draw `P / V` at their own node
//! voltage, which makes them non-linear in the upstream voltage.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::ModelError;
use crate::core::param::{EvalMode, StatParam};
use crate::model::component::{Element, StateTags};

/// How a load converts voltage into current draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadKind {
    /// Fixed resistance, current = V / R
    Resistive,
    /// Fixed current regardless of voltage
    ConstantCurrent,
    /// Fixed power, current = P / V at the load's node
    ConstantPower,
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadKind::Resistive => write!(f, "resistive"),
            LoadKind::ConstantCurrent => write!(f, "constant_current"),
            LoadKind::ConstantPower => write!(f, "constant_power"),
        }
    }
}

impl FromStr for LoadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resistive" | "r" => Ok(LoadKind::Resistive),
            "constant_current" | "constant-current" | "cc" => Ok(LoadKind::ConstantCurrent),
            "constant_power" | "constant-power" | "cp" => Ok(LoadKind::ConstantPower),
            _ => Err(format!("Invalid load kind: {}", s)),
        }
    }
}

/// A terminal load in the power tree
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    id: u32,
    name: String,
    sub_system_id: Option<u32>,
    tags: StateTags,
    mode: EvalMode,
    kind: LoadKind,
    load_value: StatParam,
    input_resistance: StatParam,
}

impl Load {
    /// General constructor taking a fully specified load parameter.
    ///
    /// The parameter's nominal must be positive for resistive loads and
    /// non-negative otherwise.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        kind: LoadKind,
        load_value: StatParam,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        check_load_value(kind, load_value.nominal(), &name)?;
        Ok(Self {
            id,
            name,
            sub_system_id: None,
            tags: StateTags::default(),
            mode: EvalMode::Nominal,
            kind,
            load_value,
            input_resistance: StatParam::new("input_resistance", "Ohm", 0.0)?,
        })
    }

    /// Resistive load drawing `V / resistance`
    pub fn resistive(id: u32, name: impl Into<String>, resistance: f64) -> Result<Self, ModelError> {
        let value = StatParam::new("load_resistance", "Ohm", resistance)?;
        Self::new(id, name, LoadKind::Resistive, value)
    }

    /// Load drawing a fixed current
    pub fn constant_current(
        id: u32,
        name: impl Into<String>,
        current: f64,
    ) -> Result<Self, ModelError> {
        let value = StatParam::new("load_current", "A", current)?;
        Self::new(id, name, LoadKind::ConstantCurrent, value)
    }

    /// Load drawing a fixed power
    pub fn constant_power(id: u32, name: impl Into<String>, power: f64) -> Result<Self, ModelError> {
        let value = StatParam::new("load_power", "W", power)?;
        Self::new(id, name, LoadKind::ConstantPower, value)
    }

    /// Series resistance between the feeding node and the load itself
    pub fn with_input_resistance(mut self, resistance: StatParam) -> Result<Self, ModelError> {
        if resistance.nominal() < 0.0 {
            return Err(ModelError::validation(
                format!("load '{}'", self.name),
                "input resistance cannot be negative",
            ));
        }
        self.input_resistance = resistance;
        Ok(self)
    }

    pub fn with_sub_system(mut self, sub_system_id: u32) -> Self {
        self.sub_system_id = Some(sub_system_id);
        self
    }

    pub fn with_tags(mut self, tags: StateTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_mode(mut self, mode: EvalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn kind(&self) -> LoadKind {
        self.kind
    }

    pub fn load_value(&self) -> &StatParam {
        &self.load_value
    }

    pub fn input_resistance(&self) -> &StatParam {
        &self.input_resistance
    }

    /// Current drawn from the upstream node at the given voltage.
    ///
    /// Both parameters are sampled exactly once for this call.
    pub fn current_draw<R: Rng>(
        &self,
        upstream_voltage: f64,
        mode: EvalMode,
        rng: &mut R,
    ) -> Result<f64, ModelError> {
        let value = self.load_value.get_value(mode, rng)?;
        let input_resistance = self.input_resistance.get_value(mode, rng)?;
        branch_current(self.kind, value, input_resistance, upstream_voltage, &self.name)
    }
}

impl Element for Load {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sub_system_id(&self) -> Option<u32> {
        self.sub_system_id
    }

    fn tags(&self) -> &StateTags {
        &self.tags
    }

    fn mode(&self) -> EvalMode {
        self.mode
    }
}

fn check_load_value(kind: LoadKind, nominal: f64, name: &str) -> Result<(), ModelError> {
    match kind {
        LoadKind::Resistive => {
            if nominal <= 0.0 {
                return Err(ModelError::validation(
                    format!("load '{}'", name),
                    "resistance must be positive",
                ));
            }
        }
        LoadKind::ConstantCurrent | LoadKind::ConstantPower => {
            if nominal < 0.0 {
                return Err(ModelError::validation(
                    format!("load '{}'", name),
                    "load value cannot be negative",
                ));
            }
        }
    }
    Ok(())
}

/// Closed-form branch current for a load fed at `upstream_voltage` through
/// `input_resistance`.
///
/// Resistive and constant-power loads see their own node voltage, which
/// drops with the current they draw, so both are solved against the series
/// resistance rather than the upstream voltage directly.
pub(crate) fn branch_current(
    kind: LoadKind,
    value: f64,
    input_resistance: f64,
    upstream_voltage: f64,
    context: &str,
) -> Result<f64, ModelError> {
    match kind {
        LoadKind::Resistive => Ok(upstream_voltage / (value + input_resistance)),
        LoadKind::ConstantCurrent => Ok(value),
        LoadKind::ConstantPower => {
            if value == 0.0 {
                return Ok(0.0);
            }
            if upstream_voltage <= 0.0 {
                return Err(ModelError::unsolvable(
                    format!("load '{}'", context),
                    format!(
                        "cannot deliver {} W with no upstream voltage",
                        value
                    ),
                ));
            }
            if input_resistance == 0.0 {
                return Ok(value / upstream_voltage);
            }
            // P = (V - I*R) * I has two roots; the lower one is the
            // operating point, the upper one is the collapse branch.
            let discriminant = upstream_voltage * upstream_voltage - 4.0 * input_resistance * value;
            if discriminant < 0.0 {
                return Err(ModelError::unsolvable(
                    format!("load '{}'", context),
                    format!(
                        "{} W exceeds what {} V can deliver through {} Ohm",
                        value, upstream_voltage, input_resistance
                    ),
                ));
            }
            Ok((upstream_voltage - discriminant.sqrt()) / (2.0 * input_resistance))
        }
    }
}
