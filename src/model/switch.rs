//! Load switches
//!
//! A load switch is an interior node that gates a group of downstream
//! components through a small series resistance. It draws no current of its
//! own; its contribution to the budget is the resistive drop and loss across
//! its input, switch, and output resistances.

use crate::core::error::ModelError;
use crate::core::param::{EvalMode, StatParam};
use crate::model::component::{Element, StateTags};

/// An interior switching node with series resistance
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSwitch {
    id: u32,
    name: String,
    sub_system_id: Option<u32>,
    tags: StateTags,
    mode: EvalMode,
    switch_resistance: StatParam,
    input_resistance: StatParam,
    output_resistance: StatParam,
    children: Vec<u32>,
}

impl LoadSwitch {
    /// Switch with all series resistances at zero ohms
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            sub_system_id: None,
            tags: StateTags::default(),
            mode: EvalMode::Nominal,
            switch_resistance: StatParam::constant("switch_resistance", "Ohm", 0.0),
            input_resistance: StatParam::constant("input_resistance", "Ohm", 0.0),
            output_resistance: StatParam::constant("output_resistance", "Ohm", 0.0),
            children: Vec::new(),
        }
    }

    /// On-resistance of the switch element itself
    pub fn with_switch_resistance(mut self, resistance: StatParam) -> Result<Self, ModelError> {
        check_resistance(&resistance, &self.name)?;
        self.switch_resistance = resistance;
        Ok(self)
    }

    /// Series resistance on the upstream side of the switch
    pub fn with_input_resistance(mut self, resistance: StatParam) -> Result<Self, ModelError> {
        check_resistance(&resistance, &self.name)?;
        self.input_resistance = resistance;
        Ok(self)
    }

    /// Series resistance on the downstream side of the switch
    pub fn with_output_resistance(mut self, resistance: StatParam) -> Result<Self, ModelError> {
        check_resistance(&resistance, &self.name)?;
        self.output_resistance = resistance;
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

    pub fn switch_resistance(&self) -> &StatParam {
        &self.switch_resistance
    }

    pub fn input_resistance(&self) -> &StatParam {
        &self.input_resistance
    }

    pub fn output_resistance(&self) -> &StatParam {
        &self.output_resistance
    }

    /// Ids of the components fed by this switch, in insertion order
    pub fn children(&self) -> &[u32] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<u32> {
        &mut self.children
    }
}

impl Element for LoadSwitch {
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

fn check_resistance(resistance: &StatParam, name: &str) -> Result<(), ModelError> {
    if resistance.nominal() < 0.0 {
        return Err(ModelError::validation(
            format!("switch '{}'", name),
            format!("{} cannot be negative", resistance.name()),
        ));
    }
    Ok(())
}
