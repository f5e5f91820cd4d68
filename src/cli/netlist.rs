//! Netlist parsing
//!
//! A netlist is a YAML document describing one or more sources and their
//! subtrees. It is read-only input plumbing: parsing produces plain spec
//! structs, and [`NetlistDoc::build`] maps them through the model's
//! validated constructors, so a malformed netlist fails the same way a
//! malformed API call would.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use miette::Result;
use serde::Deserialize;

use crate::core::error::ModelError;
use crate::core::param::{BoundKind, Distribution, EvalMode, StatParam};
use crate::core::trace::TraceSink;
use crate::model::component::StateTags;
use crate::model::efficiency::EfficiencyModel;
use crate::model::load::{Load, LoadKind};
use crate::model::source::Source;
use crate::model::switch::LoadSwitch;
use crate::model::tree::PowerTree;

/// Top-level netlist document
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetlistDoc {
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub id: u32,
    pub name: String,
    pub kind: SourceKindSpec,
    pub vin: ParamSpec,
    /// Required for smps and linear; derived from vin for cap_divider
    #[serde(default)]
    pub vout: Option<ParamSpec>,
    pub max_current: ParamSpec,
    /// Required for smps and cap_divider
    #[serde(default)]
    pub efficiency: Option<EfficiencySpec>,
    /// Required for cap_divider
    #[serde(default)]
    pub divider: Option<u32>,
    /// Required for linear
    #[serde(default)]
    pub iq: Option<ParamSpec>,
    #[serde(default)]
    pub dropout: Option<ParamSpec>,
    #[serde(default)]
    pub input_resistance: Option<ParamSpec>,
    #[serde(default)]
    pub output_resistance: Option<ParamSpec>,
    #[serde(default)]
    pub sub_system_id: Option<u32>,
    #[serde(default)]
    pub tags: Option<StateTags>,
    /// Default evaluation mode for this source's passes
    #[serde(default)]
    pub mode: Option<EvalMode>,
    #[serde(default)]
    pub loads: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKindSpec {
    Smps,
    CapDivider,
    Linear,
}

/// A parameter is either a bare number or a full statistical description
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ParamSpec {
    Fixed(f64),
    Detailed {
        nominal: f64,
        #[serde(default)]
        units: Option<String>,
        #[serde(default)]
        bound_kind: Option<BoundKind>,
        #[serde(default)]
        distribution: Option<Distribution>,
        #[serde(default)]
        low: Option<f64>,
        #[serde(default)]
        high: Option<f64>,
    },
}

impl ParamSpec {
    fn build(&self, name: String, default_units: &str) -> Result<StatParam, ModelError> {
        match self {
            ParamSpec::Fixed(value) => StatParam::new(name, default_units, *value),
            ParamSpec::Detailed {
                nominal,
                units,
                bound_kind,
                distribution,
                low,
                high,
            } => StatParam::from_parts(
                name,
                units.clone().unwrap_or_else(|| default_units.to_string()),
                *nominal,
                *bound_kind,
                *distribution,
                *low,
                *high,
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EfficiencySpec {
    Fixed(f64),
    Curve {
        currents: Vec<f64>,
        efficiencies: Vec<f64>,
    },
}

impl EfficiencySpec {
    fn to_model(&self) -> Result<EfficiencyModel, ModelError> {
        match self {
            EfficiencySpec::Fixed(efficiency) => EfficiencyModel::fixed(*efficiency),
            EfficiencySpec::Curve {
                currents,
                efficiencies,
            } => EfficiencyModel::curve(currents.clone(), efficiencies.clone()),
        }
    }
}

/// A node in a source's subtree, either a load or a nested switch
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSpec {
    Load(LoadSpec),
    Switch(SwitchSpec),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadSpec {
    pub id: u32,
    pub name: String,
    pub kind: LoadKind,
    /// Resistance, current, or power depending on `kind`
    pub value: ParamSpec,
    #[serde(default)]
    pub input_resistance: Option<ParamSpec>,
    #[serde(default)]
    pub sub_system_id: Option<u32>,
    #[serde(default)]
    pub tags: Option<StateTags>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchSpec {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub switch_resistance: Option<ParamSpec>,
    #[serde(default)]
    pub input_resistance: Option<ParamSpec>,
    #[serde(default)]
    pub output_resistance: Option<ParamSpec>,
    #[serde(default)]
    pub sub_system_id: Option<u32>,
    #[serde(default)]
    pub tags: Option<StateTags>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NetlistDoc {
    /// Parse a netlist file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| miette::miette!("Failed to read netlist '{}': {}", path.display(), e))?;
        let doc: NetlistDoc = serde_yml::from_str(&content)
            .map_err(|e| miette::miette!("Failed to parse netlist '{}': {}", path.display(), e))?;
        Ok(doc)
    }

    /// Build the power tree through the model's validated constructors
    pub fn build(&self, trace: Arc<dyn TraceSink>) -> Result<PowerTree, ModelError> {
        let mut tree = PowerTree::with_trace(trace);
        for spec in &self.sources {
            let source_id = tree.add_source(spec.to_source()?)?;
            for node in &spec.loads {
                add_node(&mut tree, source_id, node)?;
            }
        }
        Ok(tree)
    }
}

impl SourceSpec {
    fn scoped(&self, field: &str) -> String {
        format!("{}.{}", self.name, field)
    }

    fn require_vout(&self) -> Result<StatParam, ModelError> {
        match &self.vout {
            Some(vout) => vout.build(self.scoped("vout"), "V"),
            None => Err(ModelError::validation(
                format!("source '{}'", self.name),
                "vout is required for this source kind",
            )),
        }
    }

    fn require_efficiency(&self) -> Result<EfficiencyModel, ModelError> {
        match &self.efficiency {
            Some(efficiency) => efficiency.to_model(),
            None => Err(ModelError::validation(
                format!("source '{}'", self.name),
                "an efficiency is required for this source kind",
            )),
        }
    }

    fn reject(&self, present: bool, field: &str) -> Result<(), ModelError> {
        if present {
            return Err(ModelError::validation(
                format!("source '{}'", self.name),
                format!("{} does not apply to a {:?} source", field, self.kind),
            ));
        }
        Ok(())
    }

    fn to_source(&self) -> Result<Source, ModelError> {
        let vin = self.vin.build(self.scoped("vin"), "V")?;
        let max_current = self.max_current.build(self.scoped("max_current"), "A")?;

        let mut source = match self.kind {
            SourceKindSpec::Smps => {
                self.reject(self.divider.is_some(), "divider")?;
                self.reject(self.iq.is_some(), "iq")?;
                self.reject(self.dropout.is_some(), "dropout")?;
                Source::smps(
                    self.id,
                    &self.name,
                    vin,
                    self.require_vout()?,
                    max_current,
                    self.require_efficiency()?,
                )?
            }
            SourceKindSpec::CapDivider => {
                self.reject(self.vout.is_some(), "vout")?;
                self.reject(self.iq.is_some(), "iq")?;
                self.reject(self.dropout.is_some(), "dropout")?;
                let divider = self.divider.ok_or_else(|| {
                    ModelError::validation(
                        format!("source '{}'", self.name),
                        "a divider ratio is required for a cap_divider source",
                    )
                })?;
                Source::cap_divider(
                    self.id,
                    &self.name,
                    vin,
                    divider,
                    max_current,
                    self.require_efficiency()?,
                )?
            }
            SourceKindSpec::Linear => {
                self.reject(self.efficiency.is_some(), "efficiency")?;
                self.reject(self.divider.is_some(), "divider")?;
                let iq = match &self.iq {
                    Some(iq) => iq.build(self.scoped("iq"), "A")?,
                    None => {
                        return Err(ModelError::validation(
                            format!("source '{}'", self.name),
                            "a quiescent current is required for a linear source",
                        ))
                    }
                };
                let mut source = Source::linear(
                    self.id,
                    &self.name,
                    vin,
                    self.require_vout()?,
                    max_current,
                    iq,
                )?;
                if let Some(dropout) = &self.dropout {
                    source = source.with_dropout(dropout.build(self.scoped("dropout"), "V")?)?;
                }
                source
            }
        };

        if let Some(resistance) = &self.input_resistance {
            source = source
                .with_input_resistance(resistance.build(self.scoped("input_resistance"), "Ohm")?)?;
        }
        if let Some(resistance) = &self.output_resistance {
            source = source.with_output_resistance(
                resistance.build(self.scoped("output_resistance"), "Ohm")?,
            )?;
        }
        if let Some(sub_system_id) = self.sub_system_id {
            source = source.with_sub_system(sub_system_id);
        }
        if let Some(tags) = &self.tags {
            source = source.with_tags(tags.clone());
        }
        if let Some(mode) = self.mode {
            source = source.with_mode(mode);
        }
        Ok(source)
    }
}

impl LoadSpec {
    fn to_load(&self) -> Result<Load, ModelError> {
        let units = match self.kind {
            LoadKind::Resistive => "Ohm",
            LoadKind::ConstantCurrent => "A",
            LoadKind::ConstantPower => "W",
        };
        let value = self.value.build(format!("{}.value", self.name), units)?;
        let mut load = Load::new(self.id, &self.name, self.kind, value)?;
        if let Some(resistance) = &self.input_resistance {
            load = load.with_input_resistance(
                resistance.build(format!("{}.input_resistance", self.name), "Ohm")?,
            )?;
        }
        if let Some(sub_system_id) = self.sub_system_id {
            load = load.with_sub_system(sub_system_id);
        }
        if let Some(tags) = &self.tags {
            load = load.with_tags(tags.clone());
        }
        Ok(load)
    }
}

impl SwitchSpec {
    fn to_switch(&self) -> Result<LoadSwitch, ModelError> {
        let mut switch = LoadSwitch::new(self.id, &self.name);
        if let Some(resistance) = &self.switch_resistance {
            switch = switch.with_switch_resistance(
                resistance.build(format!("{}.switch_resistance", self.name), "Ohm")?,
            )?;
        }
        if let Some(resistance) = &self.input_resistance {
            switch = switch.with_input_resistance(
                resistance.build(format!("{}.input_resistance", self.name), "Ohm")?,
            )?;
        }
        if let Some(resistance) = &self.output_resistance {
            switch = switch.with_output_resistance(
                resistance.build(format!("{}.output_resistance", self.name), "Ohm")?,
            )?;
        }
        if let Some(sub_system_id) = self.sub_system_id {
            switch = switch.with_sub_system(sub_system_id);
        }
        if let Some(tags) = &self.tags {
            switch = switch.with_tags(tags.clone());
        }
        Ok(switch)
    }
}

fn add_node(tree: &mut PowerTree, parent_id: u32, node: &NodeSpec) -> Result<(), ModelError> {
    match node {
        NodeSpec::Load(spec) => {
            tree.add_load(parent_id, spec.to_load()?)?;
        }
        NodeSpec::Switch(spec) => {
            let switch_id = tree.add_load(parent_id, spec.to_switch()?)?;
            for child in &spec.children {
                add_node(tree, switch_id, child)?;
            }
        }
    }
    Ok(())
}
