//! Common component identity shared by loads, switches, and sources

use serde::{Deserialize, Serialize};

use crate::core::param::EvalMode;
use crate::model::load::Load;
use crate::model::source::Source;
use crate::model::switch::LoadSwitch;

/// Scenario tags attached to a component.
///
/// The model only stores these; deciding whether a component participates in
/// a given scenario is up to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTags {
    /// Scenario names in which the component is active
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled: Vec<String>,
    /// Scenario names in which the component is inactive
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled: Vec<String>,
}

impl StateTags {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }
}

/// Identity and bookkeeping common to every node in a power tree
pub trait Element {
    /// Caller-assigned identifier, unique across the tree
    fn id(&self) -> u32;

    /// Display name
    fn name(&self) -> &str;

    /// Optional grouping key for reporting
    fn sub_system_id(&self) -> Option<u32>;

    /// Scenario tags, stored but never interpreted here
    fn tags(&self) -> &StateTags;

    /// How the component's owner intends its parameters to be evaluated
    fn mode(&self) -> EvalMode;
}

/// Any node that can appear in a power tree
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Load(Load),
    Switch(LoadSwitch),
    Source(Source),
}

impl Component {
    pub fn id(&self) -> u32 {
        match self {
            Component::Load(load) => load.id(),
            Component::Switch(switch) => switch.id(),
            Component::Source(source) => source.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Component::Load(load) => load.name(),
            Component::Switch(switch) => switch.name(),
            Component::Source(source) => source.name(),
        }
    }

    pub fn sub_system_id(&self) -> Option<u32> {
        match self {
            Component::Load(load) => load.sub_system_id(),
            Component::Switch(switch) => switch.sub_system_id(),
            Component::Source(source) => source.sub_system_id(),
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Component::Source(_))
    }

    pub fn as_load(&self) -> Option<&Load> {
        match self {
            Component::Load(load) => Some(load),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&LoadSwitch> {
        match self {
            Component::Switch(switch) => Some(switch),
            _ => None,
        }
    }

    pub fn as_source(&self) -> Option<&Source> {
        match self {
            Component::Source(source) => Some(source),
            _ => None,
        }
    }
}

impl From<Load> for Component {
    fn from(load: Load) -> Self {
        Component::Load(load)
    }
}

impl From<LoadSwitch> for Component {
    fn from(switch: LoadSwitch) -> Self {
        Component::Switch(switch)
    }
}

impl From<Source> for Component {
    fn from(source: Source) -> Self {
        Component::Source(source)
    }
}
