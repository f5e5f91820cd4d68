//! Steady-state budget evaluation
//!
//! A budget pass resolves every parameter in a source's subtree exactly once
//! for the requested mode, then solves the load currents by fixed-point
//! iteration: node voltages propagate top-down from the rail while branch
//! currents aggregate bottom-up, with series drops recomputed from the
//! previous iteration's currents until the currents settle.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::core::error::ModelError;
use crate::core::param::EvalMode;
use crate::model::component::{Component, Element};
use crate::model::load::{branch_current, LoadKind};
use crate::model::source::{
    linear_dissipation, linear_efficiency, switcher_dissipation, Source, SourceKind,
};
use crate::model::tree::PowerTree;

/// Iteration cap for the fixed-point solve
const MAX_ITERATIONS: usize = 64;

/// Relative convergence tolerance on branch currents
const CURRENT_TOLERANCE: f64 = 1e-9;

/// Result of one evaluation pass over a source's subtree
#[derive(Debug, Clone, Serialize)]
pub struct SourceBudget {
    pub source_id: u32,
    pub source_name: String,
    pub mode: EvalMode,
    /// Rail voltage used for this pass, volts
    pub vout: f64,
    /// Sum of all top-level branch currents, amps
    pub total_current: f64,
    /// Conversion efficiency at the total current; `None` when undefined
    pub efficiency: Option<f64>,
    /// Power lost in the source itself, watts
    pub power_dissipation: f64,
    /// Power delivered to the subtree, watts
    pub output_power: f64,
    /// Power drawn from the source's input, watts
    pub input_power: f64,
    /// Present when the total current exceeds the source's rating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overload: Option<Overload>,
    /// Per-node currents and voltages, depth-first in insertion order
    pub branches: Vec<NodeReading>,
}

/// A demanded current above the source's rating.
///
/// This is a reported condition, not an error: the pass still completes and
/// the caller decides how to react.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Overload {
    /// Rating sampled for this pass, amps
    pub rated: f64,
    /// Total current demanded by the subtree, amps
    pub demanded: f64,
}

impl fmt::Display for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "demanded {:.3} A exceeds the {:.3} A rating",
            self.demanded, self.rated
        )
    }
}

/// Current and voltage at one node of the subtree
#[derive(Debug, Clone, Serialize)]
pub struct NodeReading {
    pub id: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_system_id: Option<u32>,
    /// Current through this branch, amps
    pub current: f64,
    /// Voltage at the node after upstream series drops, volts
    pub node_voltage: f64,
}

/// Parameter values sampled once for a whole pass
struct PassValues {
    vout: f64,
    vin: f64,
    output_resistance: f64,
    max_current: f64,
    iq: f64,
    nodes: BTreeMap<u32, ResolvedNode>,
}

enum ResolvedNode {
    Load {
        kind: LoadKind,
        value: f64,
        input_resistance: f64,
    },
    Switch {
        series_resistance: f64,
    },
}

impl PowerTree {
    /// Evaluate one budget pass for a source under the given mode.
    ///
    /// Every `StatParam` in the subtree is sampled exactly once per pass, so
    /// a Monte Carlo pass sees one consistent set of values throughout.
    pub fn budget<R: Rng>(
        &self,
        source_id: u32,
        mode: EvalMode,
        rng: &mut R,
    ) -> Result<SourceBudget, ModelError> {
        let source = self.source(source_id).ok_or_else(|| {
            ModelError::validation("budget", format!("no source with id {}", source_id))
        })?;
        let values = resolve_pass(self, source, mode, rng)?;
        let currents = solve(self, source, &values)?;

        let total_current: f64 = source
            .loads()
            .iter()
            .map(|id| currents.get(id).copied().unwrap_or(0.0))
            .sum();

        let efficiency = match source.kind() {
            SourceKind::Smps { efficiency } | SourceKind::CapDivider { efficiency, .. } => {
                Some(efficiency.get_efficiency(Some(total_current))?)
            }
            SourceKind::Linear { .. } => linear_efficiency(values.vin, total_current, values.iq),
        };
        let power_dissipation = match source.kind() {
            SourceKind::Linear { .. } => {
                linear_dissipation(values.vin, values.vout, total_current, values.iq)
            }
            _ => match efficiency {
                Some(eff) => switcher_dissipation(eff, values.vout, total_current),
                None => 0.0,
            },
        };
        let output_power = values.vout * total_current;
        let input_power = output_power + power_dissipation;
        let overload = if total_current > values.max_current {
            Some(Overload {
                rated: values.max_current,
                demanded: total_current,
            })
        } else {
            None
        };

        let v_top = values.vout - total_current * values.output_resistance;
        let mut branches = Vec::new();
        for &child in source.loads() {
            collect_readings(self, &values, &currents, child, v_top, &mut branches);
        }

        self.trace().pass_completed(source_id, mode, total_current);
        Ok(SourceBudget {
            source_id,
            source_name: source.name().to_string(),
            mode,
            vout: values.vout,
            total_current,
            efficiency,
            power_dissipation,
            output_power,
            input_power,
            overload,
            branches,
        })
    }

    /// Budget pass with every parameter at its nominal value
    pub fn nominal_budget(&self, source_id: u32) -> Result<SourceBudget, ModelError> {
        self.budget(source_id, EvalMode::Nominal, &mut rand::rng())
    }

    /// Budget pass under the mode stored on the source itself
    pub fn budget_default(&self, source_id: u32) -> Result<SourceBudget, ModelError> {
        self.budget(source_id, self.declared_mode(source_id), &mut rand::rng())
    }

    /// Evaluation mode a source was declared with, nominal for an unknown id
    pub fn declared_mode(&self, source_id: u32) -> EvalMode {
        self.source(source_id)
            .map(|source| source.mode())
            .unwrap_or_default()
    }
}

fn resolve_pass<R: Rng>(
    tree: &PowerTree,
    source: &Source,
    mode: EvalMode,
    rng: &mut R,
) -> Result<PassValues, ModelError> {
    let vout = source.vout().get_value(mode, rng)?;
    let vin = source.vin().get_value(mode, rng)?;
    let output_resistance = source.output_resistance().get_value(mode, rng)?;
    let max_current = source.max_current().get_value(mode, rng)?;
    let iq = match source.kind() {
        SourceKind::Linear { iq, .. } => iq.get_value(mode, rng)?,
        _ => 0.0,
    };

    let mut nodes = BTreeMap::new();
    let mut stack: Vec<u32> = source.loads().to_vec();
    while let Some(id) = stack.pop() {
        let component = tree.get(id).ok_or_else(|| {
            ModelError::validation(
                format!("source '{}'", source.name()),
                format!("child id {} is missing from the tree", id),
            )
        })?;
        match component {
            Component::Load(load) => {
                nodes.insert(
                    id,
                    ResolvedNode::Load {
                        kind: load.kind(),
                        value: load.load_value().get_value(mode, rng)?,
                        input_resistance: load.input_resistance().get_value(mode, rng)?,
                    },
                );
            }
            Component::Switch(switch) => {
                let series_resistance = switch.input_resistance().get_value(mode, rng)?
                    + switch.switch_resistance().get_value(mode, rng)?
                    + switch.output_resistance().get_value(mode, rng)?;
                nodes.insert(id, ResolvedNode::Switch { series_resistance });
                stack.extend_from_slice(switch.children());
            }
            Component::Source(_) => {
                return Err(ModelError::validation(
                    format!("source '{}'", source.name()),
                    format!("component {} is a nested source", id),
                ));
            }
        }
    }
    Ok(PassValues {
        vout,
        vin,
        output_resistance,
        max_current,
        iq,
        nodes,
    })
}

/// Fixed-point iteration over branch currents.
///
/// Starts from zero current everywhere and re-propagates voltages with the
/// previous iteration's currents until every branch moves by less than the
/// tolerance, relative to max(1, |previous|).
fn solve(
    tree: &PowerTree,
    source: &Source,
    values: &PassValues,
) -> Result<BTreeMap<u32, f64>, ModelError> {
    let mut currents: BTreeMap<u32, f64> =
        values.nodes.keys().map(|&id| (id, 0.0)).collect();
    for _ in 0..MAX_ITERATIONS {
        let total_prev: f64 = source
            .loads()
            .iter()
            .map(|id| currents.get(id).copied().unwrap_or(0.0))
            .sum();
        let v_top = values.vout - total_prev * values.output_resistance;

        let mut next = BTreeMap::new();
        for &child in source.loads() {
            node_current(tree, values, &currents, &mut next, child, v_top)?;
        }

        let converged = values.nodes.keys().all(|id| {
            let prev = currents.get(id).copied().unwrap_or(0.0);
            let new = next.get(id).copied().unwrap_or(0.0);
            (new - prev).abs() <= CURRENT_TOLERANCE * prev.abs().max(1.0)
        });
        currents = next;
        if converged {
            return Ok(currents);
        }
    }
    Err(ModelError::unsolvable(
        format!("source '{}'", source.name()),
        format!(
            "branch currents did not settle within {} iterations",
            MAX_ITERATIONS
        ),
    ))
}

fn node_current(
    tree: &PowerTree,
    values: &PassValues,
    prev: &BTreeMap<u32, f64>,
    next: &mut BTreeMap<u32, f64>,
    id: u32,
    v_avail: f64,
) -> Result<f64, ModelError> {
    let node = values.nodes.get(&id).ok_or_else(|| {
        ModelError::validation("budget", format!("node {} was not resolved", id))
    })?;
    let current = match node {
        ResolvedNode::Load {
            kind,
            value,
            input_resistance,
        } => branch_current(*kind, *value, *input_resistance, v_avail, node_name(tree, id))?,
        ResolvedNode::Switch { series_resistance } => {
            let i_prev = prev.get(&id).copied().unwrap_or(0.0);
            let v_down = v_avail - i_prev * series_resistance;
            let mut sum = 0.0;
            for &child in switch_children(tree, id) {
                sum += node_current(tree, values, prev, next, child, v_down)?;
            }
            sum
        }
    };
    next.insert(id, current);
    Ok(current)
}

fn collect_readings(
    tree: &PowerTree,
    values: &PassValues,
    currents: &BTreeMap<u32, f64>,
    id: u32,
    v_avail: f64,
    rows: &mut Vec<NodeReading>,
) {
    let component = match tree.get(id) {
        Some(component) => component,
        None => return,
    };
    let current = currents.get(&id).copied().unwrap_or(0.0);
    match values.nodes.get(&id) {
        Some(ResolvedNode::Load {
            input_resistance, ..
        }) => {
            rows.push(NodeReading {
                id,
                name: component.name().to_string(),
                sub_system_id: component.sub_system_id(),
                current,
                node_voltage: v_avail - current * input_resistance,
            });
        }
        Some(ResolvedNode::Switch { series_resistance }) => {
            let v_down = v_avail - current * series_resistance;
            rows.push(NodeReading {
                id,
                name: component.name().to_string(),
                sub_system_id: component.sub_system_id(),
                current,
                node_voltage: v_down,
            });
            for &child in switch_children(tree, id) {
                collect_readings(tree, values, currents, child, v_down, rows);
            }
        }
        None => {}
    }
}

fn node_name(tree: &PowerTree, id: u32) -> &str {
    tree.get(id).map(Component::name).unwrap_or("unknown")
}

fn switch_children(tree: &PowerTree, id: u32) -> &[u32] {
    tree.get(id)
        .and_then(Component::as_switch)
        .map(|switch| switch.children())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::param::{BoundKind, Distribution, StatParam};
    use crate::core::trace::RecordingTrace;
    use crate::model::efficiency::EfficiencyModel;
    use crate::model::load::Load;
    use crate::model::switch::LoadSwitch;

    fn volts(name: &str, value: f64) -> StatParam {
        StatParam::new(name, "V", value).unwrap()
    }

    fn amps(name: &str, value: f64) -> StatParam {
        StatParam::new(name, "A", value).unwrap()
    }

    fn ohms(name: &str, value: f64) -> StatParam {
        StatParam::new(name, "Ohm", value).unwrap()
    }

    fn smps_rail(id: u32, vout: f64, rating: f64) -> Source {
        Source::smps(
            id,
            "rail",
            volts("vin", 12.0),
            volts("vout", vout),
            amps("max_current", rating),
            EfficiencyModel::fixed(0.9).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_constant_current_loads_sum_exactly() {
        let mut tree = PowerTree::new();
        tree.add_source(smps_rail(1, 5.0, 1.0)).unwrap();
        tree.add_load(1, Load::constant_current(2, "camera", 0.1).unwrap())
            .unwrap();
        tree.add_load(1, Load::constant_current(3, "radio", 0.2).unwrap())
            .unwrap();

        let budget = tree.nominal_budget(1).unwrap();
        assert!((budget.total_current - 0.3).abs() < 1e-12);
        assert!(budget.overload.is_none());
        assert_eq!(budget.branches.len(), 2);
        assert_eq!(budget.branches[0].name, "camera");
        assert_eq!(budget.branches[1].name, "radio");
    }

    #[test]
    fn test_resistive_load_behind_switch_sees_series_drop() {
        let mut tree = PowerTree::new();
        tree.add_source(smps_rail(1, 3.3, 2.0)).unwrap();
        let switch = LoadSwitch::new(2, "Q1")
            .with_switch_resistance(ohms("switch_resistance", 0.1))
            .unwrap();
        tree.add_load(1, switch).unwrap();
        tree.add_load(2, Load::resistive(3, "heater", 33.0).unwrap())
            .unwrap();

        let budget = tree.nominal_budget(1).unwrap();
        // I solves I = (3.3 - 0.1 I) / 33
        let expected = 3.3 / 33.1;
        assert!((budget.total_current - expected).abs() < 1e-9);

        let heater = &budget.branches[1];
        assert_eq!(heater.name, "heater");
        let v_node = 3.3 - expected * 0.1;
        assert!((heater.node_voltage - v_node).abs() < 1e-8);
    }

    #[test]
    fn test_constant_power_solves_implicit_voltage() {
        let mut tree = PowerTree::new();
        tree.add_source(smps_rail(1, 5.0, 2.0)).unwrap();
        let load = Load::constant_power(2, "modem", 1.0)
            .unwrap()
            .with_input_resistance(ohms("input_resistance", 1.0))
            .unwrap();
        tree.add_load(1, load).unwrap();

        let budget = tree.nominal_budget(1).unwrap();
        let current = budget.total_current;
        let v_node = 5.0 - current * 1.0;
        assert!((v_node * current - 1.0).abs() < 1e-9);
        let reading = &budget.branches[0];
        assert!((reading.node_voltage - v_node).abs() < 1e-9);
    }

    #[test]
    fn test_overload_is_reported_not_fatal() {
        let mut tree = PowerTree::new();
        tree.add_source(smps_rail(1, 5.0, 1.0)).unwrap();
        tree.add_load(1, Load::constant_current(2, "heater", 1.5).unwrap())
            .unwrap();

        let budget = tree.nominal_budget(1).unwrap();
        assert!((budget.total_current - 1.5).abs() < 1e-12);
        let overload = budget.overload.unwrap();
        assert_eq!(overload.rated, 1.0);
        assert_eq!(overload.demanded, 1.5);
        assert!(overload.to_string().contains("exceeds"));
    }

    #[test]
    fn test_linear_regulator_budget() {
        let mut tree = PowerTree::new();
        let ldo = Source::linear(
            1,
            "rail_3v3",
            volts("vin", 5.0),
            volts("vout", 3.3),
            amps("max_current", 0.3),
            amps("iq", 50.0e-6),
        )
        .unwrap();
        tree.add_source(ldo).unwrap();
        tree.add_load(1, Load::constant_current(2, "sensor", 0.15).unwrap())
            .unwrap();

        let budget = tree.nominal_budget(1).unwrap();
        let eff = budget.efficiency.unwrap();
        assert!((eff - 0.15 / 0.15005).abs() < 1e-12);
        assert!((eff - 0.9997).abs() < 1e-3);

        let expected_diss = (5.0 - 3.3) * 0.15 + 5.0 * 50.0e-6;
        assert!((budget.power_dissipation - expected_diss).abs() < 1e-12);
        // Energy balance: input power equals vin * (load + quiescent)
        assert!((budget.input_power - 5.0 * 0.15005).abs() < 1e-12);
    }

    #[test]
    fn test_cap_divider_budget() {
        let mut tree = PowerTree::new();
        let halver = Source::cap_divider(
            1,
            "halver",
            volts("vin", 10.0),
            2,
            amps("max_current", 1.0),
            EfficiencyModel::fixed(0.95).unwrap(),
        )
        .unwrap();
        tree.add_source(halver).unwrap();
        tree.add_load(1, Load::constant_current(2, "logic", 0.5).unwrap())
            .unwrap();

        let budget = tree.nominal_budget(1).unwrap();
        assert_eq!(budget.vout, 5.0);
        assert_eq!(budget.efficiency, Some(0.95));
        let expected_diss = (1.0 / 0.95 - 1.0) * 5.0 * 0.5;
        assert!((budget.power_dissipation - expected_diss).abs() < 1e-12);
        assert!((budget.input_power - (budget.output_power + expected_diss)).abs() < 1e-12);
    }

    #[test]
    fn test_monte_carlo_pass_stays_within_bounds() {
        let mut tree = PowerTree::new();
        let rail = Source::smps(
            1,
            "rail",
            volts("vin", 12.0),
            StatParam::with_distribution(
                "vout",
                "V",
                5.0,
                BoundKind::Percent,
                Distribution::Uniform,
                -10.0,
                10.0,
            )
            .unwrap(),
            amps("max_current", 1.0),
            EfficiencyModel::fixed(0.9).unwrap(),
        )
        .unwrap();
        tree.add_source(rail).unwrap();
        tree.add_load(1, Load::resistive(2, "heater", 10.0).unwrap())
            .unwrap();

        let mut rng = rand::rng();
        for _ in 0..200 {
            let budget = tree.budget(1, EvalMode::MonteCarlo, &mut rng).unwrap();
            assert!((4.5..=5.5).contains(&budget.vout));
            // Current tracks the sampled rail voltage through the same pass
            assert!((budget.total_current - budget.vout / 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_budget_default_follows_declared_mode() {
        fn sampled_vout() -> StatParam {
            StatParam::with_distribution(
                "vout",
                "V",
                5.0,
                BoundKind::Percent,
                Distribution::Uniform,
                -10.0,
                10.0,
            )
            .unwrap()
        }
        let mut tree = PowerTree::new();
        let declared_mc = Source::smps(
            1,
            "sampled_rail",
            volts("vin", 12.0),
            sampled_vout(),
            amps("max_current", 2.0),
            EfficiencyModel::fixed(0.9).unwrap(),
        )
        .unwrap()
        .with_mode(EvalMode::MonteCarlo);
        let undeclared = Source::smps(
            2,
            "plain_rail",
            volts("vin", 12.0),
            sampled_vout(),
            amps("max_current", 2.0),
            EfficiencyModel::fixed(0.9).unwrap(),
        )
        .unwrap();
        tree.add_source(declared_mc).unwrap();
        tree.add_source(undeclared).unwrap();
        tree.add_load(1, Load::resistive(3, "heater_a", 10.0).unwrap())
            .unwrap();
        tree.add_load(2, Load::resistive(4, "heater_b", 10.0).unwrap())
            .unwrap();

        assert_eq!(tree.declared_mode(1), EvalMode::MonteCarlo);
        assert_eq!(tree.declared_mode(2), EvalMode::Nominal);

        let vouts: Vec<f64> = (0..50)
            .map(|_| tree.budget_default(1).unwrap().vout)
            .collect();
        assert!(vouts.iter().all(|v| (4.5..=5.5).contains(v)));
        assert!(vouts.iter().any(|v| (v - 5.0).abs() > 1e-6));

        // A source declared without a mode always evaluates at nominals
        for _ in 0..10 {
            let budget = tree.budget_default(2).unwrap();
            assert_eq!(budget.mode, EvalMode::Nominal);
            assert_eq!(budget.vout, 5.0);
            assert!((budget.total_current - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_divergent_feedback_reports_unsolvable() {
        // 10 Ohm source impedance feeding a 1 Ohm load makes the naive
        // iteration oscillate instead of settling.
        let mut tree = PowerTree::new();
        let rail = smps_rail(1, 3.3, 2.0)
            .with_output_resistance(ohms("output_resistance", 10.0))
            .unwrap();
        tree.add_source(rail).unwrap();
        tree.add_load(1, Load::resistive(2, "heater", 1.0).unwrap())
            .unwrap();

        let result = tree.nominal_budget(1);
        assert!(matches!(result, Err(ModelError::Unsolvable { .. })));
    }

    #[test]
    fn test_unknown_source_rejected() {
        let tree = PowerTree::new();
        assert!(matches!(
            tree.nominal_budget(9),
            Err(ModelError::Validation { .. })
        ));
    }

    #[test]
    fn test_empty_source_draws_nothing() {
        let mut tree = PowerTree::new();
        tree.add_source(smps_rail(1, 5.0, 1.0)).unwrap();
        let budget = tree.nominal_budget(1).unwrap();
        assert_eq!(budget.total_current, 0.0);
        assert_eq!(budget.output_power, 0.0);
        assert!(budget.branches.is_empty());
    }

    #[test]
    fn test_trace_sees_completed_pass() {
        let trace = Arc::new(RecordingTrace::default());
        let mut tree = PowerTree::with_trace(trace.clone());
        tree.add_source(smps_rail(1, 5.0, 1.0)).unwrap();
        tree.add_load(1, Load::constant_current(2, "camera", 0.1).unwrap())
            .unwrap();
        tree.nominal_budget(1).unwrap();

        let events = trace.take();
        assert!(events
            .iter()
            .any(|event| event.starts_with("pass_completed 1 nominal")));
    }
}
