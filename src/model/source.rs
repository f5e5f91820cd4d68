//! Power sources
//!
//! A source is the root of a power tree: a regulated rail with an input
//! voltage, an output voltage, a current rating, and a conversion topology.
//! Switch-mode and capacitive-divider sources carry an [`EfficiencyModel`];
//! linear regulators derive their efficiency analytically from the input
//! voltage, the load current, and their quiescent current.

use std::fmt;

use rand::Rng;

use crate::core::error::ModelError;
use crate::core::param::{EvalMode, StatParam};
use crate::model::component::{Element, StateTags};
use crate::model::efficiency::EfficiencyModel;

/// Regulation topology of a source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// Switch-mode converter with a measured efficiency
    Smps { efficiency: EfficiencyModel },
    /// Switched-capacitor divider; vout is vin divided by an integer ratio
    CapDivider {
        divider: u32,
        efficiency: EfficiencyModel,
    },
    /// Linear regulator; efficiency follows from vin, load current, and iq
    Linear {
        iq: StatParam,
        dropout: Option<StatParam>,
    },
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Smps { .. } => write!(f, "smps"),
            SourceKind::CapDivider { .. } => write!(f, "cap_divider"),
            SourceKind::Linear { .. } => write!(f, "linear"),
        }
    }
}

/// A regulated rail feeding a tree of loads and switches
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    id: u32,
    name: String,
    sub_system_id: Option<u32>,
    tags: StateTags,
    mode: EvalMode,
    vin: StatParam,
    vout: StatParam,
    max_current: StatParam,
    input_resistance: StatParam,
    output_resistance: StatParam,
    kind: SourceKind,
    loads: Vec<u32>,
}

impl Source {
    /// Switch-mode converter
    pub fn smps(
        id: u32,
        name: impl Into<String>,
        vin: StatParam,
        vout: StatParam,
        max_current: StatParam,
        efficiency: EfficiencyModel,
    ) -> Result<Self, ModelError> {
        Self::build(id, name.into(), vin, vout, max_current, SourceKind::Smps { efficiency })
    }

    /// Switched-capacitor divider.
    ///
    /// The output voltage is derived here as `vin.nominal / divider` and is
    /// not sampled independently.
    pub fn cap_divider(
        id: u32,
        name: impl Into<String>,
        vin: StatParam,
        divider: u32,
        max_current: StatParam,
        efficiency: EfficiencyModel,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        if divider == 0 {
            return Err(ModelError::validation(
                format!("source '{}'", name),
                "divider ratio must be at least 1",
            ));
        }
        let vout = StatParam::constant("vout", "V", vin.nominal() / divider as f64);
        Self::build(
            id,
            name,
            vin,
            vout,
            max_current,
            SourceKind::CapDivider { divider, efficiency },
        )
    }

    /// Linear regulator with quiescent current `iq`
    pub fn linear(
        id: u32,
        name: impl Into<String>,
        vin: StatParam,
        vout: StatParam,
        max_current: StatParam,
        iq: StatParam,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        if iq.nominal() < 0.0 {
            return Err(ModelError::validation(
                format!("source '{}'", name),
                "quiescent current cannot be negative",
            ));
        }
        Self::build(id, name, vin, vout, max_current, SourceKind::Linear { iq, dropout: None })
    }

    fn build(
        id: u32,
        name: String,
        vin: StatParam,
        vout: StatParam,
        max_current: StatParam,
        kind: SourceKind,
    ) -> Result<Self, ModelError> {
        if vin.nominal() <= 0.0 {
            return Err(ModelError::validation(
                format!("source '{}'", name),
                "input voltage must be positive",
            ));
        }
        if vout.nominal() <= 0.0 {
            return Err(ModelError::validation(
                format!("source '{}'", name),
                "output voltage must be positive",
            ));
        }
        if max_current.nominal() <= 0.0 {
            return Err(ModelError::validation(
                format!("source '{}'", name),
                "current rating must be positive",
            ));
        }
        Ok(Self {
            id,
            name,
            sub_system_id: None,
            tags: StateTags::default(),
            mode: EvalMode::Nominal,
            vin,
            vout,
            max_current,
            input_resistance: StatParam::constant("input_resistance", "Ohm", 0.0),
            output_resistance: StatParam::constant("output_resistance", "Ohm", 0.0),
            kind,
            loads: Vec::new(),
        })
    }

    /// Datasheet dropout voltage; only meaningful for linear regulators
    pub fn with_dropout(mut self, dropout: StatParam) -> Result<Self, ModelError> {
        match &mut self.kind {
            SourceKind::Linear { dropout: slot, .. } => {
                if dropout.nominal() < 0.0 {
                    return Err(ModelError::validation(
                        format!("source '{}'", self.name),
                        "dropout voltage cannot be negative",
                    ));
                }
                *slot = Some(dropout);
                Ok(self)
            }
            _ => Err(ModelError::validation(
                format!("source '{}'", self.name),
                "dropout voltage only applies to linear regulators",
            )),
        }
    }

    pub fn with_input_resistance(mut self, resistance: StatParam) -> Result<Self, ModelError> {
        check_resistance(&resistance, &self.name)?;
        self.input_resistance = resistance;
        Ok(self)
    }

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

    pub fn vin(&self) -> &StatParam {
        &self.vin
    }

    pub fn vout(&self) -> &StatParam {
        &self.vout
    }

    pub fn max_current(&self) -> &StatParam {
        &self.max_current
    }

    pub fn input_resistance(&self) -> &StatParam {
        &self.input_resistance
    }

    pub fn output_resistance(&self) -> &StatParam {
        &self.output_resistance
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// Ids of the top-level components fed by this source, in insertion order
    pub fn loads(&self) -> &[u32] {
        &self.loads
    }

    pub(crate) fn loads_mut(&mut self) -> &mut Vec<u32> {
        &mut self.loads
    }

    /// Conversion efficiency at the given output current.
    ///
    /// Linear regulators sample vin and iq once for this call; the result is
    /// `None` when the drawn input power is zero and efficiency is undefined.
    pub fn efficiency<R: Rng>(
        &self,
        current: f64,
        mode: EvalMode,
        rng: &mut R,
    ) -> Result<Option<f64>, ModelError> {
        match &self.kind {
            SourceKind::Smps { efficiency } | SourceKind::CapDivider { efficiency, .. } => {
                efficiency.get_efficiency(Some(current)).map(Some)
            }
            SourceKind::Linear { iq, .. } => {
                let vin = self.vin.get_value(mode, rng)?;
                let iq = iq.get_value(mode, rng)?;
                Ok(linear_efficiency(vin, current, iq))
            }
        }
    }
}

impl Element for Source {
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
            format!("source '{}'", name),
            format!("{} cannot be negative", resistance.name()),
        ));
    }
    Ok(())
}

/// Efficiency of a linear regulator: output power over input power, with the
/// input carrying the quiescent current on top of the load current.
///
/// `None` when the input power is zero and the ratio is undefined.
pub(crate) fn linear_efficiency(vin: f64, current: f64, iq: f64) -> Option<f64> {
    let input_power = vin * (current + iq);
    if input_power == 0.0 {
        return None;
    }
    Some((vin * current) / input_power)
}

/// Dissipation of a switch-mode or divider stage delivering `current` at
/// `vout` with the given efficiency
pub(crate) fn switcher_dissipation(efficiency: f64, vout: f64, current: f64) -> f64 {
    (1.0 / efficiency - 1.0) * vout * current
}

/// Dissipation of a linear stage: the headroom drop plus the quiescent draw
pub(crate) fn linear_dissipation(vin: f64, vout: f64, current: f64, iq: f64) -> f64 {
    (vin - vout) * current + vin * iq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volts(name: &str, value: f64) -> StatParam {
        StatParam::new(name, "V", value).unwrap()
    }

    fn amps(name: &str, value: f64) -> StatParam {
        StatParam::new(name, "A", value).unwrap()
    }

    #[test]
    fn test_cap_divider_derives_vout() {
        let source = Source::cap_divider(
            1,
            "halver",
            volts("vin", 10.0),
            2,
            amps("max_current", 1.0),
            EfficiencyModel::fixed(0.95).unwrap(),
        )
        .unwrap();
        assert_eq!(source.vout().nominal(), 5.0);
        assert!(matches!(source.kind(), SourceKind::CapDivider { divider: 2, .. }));
    }

    #[test]
    fn test_cap_divider_rejects_zero_ratio() {
        let result = Source::cap_divider(
            1,
            "halver",
            volts("vin", 10.0),
            0,
            amps("max_current", 1.0),
            EfficiencyModel::fixed(0.95).unwrap(),
        );
        assert!(matches!(result, Err(ModelError::Validation { .. })));
    }

    #[test]
    fn test_linear_efficiency_formula() {
        // 5 V in, 150 mA load, 50 uA quiescent
        let eff = linear_efficiency(5.0, 0.15, 50.0e-6).unwrap();
        assert!((eff - 0.15 / 0.15005).abs() < 1e-12);
        assert!((eff - 0.9997).abs() < 1e-3);
    }

    #[test]
    fn test_linear_efficiency_undefined_with_no_input_power() {
        assert_eq!(linear_efficiency(5.0, 0.0, 0.0), None);
        // With quiescent draw but no load the rail burns power at zero output
        assert_eq!(linear_efficiency(5.0, 0.0, 50.0e-6), Some(0.0));
    }

    #[test]
    fn test_source_efficiency_by_kind() {
        let mut rng = rand::rng();
        let smps = Source::smps(
            1,
            "rail_3v3",
            volts("vin", 5.0),
            volts("vout", 3.3),
            amps("max_current", 2.0),
            EfficiencyModel::fixed(0.9).unwrap(),
        )
        .unwrap();
        let eff = smps.efficiency(0.5, EvalMode::Nominal, &mut rng).unwrap();
        assert_eq!(eff, Some(0.9));

        let ldo = Source::linear(
            2,
            "rail_1v8",
            volts("vin", 5.0),
            volts("vout", 1.8),
            amps("max_current", 0.3),
            amps("iq", 50.0e-6),
        )
        .unwrap();
        let eff = ldo
            .efficiency(0.15, EvalMode::Nominal, &mut rng)
            .unwrap()
            .unwrap();
        assert!((eff - 0.15 / 0.15005).abs() < 1e-12);
    }

    #[test]
    fn test_dissipation_formulas() {
        // 90% efficient switcher delivering 1 A at 3.3 V wastes 366.7 mW
        let p = switcher_dissipation(0.9, 3.3, 1.0);
        assert!((p - (1.0 / 0.9 - 1.0) * 3.3).abs() < 1e-12);

        // Linear 5 V -> 1.8 V at 150 mA with 50 uA iq
        let p = linear_dissipation(5.0, 1.8, 0.15, 50.0e-6);
        assert!((p - (3.2 * 0.15 + 5.0 * 50.0e-6)).abs() < 1e-12);
    }

    #[test]
    fn test_dropout_only_on_linear() {
        let smps = Source::smps(
            1,
            "rail_3v3",
            volts("vin", 5.0),
            volts("vout", 3.3),
            amps("max_current", 2.0),
            EfficiencyModel::fixed(0.9).unwrap(),
        )
        .unwrap();
        assert!(smps.with_dropout(volts("dropout", 0.3)).is_err());

        let ldo = Source::linear(
            2,
            "rail_1v8",
            volts("vin", 5.0),
            volts("vout", 1.8),
            amps("max_current", 0.3),
            amps("iq", 50.0e-6),
        )
        .unwrap()
        .with_dropout(volts("dropout", 0.3))
        .unwrap();
        match ldo.kind() {
            SourceKind::Linear { dropout, .. } => {
                assert_eq!(dropout.as_ref().map(|d| d.nominal()), Some(0.3));
            }
            _ => panic!("expected a linear source"),
        }
    }

    #[test]
    fn test_invalid_rails_rejected() {
        let eff = EfficiencyModel::fixed(0.9).unwrap();
        assert!(Source::smps(
            1,
            "s",
            volts("vin", 0.0),
            volts("vout", 3.3),
            amps("max_current", 1.0),
            eff.clone(),
        )
        .is_err());
        assert!(Source::smps(
            1,
            "s",
            volts("vin", 5.0),
            volts("vout", -1.0),
            amps("max_current", 1.0),
            eff.clone(),
        )
        .is_err());
        assert!(Source::smps(
            1,
            "s",
            volts("vin", 5.0),
            volts("vout", 3.3),
            amps("max_current", 0.0),
            eff,
        )
        .is_err());
    }
}
