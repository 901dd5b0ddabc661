//! # Material model
//!
//! Temperature-dependent conductivity `k(T)` and specific heat `c_p(T)` built from a
//! base value and an optional law, plus phase-change constants and the advisory
//! thermal-zone classification.
//!
//! ## Property laws
//! | Law | Value at T (°C) |
//! |-----|-----------------|
//! | `constant` | `base` |
//! | `polynomial` | `base + a1·T + a2·T² + ...` |
//! | `formula` | user expression in `T`, `base` and user variables |
//!
//! A law that fails to evaluate, or returns a non-positive value, falls back to the
//! base value for that node; fallbacks are counted so the controller can report them.
use crate::Utils::formula::Formula;
use crate::errors::{FurnaceError, FurnaceResult};
use enum_dispatch::enum_dispatch;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// latent heat of water evaporation (J/kg), used for the drying band
pub const L_WATER: f64 = 2.257e6;
/// evaporation temperature of moisture (°C)
pub const T_DRYING: f64 = 100.0;

#[enum_dispatch]
pub trait PropertyCurve {
    /// raw law value; may fail or be non-physical, see [`MaterialModel`] for the fallback
    fn value_at(&self, base: f64, t: f64) -> FurnaceResult<f64>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantLaw {}

impl PropertyCurve for ConstantLaw {
    fn value_at(&self, base: f64, _t: f64) -> FurnaceResult<f64> {
        Ok(base)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialLaw {
    /// `[a1, a2, ...]`, added to the base value as `a1·T + a2·T² + ...`
    pub coefficients: Vec<f64>,
}

impl PropertyCurve for PolynomialLaw {
    fn value_at(&self, base: f64, t: f64) -> FurnaceResult<f64> {
        // Horner on a1 + a2 T + ..., then one more factor of T
        let tail = self.coefficients.iter().rev().fold(0.0, |acc, a| acc * t + a);
        Ok(base + tail * t)
    }
}

/// Serialized form of [`FormulaLaw`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSpec {
    pub expression: String,
    #[serde(default)]
    pub variables: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FormulaSpec", into = "FormulaSpec")]
pub struct FormulaLaw {
    formula: Formula,
    /// `[T, base, user values...]` in compile order, with `T` and `base` as placeholders
    values: Vec<f64>,
    spec: FormulaSpec,
}

impl FormulaLaw {
    pub fn new(expression: &str, variables: BTreeMap<String, f64>) -> FurnaceResult<Self> {
        let mut names: Vec<&str> = vec!["T", "base"];
        names.extend(variables.keys().map(|k| k.as_str()));
        let formula = Formula::compile(expression, &names)?;
        let mut values = vec![0.0, 0.0];
        values.extend(variables.values().copied());
        Ok(Self {
            formula,
            values,
            spec: FormulaSpec {
                expression: expression.to_string(),
                variables,
            },
        })
    }
}

impl TryFrom<FormulaSpec> for FormulaLaw {
    type Error = FurnaceError;
    fn try_from(spec: FormulaSpec) -> Result<Self, Self::Error> {
        FormulaLaw::new(&spec.expression, spec.variables)
    }
}

impl From<FormulaLaw> for FormulaSpec {
    fn from(law: FormulaLaw) -> Self {
        law.spec
    }
}

impl PropertyCurve for FormulaLaw {
    fn value_at(&self, base: f64, t: f64) -> FurnaceResult<f64> {
        let mut values = self.values.clone();
        values[0] = t;
        values[1] = base;
        self.formula.eval(&values)
    }
}

#[enum_dispatch(PropertyCurve)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PropertyLaw {
    Constant(ConstantLaw),
    Polynomial(PolynomialLaw),
    Formula(FormulaLaw),
}

impl Default for PropertyLaw {
    fn default() -> Self {
        PropertyLaw::Constant(ConstantLaw {})
    }
}

/// Material data supplied once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialProperties {
    /// ρ (kg/m³)
    pub density: f64,
    /// base c_p (J/(kg·K))
    pub specific_heat: f64,
    /// base k (W/(m·K))
    pub thermal_conductivity: f64,
    /// ε, 0..1
    pub emissivity: f64,
    /// °C
    pub melting_point: Option<f64>,
    /// J/kg
    #[serde(alias = "latentHeat")]
    pub latent_heat_fusion: Option<f64>,
    /// °C
    pub vaporization_point: Option<f64>,
    /// J/kg
    pub latent_heat_vaporization: Option<f64>,
    /// water mass fraction, 0..1
    pub moisture_content: f64,
    /// width ΔT_pc of the band each latent heat is smeared over (K)
    pub phase_change_interval: f64,
    pub conductivity_law: PropertyLaw,
    pub specific_heat_law: PropertyLaw,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            density: 2500.0,
            specific_heat: 1000.0,
            thermal_conductivity: 1.5,
            emissivity: 0.85,
            melting_point: None,
            latent_heat_fusion: None,
            vaporization_point: None,
            latent_heat_vaporization: None,
            moisture_content: 0.0,
            phase_change_interval: 10.0,
            conductivity_law: PropertyLaw::default(),
            specific_heat_law: PropertyLaw::default(),
        }
    }
}

impl MaterialProperties {
    pub fn validate(&self) -> FurnaceResult<()> {
        let positive = |name: &str, v: f64| -> FurnaceResult<()> {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(FurnaceError::validation(name, format!("must be positive, got {}", v)))
            }
        };
        positive("density", self.density)?;
        positive("specificHeat", self.specific_heat)?;
        positive("thermalConductivity", self.thermal_conductivity)?;
        positive("phaseChangeInterval", self.phase_change_interval)?;
        if !(0.0..=1.0).contains(&self.emissivity) {
            return Err(FurnaceError::validation(
                "emissivity",
                format!("must lie in [0, 1], got {}", self.emissivity),
            ));
        }
        if !(0.0..1.0).contains(&self.moisture_content) {
            return Err(FurnaceError::validation(
                "moistureContent",
                format!("must lie in [0, 1), got {}", self.moisture_content),
            ));
        }
        for (name, v) in [
            ("latentHeatFusion", self.latent_heat_fusion),
            ("latentHeatVaporization", self.latent_heat_vaporization),
        ] {
            if let Some(v) = v {
                if !(v >= 0.0 && v.is_finite()) {
                    return Err(FurnaceError::validation(name, format!("must be >= 0, got {}", v)));
                }
            }
        }
        if let (Some(tm), Some(tv)) = (self.melting_point, self.vaporization_point) {
            if tv - tm <= self.phase_change_interval {
                return Err(FurnaceError::validation(
                    "vaporizationPoint",
                    format!(
                        "must exceed meltingPoint {} by more than the phase change interval",
                        tm
                    ),
                ));
            }
        }
        if self.moisture_content > 0.0 {
            if let Some(tm) = self.melting_point {
                if tm - T_DRYING <= self.phase_change_interval {
                    return Err(FurnaceError::validation(
                        "meltingPoint",
                        "moist material must melt well above the drying temperature",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Advisory classification of a node by temperature (°C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThermalZone {
    Drying,
    Pyrolysis,
    Gasification,
    Melting,
}

/// Kinetics switches selected by a zone, for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneKinetics {
    pub moisture_release: bool,
    pub volatile_release: bool,
    pub char_gasification: bool,
    pub slag_formation: bool,
}

impl ThermalZone {
    pub const ALL: [ThermalZone; 4] = [
        ThermalZone::Drying,
        ThermalZone::Pyrolysis,
        ThermalZone::Gasification,
        ThermalZone::Melting,
    ];

    pub fn kinetics(&self) -> ZoneKinetics {
        let mut k = ZoneKinetics {
            moisture_release: false,
            volatile_release: false,
            char_gasification: false,
            slag_formation: false,
        };
        match self {
            ThermalZone::Drying => k.moisture_release = true,
            ThermalZone::Pyrolysis => k.volatile_release = true,
            ThermalZone::Gasification => k.char_gasification = true,
            ThermalZone::Melting => k.slag_formation = true,
        }
        k
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ThermalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThermalZone::Drying => "drying",
            ThermalZone::Pyrolysis => "pyrolysis",
            ThermalZone::Gasification => "gasification",
            ThermalZone::Melting => "melting",
        };
        write!(f, "{}", name)
    }
}

/// T < 100 °C drying, < 400 °C pyrolysis, <= 1000 °C gasification, above that melting.
pub fn classify_zone(t: f64) -> ThermalZone {
    if t < 100.0 {
        ThermalZone::Drying
    } else if t < 400.0 {
        ThermalZone::Pyrolysis
    } else if t <= 1000.0 {
        ThermalZone::Gasification
    } else {
        ThermalZone::Melting
    }
}

#[derive(Debug)]
pub struct MaterialModel {
    pub props: MaterialProperties,
    fallbacks: AtomicUsize,
}

impl Clone for MaterialModel {
    fn clone(&self) -> Self {
        Self {
            props: self.props.clone(),
            fallbacks: AtomicUsize::new(self.fallbacks.load(Ordering::Relaxed)),
        }
    }
}

impl MaterialModel {
    pub fn new(props: MaterialProperties) -> FurnaceResult<Self> {
        props.validate()?;
        Ok(Self {
            props,
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn evaluate(&self, law: &PropertyLaw, base: f64, t: f64) -> f64 {
        match law.value_at(base, t) {
            Ok(v) if v > 0.0 && v.is_finite() => v,
            Ok(v) => {
                debug!(
                    "property law gave non-physical value {} at T = {}, using base {}",
                    v, t, base
                );
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                base
            }
            Err(e) => {
                debug!("{} at T = {}, using base {}", e, t, base);
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                base
            }
        }
    }

    /// k(T), W/(m·K)
    pub fn conductivity(&self, t: f64) -> f64 {
        self.evaluate(&self.props.conductivity_law, self.props.thermal_conductivity, t)
    }

    /// c_p(T), J/(kg·K), sensible part only
    pub fn specific_heat(&self, t: f64) -> f64 {
        self.evaluate(&self.props.specific_heat_law, self.props.specific_heat, t)
    }

    pub fn density(&self) -> f64 {
        self.props.density
    }

    pub fn emissivity(&self) -> f64 {
        self.props.emissivity
    }

    pub fn classify_zone(&self, t: f64) -> ThermalZone {
        classify_zone(t)
    }

    /// Number of law fallbacks since the last call; resets the counter.
    pub fn take_fallbacks(&self) -> usize {
        self.fallbacks.swap(0, Ordering::Relaxed)
    }

    /// `(temperature, latent heat)` pairs of all active transitions, sorted by temperature
    pub fn transitions(&self) -> Vec<(f64, f64)> {
        let p = &self.props;
        let mut out = Vec::new();
        if p.moisture_content > 0.0 {
            out.push((T_DRYING, p.moisture_content * L_WATER));
        }
        if let (Some(t), Some(l)) = (p.melting_point, p.latent_heat_fusion) {
            if l > 0.0 {
                out.push((t, l));
            }
        }
        if let (Some(t), Some(l)) = (p.vaporization_point, p.latent_heat_vaporization) {
            if l > 0.0 {
                out.push((t, l));
            }
        }
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        out
    }
}
