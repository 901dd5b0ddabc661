use crate::HeatTransfer::boundary::BoundaryConditionHandler;
use crate::HeatTransfer::enthalpy::EnthalpyMap;
use crate::HeatTransfer::material::{ThermalZone, classify_zone};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationState {
    NotStarted,
    Running,
    Paused,
    Completed,
    Failed,
}

impl SimulationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SimulationState::Completed | SimulationState::Failed)
    }
}

impl fmt::Display for SimulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Per-node state of the charge. Node order follows `Mesh::idx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    /// T (°C)
    pub temperature: DVector<f64>,
    /// H (J/kg), zero at 0 °C
    pub enthalpy: DVector<f64>,
    /// melt fraction, 0..1
    pub phase_fraction: DVector<f64>,
    /// vapor fraction, 0..1
    pub vapor_fraction: DVector<f64>,
    pub zones: Vec<ThermalZone>,
}

impl FieldState {
    /// Uniform field with the fixed boundary values imposed.
    pub fn initial(
        n: usize,
        t0: f64,
        map: &EnthalpyMap,
        boundary: &BoundaryConditionHandler,
    ) -> Self {
        let mut temperature = DVector::from_element(n, t0);
        boundary.impose_fixed(&mut temperature);
        let enthalpy = temperature.map(|t| map.enthalpy(t));
        Self::from_enthalpy(enthalpy, map)
    }

    /// Recovers T, the phase fractions and the zones from H.
    pub fn from_enthalpy(enthalpy: DVector<f64>, map: &EnthalpyMap) -> Self {
        let temperature = enthalpy.map(|h| map.temperature(h));
        let phase_fraction = enthalpy.map(|h| map.melt_fraction(h));
        let vapor_fraction = enthalpy.map(|h| map.vapor_fraction(h));
        let zones = temperature.iter().map(|t| classify_zone(*t)).collect();
        Self {
            temperature,
            enthalpy,
            phase_fraction,
            vapor_fraction,
            zones,
        }
    }

    pub fn len(&self) -> usize {
        self.temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty()
    }

    /// node counts per zone, indexed by `ThermalZone::index`
    pub fn zone_counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for z in &self.zones {
            counts[z.index()] += 1;
        }
        counts
    }
}
