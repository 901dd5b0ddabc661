//! Versioned result record handed to consumers after every committed step.
use crate::HeatTransfer::mesh::Mesh;
use crate::Simulation::diagnostics::StepDiagnostics;
use crate::Simulation::state::{FieldState, SimulationState};
use crate::errors::FurnaceResult;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    pub schema_version: u32,
    pub step: usize,
    /// s
    pub time: f64,
    pub state: SimulationState,
    pub nr: usize,
    pub nz: usize,
    pub dr: f64,
    pub dz: f64,
    /// °C, row-major with r fastest
    pub temperature: Vec<f64>,
    pub phase_fraction: Vec<f64>,
    pub diagnostics: Option<StepDiagnostics>,
}

impl ResultSnapshot {
    pub fn new(
        mesh: &Mesh,
        step: usize,
        time: f64,
        state: SimulationState,
        field: &FieldState,
        diagnostics: Option<StepDiagnostics>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            step,
            time,
            state,
            nr: mesh.nr,
            nz: mesh.nz,
            dr: mesh.dr,
            dz: mesh.dz,
            temperature: field.temperature.iter().copied().collect(),
            phase_fraction: field.phase_fraction.iter().copied().collect(),
            diagnostics,
        }
    }

    /// temperature of node `(i, j)`
    pub fn temperature_at(&self, i: usize, j: usize) -> f64 {
        self.temperature[j * self.nr + i]
    }

    pub fn to_json(&self) -> FurnaceResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> FurnaceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
