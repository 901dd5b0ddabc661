//! # Simulation parameters
//!
//! Flat JSON record with the keys used by the configuration front end. Every key is
//! optional and falls back to the value in [`SimulationParameters::default`].
//!
//! ```json
//! {
//!   "furnaceRadius": 0.5, "furnaceHeight": 1.5,
//!   "meshRadialCells": 26, "meshAxialCells": 61,
//!   "simulationTimeStep": 0.5, "simulationDuration": 120.0,
//!   "maxIterations": 5000, "convergenceTolerance": 1e-6,
//!   "initialTemperature": 25.0, "ambientTemperature": 25.0,
//!   "convectionCoefficient": 15.0, "enableConvection": true, "enableRadiation": true,
//!   "boundary": {"wall": {"type": "robin"},
//!                "bottom": {"type": "adiabatic"}, "top": {"type": "adiabatic"}},
//!   "torches": [{"rPosition": 0.0, "zPosition": 1.4, "power": 150.0, "efficiency": 0.7,
//!                "pitch": 90.0, "yaw": 0.0, "gasTemperature": 6000.0}],
//!   "material": {"density": 2500.0, "specificHeat": 1000.0, "thermalConductivity": 1.5,
//!                "emissivity": 0.85, "meltingPoint": 1300.0, "latentHeat": 4.0e5}
//! }
//! ```
//!
//! `meshRadialCells` / `meshAxialCells` are node counts (`Nr`, `Nz`), temperatures are
//! in °C except the torch gas temperature (K), torch power is in kW. A torch may also
//! be given as `torchPosition` `{r, z}`, `torchDirection` `{pitch, yaw}`, `torchPower`,
//! `torchEfficiency` and `torchTemperature`.
use crate::HeatTransfer::boundary::{BoundarySettings, EndCondition, WallCondition};
use crate::HeatTransfer::discretizer::SourceTreatment;
use crate::HeatTransfer::material::MaterialProperties;
use crate::HeatTransfer::mesh::Mesh;
use crate::HeatTransfer::sor_solver::{SorSettings, SweepOrder};
use crate::HeatTransfer::torch::{KELVIN, PlasmaTorch};
use crate::errors::{FurnaceError, FurnaceResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationParameters {
    /// R (m)
    pub furnace_radius: f64,
    /// H (m)
    pub furnace_height: f64,
    /// Nr
    pub mesh_radial_cells: usize,
    /// Nz
    pub mesh_axial_cells: usize,
    /// Δt (s)
    pub simulation_time_step: f64,
    /// total simulated time (s)
    pub simulation_duration: f64,
    pub max_iterations: usize,
    /// largest temperature update (K) at which SOR stops
    pub convergence_tolerance: f64,
    /// ω
    pub relaxation_factor: f64,
    pub sweep_order: SweepOrder,
    /// tolerance multiplier of the single retry after a non-converged step
    pub retry_tolerance_factor: f64,
    pub source_treatment: SourceTreatment,
    /// °C
    pub initial_temperature: f64,
    /// °C
    pub ambient_temperature: f64,
    /// h (W/(m²·K)) for the wall and the torch gas
    pub convection_coefficient: f64,
    pub enable_convection: bool,
    pub enable_radiation: bool,
    pub boundary: BoundarySettings,
    pub torches: Vec<PlasmaTorch>,
    pub material: MaterialProperties,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            furnace_radius: 0.5,
            furnace_height: 1.5,
            mesh_radial_cells: 26,
            mesh_axial_cells: 61,
            simulation_time_step: 0.5,
            simulation_duration: 60.0,
            max_iterations: 5000,
            convergence_tolerance: 1e-6,
            relaxation_factor: 1.3,
            sweep_order: SweepOrder::Lexicographic,
            retry_tolerance_factor: 10.0,
            source_treatment: SourceTreatment::Explicit,
            initial_temperature: 25.0,
            ambient_temperature: 25.0,
            convection_coefficient: 15.0,
            enable_convection: true,
            enable_radiation: true,
            boundary: BoundarySettings::default(),
            torches: vec![PlasmaTorch {
                r_position: 0.0,
                z_position: 1.4,
                pitch: 90.0,
                ..Default::default()
            }],
            material: MaterialProperties::default(),
        }
    }
}

fn require(field: &str, ok: bool, message: impl Into<String>) -> FurnaceResult<()> {
    if ok {
        Ok(())
    } else {
        Err(FurnaceError::validation(field, message))
    }
}

impl SimulationParameters {
    pub fn from_json_str(json: &str) -> FurnaceResult<Self> {
        let params: SimulationParameters = serde_json::from_str(json)?;
        Ok(params)
    }

    pub fn from_file(path: impl AsRef<Path>) -> FurnaceResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let params = Self::from_json_str(&text)?;
        info!("parameters loaded from {}", path.display());
        Ok(params)
    }

    pub fn to_json(&self) -> FurnaceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> FurnaceResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Builds the grid; fails with E002 on bad dimensions.
    pub fn mesh(&self) -> FurnaceResult<Mesh> {
        Mesh::new(
            self.mesh_radial_cells,
            self.mesh_axial_cells,
            self.furnace_radius,
            self.furnace_height,
        )
    }

    pub fn sor_settings(&self) -> SorSettings {
        SorSettings {
            omega: self.relaxation_factor,
            tolerance: self.convergence_tolerance,
            max_iterations: self.max_iterations,
            order: self.sweep_order,
            record_history: false,
        }
    }

    /// number of steps needed to reach the duration; the last one may be shorter
    pub fn step_count(&self) -> usize {
        (self.simulation_duration / self.simulation_time_step - 1e-9).ceil().max(1.0) as usize
    }

    /// Range and consistency checks; the first violation is returned.
    pub fn validate(&self) -> FurnaceResult<()> {
        let finite_pos = |v: f64| v > 0.0 && v.is_finite();
        require("furnaceRadius", finite_pos(self.furnace_radius), "must be positive")?;
        require("furnaceHeight", finite_pos(self.furnace_height), "must be positive")?;
        self.mesh()?;
        require("simulationTimeStep", finite_pos(self.simulation_time_step), "must be positive")?;
        require("simulationDuration", finite_pos(self.simulation_duration), "must be positive")?;
        require(
            "simulationTimeStep",
            self.simulation_time_step <= self.simulation_duration,
            "must not exceed the simulation duration",
        )?;
        require("maxIterations", self.max_iterations >= 1, "must be at least 1")?;
        require(
            "convergenceTolerance",
            finite_pos(self.convergence_tolerance),
            "must be positive",
        )?;
        require(
            "relaxationFactor",
            self.relaxation_factor > 1.0 && self.relaxation_factor < 2.0,
            format!("{} is outside (1, 2)", self.relaxation_factor),
        )?;
        require(
            "retryToleranceFactor",
            self.retry_tolerance_factor >= 1.0 && self.retry_tolerance_factor.is_finite(),
            "must be >= 1",
        )?;
        for (name, t) in [
            ("initialTemperature", self.initial_temperature),
            ("ambientTemperature", self.ambient_temperature),
        ] {
            require(
                name,
                t.is_finite() && t > -KELVIN,
                format!("{} °C is below absolute zero", t),
            )?;
        }
        require(
            "convectionCoefficient",
            self.convection_coefficient >= 0.0 && self.convection_coefficient.is_finite(),
            "must be >= 0",
        )?;
        self.boundary.validate()?;
        for (index, torch) in self.torches.iter().enumerate() {
            torch.validate(index, self.furnace_radius, self.furnace_height)?;
        }
        self.material.validate()?;
        Ok(())
    }

    /// Temperature span (°C) the enthalpy table has to cover for this run.
    pub fn temperature_range(&self) -> (f64, f64) {
        let mut lo = self.initial_temperature.min(self.ambient_temperature);
        let mut hi = self.initial_temperature.max(self.ambient_temperature);
        let mut include = |t: f64| {
            lo = lo.min(t);
            hi = hi.max(t);
        };
        for torch in &self.torches {
            include(torch.gas_temperature - KELVIN);
        }
        for t in [
            self.material.melting_point,
            self.material.vaporization_point,
        ]
        .into_iter()
        .flatten()
        {
            include(t);
        }
        if let WallCondition::FixedTemperature { temperature } = self.boundary.wall {
            include(temperature);
        }
        for end in [self.boundary.bottom, self.boundary.top] {
            if let EndCondition::FixedTemperature { temperature } = end {
                include(temperature);
            }
        }
        ((lo - 200.0).max(-KELVIN), hi + 1000.0)
    }
}

impl SimulationParameters {
    pub fn pretty_print(&self) {
        use prettytable::{Table, row};
        println!("\n=== FURNACE TASK SUMMARY ===");
        let mut table = Table::new();
        table.add_row(row!["Parameter", "Value", "Units"]);
        table.add_row(row!["Radius (R)", format!("{:.3}", self.furnace_radius), "m"]);
        table.add_row(row!["Height (H)", format!("{:.3}", self.furnace_height), "m"]);
        table.add_row(row![
            "Grid (Nr x Nz)",
            format!("{} x {}", self.mesh_radial_cells, self.mesh_axial_cells),
            "nodes"
        ]);
        table.add_row(row!["Time step", format!("{}", self.simulation_time_step), "s"]);
        table.add_row(row!["Duration", format!("{}", self.simulation_duration), "s"]);
        table.add_row(row!["SOR omega", format!("{}", self.relaxation_factor), "-"]);
        table.add_row(row!["SOR tolerance", format!("{:.1e}", self.convergence_tolerance), "K"]);
        table.add_row(row!["Initial T", format!("{:.1}", self.initial_temperature), "°C"]);
        table.add_row(row!["Ambient T", format!("{:.1}", self.ambient_temperature), "°C"]);
        table.add_row(row!["Density", format!("{:.1}", self.material.density), "kg/m³"]);
        table.add_row(row![
            "Conductivity",
            format!("{:.3}", self.material.thermal_conductivity),
            "W/(m·K)"
        ]);
        table.add_row(row![
            "Specific heat",
            format!("{:.1}", self.material.specific_heat),
            "J/(kg·K)"
        ]);
        if let Some(tm) = self.material.melting_point {
            table.add_row(row!["Melting point", format!("{:.1}", tm), "°C"]);
        }
        table.printstd();

        if !self.torches.is_empty() {
            let mut torches = Table::new();
            torches.add_row(row!["#", "r, m", "z, m", "pitch", "yaw", "P, kW", "eta", "T gas, K"]);
            for (n, t) in self.torches.iter().enumerate() {
                torches.add_row(row![
                    n,
                    format!("{:.3}", t.r_position),
                    format!("{:.3}", t.z_position),
                    format!("{:.1}", t.pitch),
                    format!("{:.1}", t.yaw),
                    format!("{:.1}", t.power),
                    format!("{:.2}", t.efficiency),
                    format!("{:.0}", t.gas_temperature)
                ]);
            }
            torches.printstd();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        SimulationParameters::default().validate().unwrap();
    }

    #[test]
    fn partial_json_uses_defaults() {
        let params = SimulationParameters::from_json_str(
            r#"{"furnaceRadius": 0.8, "meshRadialCells": 11, "torches": []}"#,
        )
        .unwrap();
        assert_eq!(params.furnace_radius, 0.8);
        assert_eq!(params.mesh_radial_cells, 11);
        assert_eq!(params.mesh_axial_cells, 61);
        assert!(params.torches.is_empty());
        params.validate().unwrap();
    }

    #[test]
    fn torch_outside_the_domain_is_rejected() {
        let mut params = SimulationParameters::default();
        params.torches[0].r_position = params.furnace_radius + 0.01;
        let err = params.validate().unwrap_err();
        assert_eq!(err.code(), Some("E001"));
        assert!(err.to_string().contains("torches[0].rPosition"));
    }

    #[test]
    fn bad_grid_is_a_mesh_error() {
        let params = SimulationParameters {
            mesh_axial_cells: 1,
            ..Default::default()
        };
        assert_eq!(params.validate().unwrap_err().code(), Some("E002"));
    }

    #[test]
    fn time_controls_are_checked() {
        for params in [
            SimulationParameters {
                simulation_time_step: 0.0,
                ..Default::default()
            },
            SimulationParameters {
                simulation_time_step: 100.0,
                simulation_duration: 10.0,
                ..Default::default()
            },
            SimulationParameters {
                relaxation_factor: 2.0,
                ..Default::default()
            },
            SimulationParameters {
                relaxation_factor: 1.0,
                ..Default::default()
            },
            SimulationParameters {
                relaxation_factor: f64::NAN,
                ..Default::default()
            },
            SimulationParameters {
                convergence_tolerance: -1.0,
                ..Default::default()
            },
        ] {
            assert_eq!(params.validate().unwrap_err().code(), Some("E001"));
        }
    }

    #[test]
    fn step_count_rounds_up() {
        let params = SimulationParameters {
            simulation_time_step: 0.1,
            simulation_duration: 60.0,
            ..Default::default()
        };
        assert_eq!(params.step_count(), 600);
        let params = SimulationParameters {
            simulation_time_step: 0.7,
            simulation_duration: 2.0,
            ..Default::default()
        };
        assert_eq!(params.step_count(), 3);
    }

    #[test]
    fn file_round_trip() {
        let params = SimulationParameters {
            furnace_height: 2.25,
            ..Default::default()
        };
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", params.to_json().unwrap()).unwrap();
        let loaded = SimulationParameters::from_file(file.path()).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = SimulationParameters::from_json_str("{\"furnaceRadius\": }").unwrap_err();
        assert!(matches!(err, FurnaceError::Json(_)));
    }
}
