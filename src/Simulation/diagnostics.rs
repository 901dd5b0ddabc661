//! Per-step diagnostics of a run.
//!
//! Gradients use central differences inside the grid and one-sided differences on the
//! wall and the ends; on the axis `∂T/∂r = 0` by symmetry. The stored energy is
//! `Σ ρ V_p H_p` relative to a charge at 0 °C.
use crate::HeatTransfer::material::ThermalZone;
use crate::HeatTransfer::mesh::Mesh;
use crate::Simulation::state::FieldState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDiagnostics {
    pub step: usize,
    /// s
    pub time: f64,
    /// s
    pub dt: f64,
    pub sor_iterations: usize,
    pub residual: f64,
    /// the step needed the relaxed tolerance
    pub retried: bool,
    pub min_temperature: f64,
    pub max_temperature: f64,
    /// volume-weighted, °C
    pub avg_temperature: f64,
    /// K/m
    pub max_gradient: f64,
    /// W/m²
    pub max_heat_flux: f64,
    /// J
    pub total_energy: f64,
    /// cumulative heat from torches and walls since the start (J)
    pub energy_input: f64,
    pub melt_volume_fraction: f64,
    /// drying, pyrolysis, gasification, melting
    pub zone_counts: [usize; 4],
    pub property_fallbacks: usize,
    pub warnings: Vec<String>,
}

/// Field statistics that do not depend on the solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStatistics {
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub avg_temperature: f64,
    pub max_gradient: f64,
    pub max_heat_flux: f64,
    pub total_energy: f64,
    pub melt_volume_fraction: f64,
}

/// |∇T| at node `p`
pub fn gradient_magnitude(mesh: &Mesh, t: &[f64], p: usize) -> f64 {
    let (i, j) = mesh.ij(p);
    let gr = if mesh.is_axis(i) {
        0.0
    } else if mesh.is_wall(i) {
        (t[p] - t[p - 1]) / mesh.dr
    } else {
        (t[p + 1] - t[p - 1]) / (2.0 * mesh.dr)
    };
    let gz = if mesh.is_bottom(j) {
        (t[p + mesh.nr] - t[p]) / mesh.dz
    } else if mesh.is_top(j) {
        (t[p] - t[p - mesh.nr]) / mesh.dz
    } else {
        (t[p + mesh.nr] - t[p - mesh.nr]) / (2.0 * mesh.dz)
    };
    gr.hypot(gz)
}

impl FieldStatistics {
    /// `conductivity` holds nodal k(T) for the same field.
    pub fn compute(
        mesh: &Mesh,
        volumes: &[f64],
        density: f64,
        conductivity: &[f64],
        field: &FieldState,
    ) -> Self {
        let t = field.temperature.as_slice();
        let total_volume: f64 = volumes.iter().sum();
        let mut stats = FieldStatistics {
            min_temperature: f64::INFINITY,
            max_temperature: f64::NEG_INFINITY,
            avg_temperature: 0.0,
            max_gradient: 0.0,
            max_heat_flux: 0.0,
            total_energy: 0.0,
            melt_volume_fraction: 0.0,
        };
        for p in 0..mesh.len() {
            let v = volumes[p];
            stats.min_temperature = stats.min_temperature.min(t[p]);
            stats.max_temperature = stats.max_temperature.max(t[p]);
            stats.avg_temperature += v * t[p];
            stats.total_energy += density * v * field.enthalpy[p];
            stats.melt_volume_fraction += v * field.phase_fraction[p];
            let g = gradient_magnitude(mesh, t, p);
            stats.max_gradient = stats.max_gradient.max(g);
            stats.max_heat_flux = stats.max_heat_flux.max(conductivity[p] * g);
        }
        stats.avg_temperature /= total_volume;
        stats.melt_volume_fraction /= total_volume;
        stats
    }
}

/// Prints every `stride`-th entry (and the last) as a table.
pub fn pretty_print_history(history: &[StepDiagnostics], stride: usize) {
    use prettytable::{Table, row};
    let stride = stride.max(1);
    let mut table = Table::new();
    table.add_row(row![
        "Step",
        "t, s",
        "Sweeps",
        "T min, °C",
        "T avg, °C",
        "T max, °C",
        "max |∇T|, K/m",
        "E, MJ",
        "E in, MJ",
        "Melt"
    ]);
    for (n, d) in history.iter().enumerate() {
        if n % stride != 0 && n + 1 != history.len() {
            continue;
        }
        table.add_row(row![
            d.step,
            format!("{:.2}", d.time),
            d.sor_iterations,
            format!("{:.1}", d.min_temperature),
            format!("{:.1}", d.avg_temperature),
            format!("{:.1}", d.max_temperature),
            format!("{:.1}", d.max_gradient),
            format!("{:.3}", d.total_energy * 1e-6),
            format!("{:.3}", d.energy_input * 1e-6),
            format!("{:.3}", d.melt_volume_fraction)
        ]);
    }
    table.printstd();
    if let Some(last) = history.last() {
        let mut zones = Table::new();
        zones.add_row(row!["Zone", "Nodes"]);
        for zone in ThermalZone::ALL {
            zones.add_row(row![zone.to_string(), last.zone_counts[zone.index()]]);
        }
        zones.printstd();
        for w in &last.warnings {
            println!("warning: {}", w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeatTransfer::boundary::{BoundaryConditionHandler, BoundarySettings};
    use crate::HeatTransfer::enthalpy::EnthalpyMap;
    use crate::HeatTransfer::material::{MaterialModel, MaterialProperties};
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn field_of(mesh: &Mesh, f: impl Fn(f64, f64) -> f64) -> (FieldState, EnthalpyMap) {
        let material = MaterialModel::new(MaterialProperties::default()).unwrap();
        let map = EnthalpyMap::new(&material, -100.0, 2000.0).unwrap();
        let t = DVector::from_fn(mesh.len(), |p, _| {
            let (i, j) = mesh.ij(p);
            f(mesh.r(i), mesh.z(j))
        });
        let h = t.map(|t| map.enthalpy(t));
        (FieldState::from_enthalpy(h, &map), map)
    }

    #[test]
    fn linear_field_has_exact_gradient() {
        let mesh = Mesh::new(7, 9, 0.6, 0.8).unwrap();
        let (field, _) = field_of(&mesh, |_, z| 20.0 + 250.0 * z);
        let k = vec![2.0; mesh.len()];
        let stats = FieldStatistics::compute(&mesh, &mesh.volumes(), 2500.0, &k, &field);
        assert_relative_eq!(stats.max_gradient, 250.0, max_relative = 1e-6);
        assert_relative_eq!(stats.max_heat_flux, 500.0, max_relative = 1e-6);
        assert_relative_eq!(stats.min_temperature, 20.0, epsilon = 1e-6);
        assert_relative_eq!(stats.max_temperature, 220.0, epsilon = 1e-6);
        // volume-weighted mean of a linear profile in z is its midpoint
        assert_relative_eq!(stats.avg_temperature, 120.0, max_relative = 1e-6);
    }

    #[test]
    fn axis_gradient_is_radially_zero() {
        let mesh = Mesh::new(6, 4, 1.0, 1.0).unwrap();
        let (field, _) = field_of(&mesh, |r, _| 100.0 + 50.0 * r * r);
        let p = mesh.idx(0, 2);
        assert_eq!(gradient_magnitude(&mesh, field.temperature.as_slice(), p), 0.0);
        assert!(gradient_magnitude(&mesh, field.temperature.as_slice(), mesh.idx(3, 2)) > 0.0);
    }

    #[test]
    fn energy_of_a_uniform_field() {
        let mesh = Mesh::new(5, 5, 0.5, 1.0).unwrap();
        let material = MaterialModel::new(MaterialProperties::default()).unwrap();
        let map = EnthalpyMap::new(&material, -100.0, 2000.0).unwrap();
        let settings = BoundarySettings::default();
        let bc = BoundaryConditionHandler::new(&mesh, settings, 25.0, 10.0, 0.8, true, true);
        let field = FieldState::initial(mesh.len(), 200.0, &map, &bc);
        let k = vec![1.0; mesh.len()];
        let stats = FieldStatistics::compute(&mesh, &mesh.volumes(), 2500.0, &k, &field);
        let expected = 2500.0 * mesh.total_volume() * map.enthalpy(200.0);
        assert_relative_eq!(stats.total_energy, expected, max_relative = 1e-9);
        assert_eq!(stats.melt_volume_fraction, 0.0);
        assert_eq!(stats.max_gradient, 0.0);
    }
}
