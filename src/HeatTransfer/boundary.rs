//! # Boundary conditions
//!
//! Applied to an already assembled [`FivePointSystem`] by editing boundary rows:
//!
//! - axis `r = 0`: zero flux. The axis face has `r_{-1/2} = 0`, so the stencil already
//!   carries no west coupling; the handler only enforces it.
//! - wall `r = R`: Robin, `q = A_w [h (T_amb − T) + ε σ (T_amb⁴ − T⁴)]`, with the
//!   radiation linearised exactly at the old temperature as
//!   `h_rad = ε σ (T_amb² + T²)(T_amb + T)`; or a fixed temperature.
//! - bottom `z = 0` / top `z = H`: adiabatic or fixed temperature.
//!
//! Fixed-temperature rows are replaced by `x_p = T_fixed`; where a fixed end meets a
//! fixed wall the end condition wins.
use crate::HeatTransfer::discretizer::FivePointSystem;
use crate::HeatTransfer::mesh::Mesh;
use crate::HeatTransfer::torch::{SIGMA_SB, to_kelvin};
use crate::errors::{FurnaceError, FurnaceResult};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WallCondition {
    /// convection + radiation to ambient, each gated by the run flags
    Robin,
    FixedTemperature { temperature: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EndCondition {
    Adiabatic,
    FixedTemperature { temperature: f64 },
}

impl EndCondition {
    fn fixed(&self) -> Option<f64> {
        match self {
            EndCondition::Adiabatic => None,
            EndCondition::FixedTemperature { temperature } => Some(*temperature),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoundarySettings {
    pub wall: WallCondition,
    pub bottom: EndCondition,
    pub top: EndCondition,
}

impl Default for BoundarySettings {
    fn default() -> Self {
        Self {
            wall: WallCondition::Robin,
            bottom: EndCondition::Adiabatic,
            top: EndCondition::Adiabatic,
        }
    }
}

impl BoundarySettings {
    pub fn validate(&self) -> FurnaceResult<()> {
        let check = |name: &str, t: Option<f64>| -> FurnaceResult<()> {
            match t {
                Some(t) if !(t.is_finite() && to_kelvin(t) > 0.0) => Err(FurnaceError::validation(
                    name,
                    format!("fixed temperature {} °C is below absolute zero", t),
                )),
                _ => Ok(()),
            }
        };
        let wall = match self.wall {
            WallCondition::FixedTemperature { temperature } => Some(temperature),
            WallCondition::Robin => None,
        };
        check("boundary.wall", wall)?;
        check("boundary.bottom", self.bottom.fixed())?;
        check("boundary.top", self.top.fixed())
    }
}

#[derive(Debug, Clone)]
pub struct BoundaryConditionHandler {
    mesh: Mesh,
    settings: BoundarySettings,
    ambient: f64,
    convection_coefficient: f64,
    emissivity: f64,
    enable_convection: bool,
    enable_radiation: bool,
    /// fixed temperature per node, if any
    fixed: Vec<Option<f64>>,
}

impl BoundaryConditionHandler {
    pub fn new(
        mesh: &Mesh,
        settings: BoundarySettings,
        ambient: f64,
        convection_coefficient: f64,
        emissivity: f64,
        enable_convection: bool,
        enable_radiation: bool,
    ) -> Self {
        let mut fixed = vec![None; mesh.len()];
        if let WallCondition::FixedTemperature { temperature } = settings.wall {
            for j in 0..mesh.nz {
                fixed[mesh.idx(mesh.nr - 1, j)] = Some(temperature);
            }
        }
        for (j, end) in [(0, settings.bottom), (mesh.nz - 1, settings.top)] {
            if let Some(t) = end.fixed() {
                for i in 0..mesh.nr {
                    fixed[mesh.idx(i, j)] = Some(t);
                }
            }
        }
        Self {
            mesh: mesh.clone(),
            settings,
            ambient,
            convection_coefficient,
            emissivity,
            enable_convection,
            enable_radiation,
            fixed,
        }
    }

    pub fn fixed_value(&self, p: usize) -> Option<f64> {
        self.fixed[p]
    }

    /// Writes the imposed values into a field.
    pub fn impose_fixed(&self, field: &mut DVector<f64>) {
        for (p, t) in self.fixed.iter().enumerate() {
            if let Some(t) = t {
                field[p] = *t;
            }
        }
    }

    /// combined convective + linearised radiative coefficient at wall temperature `t` (W/(m²·K))
    pub fn wall_coefficient(&self, t: f64) -> f64 {
        let mut h = 0.0;
        if self.enable_convection {
            h += self.convection_coefficient;
        }
        if self.enable_radiation {
            let (ta, tw) = (to_kelvin(self.ambient), to_kelvin(t));
            h += self.emissivity * SIGMA_SB * (ta * ta + tw * tw) * (ta + tw);
        }
        h
    }

    /// Heat flow into the furnace through the wall (W), as the rows written by
    /// [`apply`](Self::apply) deliver it: coefficient at `t_old`, driving difference at
    /// the time-weighted temperature `t_mid`.
    pub fn wall_heat_flow(&self, t_old: &DVector<f64>, t_mid: &DVector<f64>) -> f64 {
        if self.settings.wall != WallCondition::Robin {
            return 0.0;
        }
        let i = self.mesh.nr - 1;
        (0..self.mesh.nz)
            .map(|j| {
                let p = self.mesh.idx(i, j);
                if self.fixed[p].is_some() {
                    return 0.0;
                }
                let area = self.mesh.radial_face_area(i, j);
                self.wall_coefficient(t_old[p]) * area * (self.ambient - t_mid[p])
            })
            .sum()
    }

    /// Edits boundary rows of `system` assembled around the old field `t_old`.
    /// `theta` is the implicit weight of the time scheme.
    pub fn apply(&self, system: &mut FivePointSystem, t_old: &DVector<f64>, theta: f64) {
        let mesh = &self.mesh;
        for j in 0..mesh.nz {
            system.west[mesh.idx(0, j)] = 0.0;
        }
        if self.settings.wall == WallCondition::Robin {
            let i = mesh.nr - 1;
            for j in 0..mesh.nz {
                let p = mesh.idx(i, j);
                let g = self.wall_coefficient(t_old[p]) * mesh.radial_face_area(i, j);
                system.diag[p] += theta * g;
                system.rhs[p] += g * self.ambient - (1.0 - theta) * g * t_old[p];
            }
        }
        for (p, t) in self.fixed.iter().enumerate() {
            if let Some(t) = t {
                system.fix_row(p, *t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn robin(mesh: &Mesh, convection: bool, radiation: bool) -> BoundaryConditionHandler {
        let settings = BoundarySettings::default();
        BoundaryConditionHandler::new(mesh, settings, 25.0, 10.0, 0.8, convection, radiation)
    }

    #[test]
    fn fixed_nodes_cover_wall_and_ends() {
        let mesh = Mesh::new(5, 4, 1.0, 1.0).unwrap();
        let settings = BoundarySettings {
            wall: WallCondition::FixedTemperature { temperature: 500.0 },
            bottom: EndCondition::Adiabatic,
            top: EndCondition::FixedTemperature { temperature: 100.0 },
        };
        let bc = BoundaryConditionHandler::new(&mesh, settings, 25.0, 10.0, 0.8, true, true);
        assert_eq!(bc.fixed_value(mesh.idx(4, 1)), Some(500.0));
        assert_eq!(bc.fixed_value(mesh.idx(4, 3)), Some(100.0));
        assert_eq!(bc.fixed_value(mesh.idx(2, 3)), Some(100.0));
        assert_eq!(bc.fixed_value(mesh.idx(2, 0)), None);
        let mut field = DVector::from_element(mesh.len(), 25.0);
        bc.impose_fixed(&mut field);
        assert_eq!(field[mesh.idx(4, 0)], 500.0);
        assert_eq!(field[mesh.idx(0, 0)], 25.0);
    }

    #[test]
    fn robin_coefficient_switches() {
        let mesh = Mesh::new(5, 4, 1.0, 1.0).unwrap();
        let off = robin(&mesh, false, false);
        assert_eq!(off.wall_coefficient(900.0), 0.0);
        let conv = robin(&mesh, true, false);
        assert_relative_eq!(conv.wall_coefficient(900.0), 10.0);
        let rad = robin(&mesh, false, true);
        let (ta, tw) = (298.15_f64, 1173.15_f64);
        let exact = 0.8 * SIGMA_SB * (tw.powi(4) - ta.powi(4)) / (tw - ta);
        assert_relative_eq!(rad.wall_coefficient(900.0), exact, max_relative = 1e-12);
    }

    #[test]
    fn wall_loses_heat_when_hot() {
        let mesh = Mesh::new(5, 4, 1.0, 1.0).unwrap();
        let bc = robin(&mesh, true, true);
        let hot = DVector::from_element(mesh.len(), 800.0);
        assert!(bc.wall_heat_flow(&hot, &hot) < 0.0);
        let ambient = DVector::from_element(mesh.len(), 25.0);
        assert_relative_eq!(bc.wall_heat_flow(&ambient, &ambient), 0.0);
        // the coefficient follows the old field, the driving difference the mid field
        let cooler = DVector::from_element(mesh.len(), 400.0);
        let area: f64 = (0..mesh.nz).map(|j| mesh.radial_face_area(mesh.nr - 1, j)).sum();
        let expected = bc.wall_coefficient(800.0) * area * (25.0 - 400.0);
        assert_relative_eq!(bc.wall_heat_flow(&hot, &cooler), expected, max_relative = 1e-12);
    }
}
