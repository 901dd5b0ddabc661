//! # Plasma torch heat source
//!
//! Every torch contributes three additive per-node terms (W):
//!
//! | Term | Expression | Switch |
//! |------|------------|--------|
//! | jet power deposition | `P·η · F_p V_p / Σ F V` | always |
//! | radiative exchange | `ε σ F_p A_p (T_t⁴ − T_p⁴)` | `enableRadiation` |
//! | gas convection | `h F_p A_p (T_gas − T_p)` | `enableConvection` |
//!
//! `F_p = exp(−d²/2σ²)` is the view-factor falloff with `d` the planar (r, z) distance
//! from the jet impact point and `σ` the torch spread; the deposition is normalised
//! over the mesh so the torch delivers exactly `P·η`. `A_p` is the annulus area of the
//! node's column. The weights depend only on geometry and are computed once.
use crate::HeatTransfer::mesh::Mesh;
use crate::errors::{FurnaceError, FurnaceResult};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Stefan–Boltzmann constant, W/(m²·K⁴)
pub const SIGMA_SB: f64 = 5.670_374_419e-8;
/// °C → K offset
pub const KELVIN: f64 = 273.15;

#[inline]
pub fn to_kelvin(t_celsius: f64) -> f64 {
    t_celsius + KELVIN
}

/// One torch. Besides the flat keys, JSON input accepts the grouped forms
/// `"torchPosition": {"r": .., "z": ..}` and `"torchDirection": {"pitch": .., "yaw": ..}`;
/// output is always flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TorchSpec")]
pub struct PlasmaTorch {
    /// radial position of the nozzle (m)
    pub r_position: f64,
    /// axial position of the nozzle (m)
    pub z_position: f64,
    /// angle of the jet below the horizontal plane (deg)
    pub pitch: f64,
    /// angle of the jet off the inward radial direction (deg)
    pub yaw: f64,
    /// electrical power (kW)
    pub power: f64,
    /// thermal efficiency, 0..1
    pub efficiency: f64,
    /// plasma gas flow (kg/s); carried for consumers, the jet itself is not resolved
    pub gas_flow: f64,
    /// plasma gas temperature (K)
    pub gas_temperature: f64,
    /// σ of the Gaussian footprint (m)
    pub spread: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct TorchPosition {
    r: f64,
    z: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct TorchDirection {
    pitch: f64,
    #[serde(default)]
    yaw: f64,
}

/// Input form of [`PlasmaTorch`]; grouped keys win over the flat ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TorchSpec {
    r_position: f64,
    z_position: f64,
    pitch: f64,
    yaw: f64,
    #[serde(alias = "torchPower")]
    power: f64,
    #[serde(alias = "torchEfficiency")]
    efficiency: f64,
    gas_flow: f64,
    #[serde(alias = "torchTemperature")]
    gas_temperature: f64,
    spread: f64,
    torch_position: Option<TorchPosition>,
    torch_direction: Option<TorchDirection>,
}

impl Default for TorchSpec {
    fn default() -> Self {
        let t = PlasmaTorch::default();
        Self {
            r_position: t.r_position,
            z_position: t.z_position,
            pitch: t.pitch,
            yaw: t.yaw,
            power: t.power,
            efficiency: t.efficiency,
            gas_flow: t.gas_flow,
            gas_temperature: t.gas_temperature,
            spread: t.spread,
            torch_position: None,
            torch_direction: None,
        }
    }
}

impl From<TorchSpec> for PlasmaTorch {
    fn from(spec: TorchSpec) -> Self {
        let (r_position, z_position) = spec
            .torch_position
            .map_or((spec.r_position, spec.z_position), |p| (p.r, p.z));
        let (pitch, yaw) = spec
            .torch_direction
            .map_or((spec.pitch, spec.yaw), |d| (d.pitch, d.yaw));
        Self {
            r_position,
            z_position,
            pitch,
            yaw,
            power: spec.power,
            efficiency: spec.efficiency,
            gas_flow: spec.gas_flow,
            gas_temperature: spec.gas_temperature,
            spread: spec.spread,
        }
    }
}

impl Default for PlasmaTorch {
    fn default() -> Self {
        Self {
            r_position: 0.0,
            z_position: 0.0,
            pitch: 90.0,
            yaw: 0.0,
            power: 100.0,
            efficiency: 0.7,
            gas_flow: 0.01,
            gas_temperature: 5000.0,
            spread: 0.05,
        }
    }
}

impl PlasmaTorch {
    pub fn validate(&self, index: usize, radius: f64, height: f64) -> FurnaceResult<()> {
        let field = |name: &str| format!("torches[{}].{}", index, name);
        if !(0.0..=radius).contains(&self.r_position) {
            return Err(FurnaceError::validation(
                &field("rPosition"),
                format!("{} m lies outside [0, {}]", self.r_position, radius),
            ));
        }
        if !(0.0..=height).contains(&self.z_position) {
            return Err(FurnaceError::validation(
                &field("zPosition"),
                format!("{} m lies outside [0, {}]", self.z_position, height),
            ));
        }
        if !(self.power > 0.0 && self.power.is_finite()) {
            return Err(FurnaceError::validation(&field("power"), "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.efficiency) {
            return Err(FurnaceError::validation(
                &field("efficiency"),
                format!("{} is outside [0, 1]", self.efficiency),
            ));
        }
        if !(self.gas_flow >= 0.0 && self.gas_flow.is_finite()) {
            return Err(FurnaceError::validation(&field("gasFlow"), "must be >= 0"));
        }
        if !(self.gas_temperature > 0.0 && self.gas_temperature.is_finite()) {
            return Err(FurnaceError::validation(
                &field("gasTemperature"),
                "must be a positive absolute temperature",
            ));
        }
        if !(self.spread > 0.0 && self.spread.is_finite()) {
            return Err(FurnaceError::validation(&field("spread"), "must be positive"));
        }
        if !(-90.0..=90.0).contains(&self.pitch) || !(-180.0..=180.0).contains(&self.yaw) {
            return Err(FurnaceError::validation(
                &field("direction"),
                "pitch must lie in [-90, 90] and yaw in [-180, 180] degrees",
            ));
        }
        Ok(())
    }

    /// Impact point of the jet: the nozzle moved one spread along the jet axis,
    /// projected on the (r, z) half-plane and clamped into the furnace.
    pub fn impact_point(&self, radius: f64, height: f64) -> (f64, f64) {
        let (pitch, yaw) = (self.pitch.to_radians(), self.yaw.to_radians());
        let dr = -pitch.cos() * yaw.cos();
        let dz = -pitch.sin();
        (
            (self.r_position + self.spread * dr).clamp(0.0, radius),
            (self.z_position + self.spread * dz).clamp(0.0, height),
        )
    }

    /// deposited power P·η (W)
    pub fn thermal_power(&self) -> f64 {
        self.power * 1e3 * self.efficiency
    }
}

/// Per-node source value (W) and its derivative with respect to the node temperature (W/K).
#[derive(Debug, Clone)]
pub struct SourceTerms {
    pub value: DVector<f64>,
    pub slope: DVector<f64>,
}

impl SourceTerms {
    pub fn zeros(n: usize) -> Self {
        Self {
            value: DVector::zeros(n),
            slope: DVector::zeros(n),
        }
    }

    pub fn total(&self) -> f64 {
        self.value.sum()
    }
}

#[derive(Debug, Clone)]
struct TorchFootprint {
    view_factor: Vec<f64>,
    deposition: Vec<f64>,
    t_gas_celsius: f64,
    t_gas_kelvin: f64,
}

#[derive(Debug, Clone)]
pub struct TorchHeatSource {
    footprints: Vec<TorchFootprint>,
    areas: Vec<f64>,
    emissivity: f64,
    convection_coefficient: f64,
    enable_radiation: bool,
    enable_convection: bool,
}

impl TorchHeatSource {
    pub fn new(
        mesh: &Mesh,
        torches: &[PlasmaTorch],
        emissivity: f64,
        convection_coefficient: f64,
        enable_radiation: bool,
        enable_convection: bool,
    ) -> Self {
        let volumes = mesh.volumes();
        let areas: Vec<f64> = (0..mesh.len())
            .map(|p| mesh.axial_face_area(mesh.ij(p).0))
            .collect();
        let footprints = torches
            .iter()
            .map(|torch| {
                let (rc, zc) = torch.impact_point(mesh.radius, mesh.height);
                let two_sigma_sq = 2.0 * torch.spread * torch.spread;
                let view_factor: Vec<f64> = (0..mesh.len())
                    .map(|p| {
                        let (i, j) = mesh.ij(p);
                        let d_sq = (mesh.r(i) - rc).powi(2) + (mesh.z(j) - zc).powi(2);
                        (-d_sq / two_sigma_sq).exp()
                    })
                    .collect();
                let weight: f64 = view_factor.iter().zip(&volumes).map(|(f, v)| f * v).sum();
                let power = torch.thermal_power();
                let deposition = if weight > 0.0 {
                    view_factor
                        .iter()
                        .zip(&volumes)
                        .map(|(f, v)| power * f * v / weight)
                        .collect()
                } else {
                    // footprint narrower than the grid: everything goes to the nearest node
                    let i = ((rc / mesh.dr).round() as usize).min(mesh.nr - 1);
                    let j = ((zc / mesh.dz).round() as usize).min(mesh.nz - 1);
                    let mut d = vec![0.0; mesh.len()];
                    d[mesh.idx(i, j)] = power;
                    d
                };
                TorchFootprint {
                    view_factor,
                    deposition,
                    t_gas_celsius: torch.gas_temperature - KELVIN,
                    t_gas_kelvin: torch.gas_temperature,
                }
            })
            .collect();
        Self {
            footprints,
            areas,
            emissivity,
            convection_coefficient,
            enable_radiation,
            enable_convection,
        }
    }

    pub fn torch_count(&self) -> usize {
        self.footprints.len()
    }

    /// total P·η of all torches (W)
    pub fn deposited_power(&self) -> f64 {
        self.footprints
            .iter()
            .map(|f| f.deposition.iter().sum::<f64>())
            .sum()
    }

    /// Sums every torch's contribution at the given temperature field (°C).
    pub fn evaluate(&self, temperature: &DVector<f64>) -> SourceTerms {
        let n = temperature.len();
        let mut terms = SourceTerms::zeros(n);
        let eps_sigma = self.emissivity * SIGMA_SB;
        for fp in &self.footprints {
            let t_gas4 = fp.t_gas_kelvin.powi(4);
            for p in 0..n {
                let mut q = fp.deposition[p];
                let mut dq = 0.0;
                let fa = fp.view_factor[p] * self.areas[p];
                if fa > 0.0 {
                    if self.enable_radiation {
                        let tk = to_kelvin(temperature[p]);
                        q += eps_sigma * fa * (t_gas4 - tk.powi(4));
                        dq -= 4.0 * eps_sigma * fa * tk.powi(3);
                    }
                    if self.enable_convection {
                        q += self.convection_coefficient * fa * (fp.t_gas_celsius - temperature[p]);
                        dq -= self.convection_coefficient * fa;
                    }
                }
                terms.value[p] += q;
                terms.slope[p] += dq;
            }
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mesh() -> Mesh {
        Mesh::new(21, 31, 0.5, 1.5).unwrap()
    }

    #[test]
    fn torch_outside_furnace_is_rejected() {
        let torch = PlasmaTorch {
            r_position: 0.6,
            ..Default::default()
        };
        let err = torch.validate(0, 0.5, 1.5).unwrap_err();
        assert_eq!(err.code(), Some("E001"));
        assert!(err.to_string().contains("rPosition"));
        let torch = PlasmaTorch {
            efficiency: 1.2,
            ..Default::default()
        };
        assert!(torch.validate(0, 0.5, 1.5).is_err());
    }

    #[test]
    fn grouped_position_and_direction_keys_are_accepted() {
        let json = r#"{
            "torchPosition": {"r": 0.2, "z": 1.1},
            "torchDirection": {"pitch": 30.0, "yaw": -45.0},
            "torchPower": 80.0, "torchEfficiency": 0.65, "torchTemperature": 7000.0
        }"#;
        let torch: PlasmaTorch = serde_json::from_str(json).unwrap();
        assert_eq!((torch.r_position, torch.z_position), (0.2, 1.1));
        assert_eq!((torch.pitch, torch.yaw), (30.0, -45.0));
        assert_eq!((torch.power, torch.efficiency, torch.gas_temperature), (80.0, 0.65, 7000.0));
        assert_eq!(torch.spread, PlasmaTorch::default().spread);

        let flat = serde_json::to_string(&torch).unwrap();
        assert!(flat.contains("\"rPosition\"") && !flat.contains("torchPosition"));
        let back: PlasmaTorch = serde_json::from_str(&flat).unwrap();
        assert_eq!(back, torch);

        let partial: PlasmaTorch =
            serde_json::from_str(r#"{"torchDirection": {"pitch": 10.0}}"#).unwrap();
        assert_eq!((partial.pitch, partial.yaw), (10.0, 0.0));
        assert!(serde_json::from_str::<PlasmaTorch>(r#"{"torchPosition": {"r": 0.2}}"#).is_err());
    }

    #[test]
    fn deposition_delivers_exactly_p_eta() {
        let mesh = mesh();
        let torch = PlasmaTorch {
            r_position: 0.2,
            z_position: 1.0,
            power: 50.0,
            efficiency: 0.6,
            spread: 0.1,
            ..Default::default()
        };
        let source = TorchHeatSource::new(&mesh, &[torch], 0.8, 20.0, false, false);
        let field = DVector::from_element(mesh.len(), 25.0);
        let terms = source.evaluate(&field);
        assert_relative_eq!(terms.total(), 30_000.0, max_relative = 1e-12);
        assert_relative_eq!(source.deposited_power(), 30_000.0, max_relative = 1e-12);
        assert!(terms.slope.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn torches_add_linearly() {
        let mesh = mesh();
        let a = PlasmaTorch {
            r_position: 0.0,
            z_position: 1.4,
            ..Default::default()
        };
        let b = PlasmaTorch {
            r_position: 0.4,
            z_position: 0.3,
            pitch: 0.0,
            ..Default::default()
        };
        let field = DVector::from_element(mesh.len(), 300.0);
        let terms = |torches: &[PlasmaTorch]| {
            TorchHeatSource::new(&mesh, torches, 0.8, 20.0, true, true).evaluate(&field)
        };
        let (only_a, only_b) = (terms(&[a.clone()]), terms(&[b.clone()]));
        let both = terms(&[a, b]);
        for p in 0..mesh.len() {
            let value = only_a.value[p] + only_b.value[p];
            let slope = only_a.slope[p] + only_b.slope[p];
            assert_relative_eq!(both.value[p], value, max_relative = 1e-12);
            assert_relative_eq!(both.slope[p], slope, max_relative = 1e-12);
        }
    }

    #[test]
    fn exchange_terms_vanish_at_gas_temperature() {
        let mesh = mesh();
        let torch = PlasmaTorch {
            z_position: 0.75,
            gas_temperature: 1273.15,
            ..Default::default()
        };
        let source = TorchHeatSource::new(&mesh, &[torch.clone()], 0.9, 50.0, true, true);
        let hot = DVector::from_element(mesh.len(), 1000.0);
        let terms = source.evaluate(&hot);
        assert_relative_eq!(terms.total(), torch.thermal_power(), max_relative = 1e-9);
        assert!(terms.slope.iter().all(|s| *s <= 0.0));
    }

    #[test]
    fn impact_point_follows_direction() {
        let torch = PlasmaTorch {
            r_position: 0.5,
            z_position: 1.0,
            pitch: 0.0,
            yaw: 0.0,
            spread: 0.1,
            ..Default::default()
        };
        let (rc, zc) = torch.impact_point(0.5, 1.5);
        assert_relative_eq!(rc, 0.4, epsilon = 1e-12);
        assert_relative_eq!(zc, 1.0, epsilon = 1e-12);
        let down = PlasmaTorch {
            pitch: 90.0,
            ..torch
        };
        let (rc, zc) = down.impact_point(0.5, 1.5);
        assert_relative_eq!(rc, 0.5, epsilon = 1e-12);
        assert_relative_eq!(zc, 0.9, epsilon = 1e-12);
    }
}
