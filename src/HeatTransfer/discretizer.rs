//! # Crank–Nicolson finite-volume assembly
//!
//! For every node `p` with control volume `V_p` and neighbours `q`:
//!
//! ```text
//! C_p (x_p − T_p)/Δt = θ Σ G_pq (x_q − x_p) + (1−θ) Σ G_pq (T_q − T_p) + S_p
//! ```
//!
//! with `x = T^{n+1}`, `T = T^n`, `θ = 1/2`, `C_p = ρ V_p dH/dT(T_p)` and conductances
//!
//! | Face | `G` |
//! |------|-----|
//! | `r_{i±1/2}` | `k_{i±1/2} · 2π r_{i±1/2} h_j / Δr` |
//! | `z_{j±1/2}` | `k_{j±1/2} · π (r_{i+1/2}² − r_{i−1/2}²) / Δz` |
//!
//! Divided by `V_p` this is the cylindrical stencil
//! `(1/(r_i Δr))[r_{i+½} k_{i+½} δ⁺T − r_{i−½} k_{i−½} δ⁻T] + [k_{j+½} δ⁺T − k_{j−½} δ⁻T]/Δz²`,
//! and on the axis `r_{-1/2} = 0` removes the `1/r` singularity. Half-node
//! conductivities are harmonic means of the neighbouring nodal `k(T^n)`.
//!
//! The source `S` is evaluated at step n (`Explicit`) or linearised around `T^n` and
//! weighted like the conduction terms (`SemiImplicit`).
use crate::HeatTransfer::enthalpy::EnthalpyMap;
use crate::HeatTransfer::material::MaterialModel;
use crate::HeatTransfer::mesh::Mesh;
use crate::HeatTransfer::torch::SourceTerms;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Crank–Nicolson implicit weight
pub const THETA: f64 = 0.5;

/// Row-major 5-point system
/// `diag·x_p + west·x_{i-1} + east·x_{i+1} + south·x_{j-1} + north·x_{j+1} = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct FivePointSystem {
    pub nr: usize,
    pub nz: usize,
    pub diag: DVector<f64>,
    pub west: DVector<f64>,
    pub east: DVector<f64>,
    pub south: DVector<f64>,
    pub north: DVector<f64>,
    pub rhs: DVector<f64>,
}

impl FivePointSystem {
    pub fn zeros(nr: usize, nz: usize) -> Self {
        let n = nr * nz;
        Self {
            nr,
            nz,
            diag: DVector::zeros(n),
            west: DVector::zeros(n),
            east: DVector::zeros(n),
            south: DVector::zeros(n),
            north: DVector::zeros(n),
            rhs: DVector::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.nr * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Σ_q a_pq x_q` without the diagonal
    #[inline]
    pub fn off_diagonal_product(&self, p: usize, x: &DVector<f64>) -> f64 {
        let (i, j) = (p % self.nr, p / self.nr);
        let mut s = 0.0;
        if i > 0 {
            s += self.west[p] * x[p - 1];
        }
        if i + 1 < self.nr {
            s += self.east[p] * x[p + 1];
        }
        if j > 0 {
            s += self.south[p] * x[p - self.nr];
        }
        if j + 1 < self.nz {
            s += self.north[p] * x[p + self.nr];
        }
        s
    }

    /// `A x`
    pub fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.len(),
            (0..self.len()).map(|p| self.diag[p] * x[p] + self.off_diagonal_product(p, x)),
        )
    }

    /// max-norm of `b − A x`
    pub fn residual_norm(&self, x: &DVector<f64>) -> f64 {
        (&self.rhs - self.apply(x)).amax()
    }

    /// Replaces row `p` by `x_p = value`.
    pub fn fix_row(&mut self, p: usize, value: f64) {
        self.diag[p] = 1.0;
        self.west[p] = 0.0;
        self.east[p] = 0.0;
        self.south[p] = 0.0;
        self.north[p] = 0.0;
        self.rhs[p] = value;
    }

    /// every row satisfies `|a_pp| >= Σ |a_pq|`
    pub fn is_diagonally_dominant(&self) -> bool {
        (0..self.len()).all(|p| {
            let off =
            self.west[p].abs() + self.east[p].abs() + self.south[p].abs() + self.north[p].abs();
            self.diag[p].abs() >= off
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceTreatment {
    /// S(T^n)
    #[default]
    Explicit,
    /// S(T^n) + θ dS/dT (T^{n+1} − T^n)
    SemiImplicit,
}

#[inline]
pub fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b > 0.0 { 2.0 * a * b / (a + b) } else { 0.0 }
}

/// Conductances of the four faces of one node (W/K).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaceConductances {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl FaceConductances {
    pub fn sum(&self) -> f64 {
        self.west + self.east + self.south + self.north
    }
}

#[derive(Debug, Clone)]
pub struct Discretizer {
    mesh: Mesh,
    volumes: Vec<f64>,
    pub source_treatment: SourceTreatment,
}

impl Discretizer {
    pub fn new(mesh: &Mesh, source_treatment: SourceTreatment) -> Self {
        Self {
            mesh: mesh.clone(),
            volumes: mesh.volumes(),
            source_treatment,
        }
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// nodal k(T) for the whole field
    pub fn nodal_conductivity(&self, material: &MaterialModel, t: &DVector<f64>) -> Vec<f64> {
        t.iter().map(|t| material.conductivity(*t)).collect()
    }

    /// face conductances of node `p` from nodal conductivities `k`
    pub fn conductances(&self, p: usize, k: &[f64]) -> FaceConductances {
        let m = &self.mesh;
        let (i, j) = m.ij(p);
        let h = m.cell_height(j);
        let mut g = FaceConductances::default();
        if i > 0 {
            let area = 2.0 * std::f64::consts::PI * m.r_minus(i) * h;
            g.west = harmonic_mean(k[p], k[p - 1]) * area / m.dr;
        }
        if i + 1 < m.nr {
            g.east = harmonic_mean(k[p], k[p + 1]) * m.radial_face_area(i, j) / m.dr;
        }
        let axial = m.axial_face_area(i) / m.dz;
        if j > 0 {
            g.south = harmonic_mean(k[p], k[p - m.nr]) * axial;
        }
        if j + 1 < m.nz {
            g.north = harmonic_mean(k[p], k[p + m.nr]) * axial;
        }
        g
    }

    /// heat capacities `C_p = ρ V_p dH/dT(T_p)` (J/K)
    pub fn heat_capacities(
        &self,
        material: &MaterialModel,
        map: &EnthalpyMap,
        t: &DVector<f64>,
    ) -> DVector<f64> {
        let rho = material.density();
        DVector::from_iterator(
            t.len(),
            t.iter()
                .zip(&self.volumes)
                .map(|(t, v)| rho * v * map.effective_heat_capacity(*t)),
        )
    }

    /// Assembles the interior Crank–Nicolson system; boundary rows are edited afterwards.
    pub fn assemble(
        &self,
        t_old: &DVector<f64>,
        conductivity: &[f64],
        capacity: &DVector<f64>,
        sources: &SourceTerms,
        dt: f64,
    ) -> FivePointSystem {
        let m = &self.mesh;
        let mut sys = FivePointSystem::zeros(m.nr, m.nz);
        for p in 0..m.len() {
            let (i, j) = m.ij(p);
            let g = self.conductances(p, conductivity);
            let c_dt = capacity[p] / dt;

            let mut explicit_flux = 0.0;
            if i > 0 {
                explicit_flux += g.west * (t_old[p - 1] - t_old[p]);
            }
            if i + 1 < m.nr {
                explicit_flux += g.east * (t_old[p + 1] - t_old[p]);
            }
            if j > 0 {
                explicit_flux += g.south * (t_old[p - m.nr] - t_old[p]);
            }
            if j + 1 < m.nz {
                explicit_flux += g.north * (t_old[p + m.nr] - t_old[p]);
            }

            sys.diag[p] = c_dt + THETA * g.sum();
            sys.west[p] = -THETA * g.west;
            sys.east[p] = -THETA * g.east;
            sys.south[p] = -THETA * g.south;
            sys.north[p] = -THETA * g.north;
            sys.rhs[p] = c_dt * t_old[p] + (1.0 - THETA) * explicit_flux + sources.value[p];

            if self.source_treatment == SourceTreatment::SemiImplicit {
                let slope = sources.slope[p].min(0.0);
                sys.diag[p] -= THETA * slope;
                sys.rhs[p] -= THETA * slope * t_old[p];
            }
        }
        sys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeatTransfer::material::MaterialProperties;
    use approx::assert_relative_eq;

    fn setup(nr: usize, nz: usize) -> (Mesh, MaterialModel, EnthalpyMap, Discretizer) {
        let mesh = Mesh::new(nr, nz, 0.4, 0.8).unwrap();
        let material = MaterialModel::new(MaterialProperties::default()).unwrap();
        let map = EnthalpyMap::new(&material, -100.0, 3000.0).unwrap();
        let disc = Discretizer::new(&mesh, SourceTreatment::Explicit);
        (mesh, material, map, disc)
    }

    #[test]
    fn harmonic_mean_weights_the_poor_conductor() {
        assert_relative_eq!(harmonic_mean(2.0, 2.0), 2.0);
        assert_relative_eq!(harmonic_mean(1.0, 100.0), 200.0 / 101.0);
        assert_eq!(harmonic_mean(0.0, 0.0), 0.0);
        assert!(harmonic_mean(1.0, 100.0) < 0.5 * 101.0);
    }

    #[test]
    fn axis_row_has_no_west_coupling() {
        let (mesh, material, map, disc) = setup(9, 7);
        let t = DVector::from_fn(mesh.len(), |p, _| 25.0 + p as f64);
        let k = disc.nodal_conductivity(&material, &t);
        let c = disc.heat_capacities(&material, &map, &t);
        let sys = disc.assemble(&t, &k, &c, &SourceTerms::zeros(mesh.len()), 1.0);
        for j in 0..mesh.nz {
            let p = mesh.idx(0, j);
            assert_eq!(sys.west[p], 0.0);
            assert_eq!(disc.conductances(p, &k).west, 0.0);
        }
        assert!(sys.is_diagonally_dominant());
    }

    #[test]
    fn conductances_are_symmetric() {
        let (mesh, material, _map, disc) = setup(6, 5);
        let t = DVector::from_fn(mesh.len(), |p, _| 100.0 * (p % 7) as f64);
        let k = disc.nodal_conductivity(&material, &t);
        for j in 0..mesh.nz {
            for i in 0..mesh.nr - 1 {
                let (p, q) = (mesh.idx(i, j), mesh.idx(i + 1, j));
                assert_relative_eq!(
                    disc.conductances(p, &k).east,
                    disc.conductances(q, &k).west,
                    max_relative = 1e-14
                );
            }
        }
        for j in 0..mesh.nz - 1 {
            for i in 0..mesh.nr {
                let (p, q) = (mesh.idx(i, j), mesh.idx(i, j + 1));
                assert_relative_eq!(
                    disc.conductances(p, &k).north,
                    disc.conductances(q, &k).south,
                    max_relative = 1e-14
                );
            }
        }
    }

    #[test]
    fn uniform_field_without_sources_is_steady() {
        let (mesh, material, map, disc) = setup(8, 8);
        let t = DVector::from_element(mesh.len(), 300.0);
        let k = disc.nodal_conductivity(&material, &t);
        let c = disc.heat_capacities(&material, &map, &t);
        let sys = disc.assemble(&t, &k, &c, &SourceTerms::zeros(mesh.len()), 0.5);
        assert!(sys.residual_norm(&t) < 1e-6 * c.amax());
    }

    #[test]
    fn semi_implicit_source_stiffens_the_diagonal() {
        let (mesh, material, map, _) = setup(5, 5);
        let t = DVector::from_element(mesh.len(), 300.0);
        let mut sources = SourceTerms::zeros(mesh.len());
        sources.value.fill(10.0);
        sources.slope.fill(-2.0);
        let explicit = Discretizer::new(&mesh, SourceTreatment::Explicit);
        let semi = Discretizer::new(&mesh, SourceTreatment::SemiImplicit);
        let k = explicit.nodal_conductivity(&material, &t);
        let c = explicit.heat_capacities(&material, &map, &t);
        let a = explicit.assemble(&t, &k, &c, &sources, 1.0);
        let b = semi.assemble(&t, &k, &c, &sources, 1.0);
        for p in 0..mesh.len() {
            assert_relative_eq!(b.diag[p] - a.diag[p], 1.0, max_relative = 1e-9);
            assert_relative_eq!(b.rhs[p] - a.rhs[p], 300.0, max_relative = 1e-9);
        }
    }
}
