//! Axisymmetric (r, z) node-centred grid.
//!
//! Node `(i, j)` sits at `r = i·Δr`, `z = j·Δz`; `i = 0` is the symmetry axis. Each node
//! owns the control volume bounded by the half-node radii `r_{i±1/2}` (clipped to
//! `[0, R]`) and the half-node heights (clipped to `[0, H]`), so boundary nodes own
//! half cells and the axis node a full disc of radius `Δr/2`.
use crate::errors::{FurnaceError, FurnaceResult};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub nr: usize,
    pub nz: usize,
    /// furnace radius (m)
    pub radius: f64,
    /// furnace height (m)
    pub height: f64,
    pub dr: f64,
    pub dz: f64,
}

impl Mesh {
    pub fn new(nr: usize, nz: usize, radius: f64, height: f64) -> FurnaceResult<Self> {
        if nr < 2 || nz < 2 {
            return Err(FurnaceError::MeshInitialization(format!(
                "need at least 2 nodes per direction, got nr = {}, nz = {}",
                nr, nz
            )));
        }
        if !(radius > 0.0 && radius.is_finite()) || !(height > 0.0 && height.is_finite()) {
            return Err(FurnaceError::MeshInitialization(format!(
                "radius and height must be positive, got R = {}, H = {}",
                radius, height
            )));
        }
        Ok(Self {
            nr,
            nz,
            radius,
            height,
            dr: radius / (nr - 1) as f64,
            dz: height / (nz - 1) as f64,
        })
    }

    pub fn len(&self) -> usize {
        self.nr * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// row-major: `i` runs fastest
    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        j * self.nr + i
    }

    #[inline]
    pub fn ij(&self, idx: usize) -> (usize, usize) {
        (idx % self.nr, idx / self.nr)
    }

    #[inline]
    pub fn r(&self, i: usize) -> f64 {
        i as f64 * self.dr
    }

    #[inline]
    pub fn z(&self, j: usize) -> f64 {
        j as f64 * self.dz
    }

    /// `r_{i-1/2}`; zero on the axis
    #[inline]
    pub fn r_minus(&self, i: usize) -> f64 {
        if i == 0 {
            0.0
        } else {
            (i as f64 - 0.5) * self.dr
        }
    }

    /// `r_{i+1/2}`; `R` on the wall
    #[inline]
    pub fn r_plus(&self, i: usize) -> f64 {
        if i + 1 == self.nr {
            self.radius
        } else {
            (i as f64 + 0.5) * self.dr
        }
    }

    /// axial extent of the control volume of row `j`
    #[inline]
    pub fn cell_height(&self, j: usize) -> f64 {
        if j == 0 || j + 1 == self.nz {
            0.5 * self.dz
        } else {
            self.dz
        }
    }

    /// annulus area of column `i`, i.e. the top/bottom face of its control volume
    #[inline]
    pub fn axial_face_area(&self, i: usize) -> f64 {
        let (rm, rp) = (self.r_minus(i), self.r_plus(i));
        PI * (rp * rp - rm * rm)
    }

    /// lateral face at `r_{i+1/2}` of node `(i, j)`
    #[inline]
    pub fn radial_face_area(&self, i: usize, j: usize) -> f64 {
        2.0 * PI * self.r_plus(i) * self.cell_height(j)
    }

    #[inline]
    pub fn cell_volume(&self, i: usize, j: usize) -> f64 {
        self.axial_face_area(i) * self.cell_height(j)
    }

    /// cell volumes in node order
    pub fn volumes(&self) -> Vec<f64> {
        (0..self.len())
            .map(|idx| {
                let (i, j) = self.ij(idx);
                self.cell_volume(i, j)
            })
            .collect()
    }

    pub fn total_volume(&self) -> f64 {
        PI * self.radius * self.radius * self.height
    }

    pub fn is_axis(&self, i: usize) -> bool {
        i == 0
    }

    pub fn is_wall(&self, i: usize) -> bool {
        i + 1 == self.nr
    }

    pub fn is_bottom(&self, j: usize) -> bool {
        j == 0
    }

    pub fn is_top(&self, j: usize) -> bool {
        j + 1 == self.nz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_degenerate_grids() {
        assert_eq!(Mesh::new(1, 10, 1.0, 1.0).unwrap_err().code(), Some("E002"));
        assert_eq!(Mesh::new(10, 1, 1.0, 1.0).unwrap_err().code(), Some("E002"));
        assert!(Mesh::new(10, 10, 0.0, 1.0).is_err());
        assert!(Mesh::new(10, 10, 1.0, -2.0).is_err());
    }

    #[test]
    fn spacing_and_indexing() {
        let mesh = Mesh::new(11, 21, 0.5, 2.0).unwrap();
        assert_relative_eq!(mesh.dr, 0.05);
        assert_relative_eq!(mesh.dz, 0.1);
        assert_eq!(mesh.len(), 231);
        let idx = mesh.idx(3, 7);
        assert_eq!(mesh.ij(idx), (3, 7));
        assert_relative_eq!(mesh.r(10), 0.5);
        assert_relative_eq!(mesh.z(20), 2.0);
    }

    #[test]
    fn half_node_radii_close_the_domain() {
        let mesh = Mesh::new(6, 4, 1.0, 1.0).unwrap();
        assert_eq!(mesh.r_minus(0), 0.0);
        assert_relative_eq!(mesh.r_plus(5), 1.0);
        for i in 1..mesh.nr {
            assert_relative_eq!(mesh.r_minus(i), mesh.r_plus(i - 1));
        }
    }

    #[test]
    fn control_volumes_tile_the_cylinder() {
        let mesh = Mesh::new(17, 9, 0.3, 1.2).unwrap();
        let total: f64 = mesh.volumes().iter().sum();
        assert_relative_eq!(total, mesh.total_volume(), max_relative = 1e-12);
    }
}
