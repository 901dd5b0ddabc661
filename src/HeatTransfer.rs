//! # Heat transfer core
//!
//! Numerical pieces of the furnace model, leaves first:
//!
//! | Module | Role |
//! |--------|------|
//! | `mesh` | axisymmetric (r, z) node grid, half-node radii, control volumes |
//! | `material` | k(T), c_p(T), phase-change constants, thermal zones |
//! | `enthalpy` | H(T) with smeared latent heat and its exact inverse |
//! | `torch` | per-node deposition, radiative and convective torch terms |
//! | `boundary` | axis symmetry, Robin/Dirichlet wall, top/bottom conditions |
//! | `discretizer` | Crank–Nicolson 5-point finite-volume system |
//! | `sor_solver` | successive over-relaxation |
//!
//! ## Governing equation
//!
//! ```text
//! ρ ∂H/∂t = (1/r) ∂/∂r (r k ∂T/∂r) + ∂/∂z (k ∂T/∂z) + q_torch,     H = H(T)
//! ```
pub mod boundary;
pub mod discretizer;
pub mod enthalpy;
pub mod material;
pub mod mesh;
pub mod sor_solver;
pub mod torch;
