//! Successive over-relaxation for [`FivePointSystem`].
//!
//! Each sweep visits the nodes in a fixed order and updates them in place from the
//! most recent neighbour values:
//!
//! ```text
//! x_p ← (1 − ω) x_p + ω (b_p − Σ_q a_pq x_q) / a_pp
//! ```
//!
//! `Lexicographic` ordering is row-major (i fastest). `RedBlack` updates all nodes with
//! even `i + j` first, then the odd ones; within a colour no node reads another of the
//! same colour, so a colour can be split across workers without races.
//!
//! The convergence measure is the largest absolute update of a sweep.
use crate::HeatTransfer::discretizer::FivePointSystem;
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SweepOrder {
    #[default]
    Lexicographic,
    RedBlack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SorSettings {
    /// relaxation factor ω
    pub omega: f64,
    /// max absolute update per sweep at which the solve stops
    pub tolerance: f64,
    pub max_iterations: usize,
    pub order: SweepOrder,
    /// keep the residual of every sweep in the report
    pub record_history: bool,
}

impl Default for SorSettings {
    fn default() -> Self {
        Self {
            omega: 1.3,
            tolerance: 1e-6,
            max_iterations: 5000,
            order: SweepOrder::Lexicographic,
            record_history: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    pub residual: f64,
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Converged { x: DVector<f64>, report: SolveReport },
    /// `x` is the iterate with the smallest update seen
    DidNotConverge { x: DVector<f64>, report: SolveReport },
    /// a cancel request arrived between sweeps; nothing is returned
    Cancelled { iterations: usize },
}

impl SolveOutcome {
    pub fn iterations(&self) -> usize {
        match self {
            SolveOutcome::Converged { report, .. }
            | SolveOutcome::DidNotConverge { report, .. } => report.iterations,
            SolveOutcome::Cancelled { iterations } => *iterations,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, SolveOutcome::Converged { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SorSolver {
    pub settings: SorSettings,
}

impl SorSolver {
    pub fn new(settings: SorSettings) -> Self {
        Self { settings }
    }

    #[inline]
    fn relax(&self, system: &FivePointSystem, x: &mut DVector<f64>, p: usize) -> f64 {
        let gs = (system.rhs[p] - system.off_diagonal_product(p, x)) / system.diag[p];
        let old = x[p];
        let new = old + self.settings.omega * (gs - old);
        x[p] = new;
        (new - old).abs()
    }

    /// One sweep in place; returns the largest absolute update.
    pub fn sweep(&self, system: &FivePointSystem, x: &mut DVector<f64>) -> f64 {
        let (nr, nz) = (system.nr, system.nz);
        let mut max_update: f64 = 0.0;
        match self.settings.order {
            SweepOrder::Lexicographic => {
                for p in 0..nr * nz {
                    max_update = max_update.max(self.relax(system, x, p));
                }
            }
            SweepOrder::RedBlack => {
                for colour in 0..2 {
                    for j in 0..nz {
                        let start = (colour + j) % 2;
                        for i in (start..nr).step_by(2) {
                            max_update = max_update.max(self.relax(system, x, j * nr + i));
                        }
                    }
                }
            }
        }
        max_update
    }

    /// Iterates from `x0` until the update drops below the tolerance, the iteration
    /// budget runs out, an update becomes non-finite, or `cancel` is raised.
    pub fn solve(
        &self,
        system: &FivePointSystem,
        x0: &DVector<f64>,
        cancel: Option<&AtomicBool>,
    ) -> SolveOutcome {
        let s = &self.settings;
        let mut x = x0.clone();
        let mut best = x0.clone();
        let mut best_residual = f64::INFINITY;
        let mut history = Vec::new();
        let mut residual = f64::INFINITY;
        let mut iterations = 0;

        while iterations < s.max_iterations {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                debug!("SOR cancelled after {} sweeps", iterations);
                return SolveOutcome::Cancelled { iterations };
            }
            residual = self.sweep(system, &mut x);
            iterations += 1;
            if s.record_history {
                history.push(residual);
            }
            if !residual.is_finite() {
                break;
            }
            if residual < best_residual {
                best_residual = residual;
                best.copy_from(&x);
            }
            if residual < s.tolerance {
                debug!("SOR converged in {} sweeps, update {:.3e}", iterations, residual);
                return SolveOutcome::Converged {
                    x,
                    report: SolveReport {
                        iterations,
                        residual,
                        history,
                    },
                };
            }
        }
        debug!("SOR stopped after {} sweeps, update {:.3e}", iterations, residual);
        SolveOutcome::DidNotConverge {
            x: best,
            report: SolveReport {
                iterations,
                residual: best_residual.min(residual),
                history,
            },
        }
    }
}
