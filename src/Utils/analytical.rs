//! # Analytical reference solutions
//!
//! Carslaw & Jaeger, *Conduction of Heat in Solids*, §7.4: a long solid cylinder of
//! radius `R`, uniform initial temperature `T0`, whose surface is held at `Ts` from
//! `t = 0`:
//!
//! ```text
//! T(r,t) = Ts + (T0 - Ts) Σ 2 / (β_n J1(β_n)) · J0(β_n r/R) · exp(-α β_n² t / R²)
//! ```
//!
//! where `β_n` are the positive roots of `J0`. Bessel functions are evaluated with the
//! integral representation `J_n(x) = 1/(2π) ∫ cos(nτ - x sin τ) dτ` over one period,
//! for which the trapezoidal rule converges spectrally.
use std::f64::consts::PI;

/// Bessel function of the first kind of integer order `n`.
pub fn bessel_j(n: u32, x: f64) -> f64 {
    let samples = 2 * (x.abs().ceil() as usize) + 64;
    let h = 2.0 * PI / samples as f64;
    let n = n as f64;
    let sum: f64 = (0..samples)
        .map(|k| {
            let tau = k as f64 * h;
            (n * tau - x * tau.sin()).cos()
        })
        .sum();
    sum / samples as f64
}

pub fn bessel_j0(x: f64) -> f64 {
    bessel_j(0, x)
}

pub fn bessel_j1(x: f64) -> f64 {
    bessel_j(1, x)
}

/// First `count` positive roots of J0, McMahon's estimate refined by Newton (J0' = -J1).
pub fn bessel_j0_zeros(count: usize) -> Vec<f64> {
    (1..=count)
        .map(|n| {
            let mut beta = (n as f64 - 0.25) * PI;
            for _ in 0..50 {
                let delta = bessel_j0(beta) / bessel_j1(beta);
                beta += delta;
                if delta.abs() < 1e-14 * beta {
                    break;
                }
            }
            beta
        })
        .collect()
}

/// Sudden surface temperature on a long solid cylinder.
#[derive(Debug, Clone)]
pub struct CylinderQuench {
    /// Cylinder radius (m)
    pub radius: f64,
    /// Thermal diffusivity k/(ρ c_p) (m²/s)
    pub diffusivity: f64,
    /// Initial uniform temperature
    pub t_initial: f64,
    /// Imposed surface temperature
    pub t_surface: f64,
    roots: Vec<f64>,
    weights: Vec<f64>,
}

impl CylinderQuench {
    pub fn new(
        radius: f64,
        diffusivity: f64,
        t_initial: f64,
        t_surface: f64,
        modes: usize,
    ) -> Self {
        let roots = bessel_j0_zeros(modes);
        let weights = roots
            .iter()
            .map(|beta| 2.0 / (beta * bessel_j1(*beta)))
            .collect();
        Self {
            radius,
            diffusivity,
            t_initial,
            t_surface,
            roots,
            weights,
        }
    }

    pub fn temperature(&self, r: f64, t: f64) -> f64 {
        let fo = self.diffusivity * t / (self.radius * self.radius);
        let xi = (r / self.radius).clamp(0.0, 1.0);
        let series: f64 = self
            .roots
            .iter()
            .zip(&self.weights)
            .map(|(beta, w)| w * bessel_j0(beta * xi) * (-beta * beta * fo).exp())
            .sum();
        self.t_surface + (self.t_initial - self.t_surface) * series
    }
}

/// L2 norm of `computed - reference`, relative to the L2 norm of the reference
/// deviation from `baseline` (the rise the solution has to reproduce).
pub fn relative_l2_error(computed: &[f64], reference: &[f64], baseline: f64) -> f64 {
    let num: f64 = computed
        .iter()
        .zip(reference)
        .map(|(c, r)| (c - r).powi(2))
        .sum();
    let den: f64 = reference.iter().map(|r| (r - baseline).powi(2)).sum();
    if den == 0.0 {
        return num.sqrt();
    }
    (num / den).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bessel_values_match_tables() {
        assert_relative_eq!(bessel_j0(0.0), 1.0, epsilon = 1e-14);
        assert_relative_eq!(bessel_j1(0.0), 0.0, epsilon = 1e-14);
        assert_relative_eq!(bessel_j0(1.0), 0.765_197_686_557_966_6, epsilon = 1e-12);
        assert_relative_eq!(bessel_j1(1.0), 0.440_050_585_744_933_5, epsilon = 1e-12);
        assert_relative_eq!(bessel_j0(10.0), -0.245_935_764_451_348_3, epsilon = 1e-12);
    }

    #[test]
    fn j0_zeros() {
        let z = bessel_j0_zeros(3);
        assert_relative_eq!(z[0], 2.404_825_557_695_773, epsilon = 1e-10);
        assert_relative_eq!(z[1], 5.520_078_110_286_311, epsilon = 1e-10);
        assert_relative_eq!(z[2], 8.653_727_912_911_013, epsilon = 1e-10);
    }

    #[test]
    fn quench_limits() {
        let q = CylinderQuench::new(0.1, 1e-5, 25.0, 500.0, 60);
        assert_relative_eq!(q.temperature(0.1, 10.0), 500.0, epsilon = 1e-9);
        assert!((q.temperature(0.0, 1e6) - 500.0).abs() < 1e-6);
        let centre = q.temperature(0.0, 60.0);
        assert!(centre > 25.0 && centre < 500.0);
    }
}
