//! # Enthalpy map
//!
//! Specific enthalpy `H(T) = ∫ c_p(T') dT' + Σ L_k · s((T - T_k)/ΔT_pc)` where `s` is a
//! linear ramp from 0 to 1 across a band of width `ΔT_pc` centred on each transition
//! (drying at 100 °C, melting, vaporization). `H(0 °C) = 0`.
//!
//! `H` is tabulated on a uniform temperature grid and defined as the piecewise-linear
//! interpolant of that table, so it is strictly increasing whenever `c_p > 0` and its
//! inverse `T(H)` is exact: binary search for the cell, then invert the linear piece.
//! Outside the table both maps extrapolate linearly with the end slopes.
use crate::HeatTransfer::material::MaterialModel;
use crate::errors::{FurnaceError, FurnaceResult};
use log::info;

const MAX_TABLE_POINTS: usize = 200_000;
const POINTS_PER_BAND: f64 = 20.0;

/// Position of a latent band on the enthalpy axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatentBand {
    pub t_center: f64,
    pub h_low: f64,
    pub h_high: f64,
}

impl LatentBand {
    /// 0 below the band, 1 above, linear in H inside
    pub fn fraction(&self, h: f64) -> f64 {
        if self.h_high <= self.h_low {
            return if h >= self.h_high { 1.0 } else { 0.0 };
        }
        ((h - self.h_low) / (self.h_high - self.h_low)).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct EnthalpyMap {
    t_min: f64,
    step: f64,
    h: Vec<f64>,
    melt_band: Option<LatentBand>,
    vapor_band: Option<LatentBand>,
}

fn ramp(x: f64) -> f64 {
    (x + 0.5).clamp(0.0, 1.0)
}

impl EnthalpyMap {
    /// Tabulates `H` on `[t_min, t_max]` (°C).
    pub fn new(material: &MaterialModel, t_min: f64, t_max: f64) -> FurnaceResult<Self> {
        if !(t_max > t_min) || !t_min.is_finite() || !t_max.is_finite() {
            return Err(FurnaceError::validation(
                "temperatureRange",
                format!("invalid enthalpy table range [{}, {}]", t_min, t_max),
            ));
        }
        let band = material.props.phase_change_interval;
        let span = t_max - t_min;
        let step = (band / POINTS_PER_BAND)
            .min(1.0)
            .max(span / (MAX_TABLE_POINTS - 1) as f64);
        let n = (span / step).ceil() as usize + 1;
        let transitions = material.transitions();

        let mut h = Vec::with_capacity(n);
        let mut sensible = 0.0;
        let mut cp_prev = material.specific_heat(t_min);
        for k in 0..n {
            let t = t_min + k as f64 * step;
            if k > 0 {
                let cp = material.specific_heat(t);
                sensible += 0.5 * (cp_prev + cp) * step;
                cp_prev = cp;
            }
            let latent: f64 = transitions
                .iter()
                .map(|(tc, l)| l * ramp((t - tc) / band))
                .sum();
            h.push(sensible + latent);
        }
        for w in h.windows(2) {
            if !(w[1] > w[0]) {
                return Err(FurnaceError::validation(
                    "specificHeat",
                    "enthalpy is not strictly increasing; c_p(T) must stay positive",
                ));
            }
        }

        let mut map = Self {
            t_min,
            step,
            h,
            melt_band: None,
            vapor_band: None,
        };
        let offset = map.enthalpy(0.0);
        map.h.iter_mut().for_each(|v| *v -= offset);

        let props = &material.props;
        map.melt_band = props.melting_point.map(|tm| map.band(tm, band));
        map.vapor_band = props.vaporization_point.map(|tv| map.band(tv, band));
        info!(
            "enthalpy table: {} points on [{:.1}, {:.1}] °C, step {:.3} K, {} latent transition(s)",
            n,
            t_min,
            map.t_max(),
            step,
            transitions.len()
        );
        Ok(map)
    }

    fn band(&self, t_center: f64, width: f64) -> LatentBand {
        LatentBand {
            t_center,
            h_low: self.enthalpy(t_center - 0.5 * width),
            h_high: self.enthalpy(t_center + 0.5 * width),
        }
    }

    pub fn t_max(&self) -> f64 {
        self.t_min + (self.h.len() - 1) as f64 * self.step
    }

    fn t_at(&self, k: usize) -> f64 {
        self.t_min + k as f64 * self.step
    }

    /// cell `k` spans `[t_k, t_{k+1}]`; clamped to the table so the end cells extrapolate
    fn cell_of_t(&self, t: f64) -> usize {
        let k = ((t - self.t_min) / self.step).floor();
        if k <= 0.0 {
            0
        } else {
            (k as usize).min(self.h.len() - 2)
        }
    }

    fn cell_of_h(&self, h: f64) -> usize {
        // first index with table value > h, minus one
        let above = self.h.partition_point(|v| *v <= h);
        above.saturating_sub(1).min(self.h.len() - 2)
    }

    /// H(T), J/kg
    pub fn enthalpy(&self, t: f64) -> f64 {
        let k = self.cell_of_t(t);
        let t0 = self.t_at(k);
        let slope = (self.h[k + 1] - self.h[k]) / self.step;
        self.h[k] + slope * (t - t0)
    }

    /// T(H), °C
    pub fn temperature(&self, h: f64) -> f64 {
        let k = self.cell_of_h(h);
        let slope = (self.h[k + 1] - self.h[k]) / self.step;
        self.t_at(k) + (h - self.h[k]) / slope
    }

    /// dH/dT at T: the apparent heat capacity including smeared latent heat
    pub fn effective_heat_capacity(&self, t: f64) -> f64 {
        let k = self.cell_of_t(t);
        (self.h[k + 1] - self.h[k]) / self.step
    }

    /// liquid fraction from the position of H in the melting band
    pub fn melt_fraction(&self, h: f64) -> f64 {
        self.melt_band.map(|b| b.fraction(h)).unwrap_or(0.0)
    }

    pub fn vapor_fraction(&self, h: f64) -> f64 {
        self.vapor_band.map(|b| b.fraction(h)).unwrap_or(0.0)
    }
}
