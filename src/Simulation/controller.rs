//! # Simulation controller
//!
//! Owns one furnace run and drives it through
//!
//! ```text
//! NotStarted ──start──▶ Running ⇄ Paused ──▶ Completed | Failed
//! ```
//!
//! One step advances the committed field `(T^n, H^n)` by `Δt`:
//!
//! 1. nodal `k(T^n)`, torch sources at `T^n`, heat capacities `ρ V dH/dT(T^n)`
//! 2. Crank–Nicolson assembly, boundary rows
//! 3. SOR from `T^n` (fixed nodes imposed); one retry with a relaxed tolerance
//! 4. `H^{n+1} = H^n + dH/dT(T^n)·(x − T^n)`, then `T^{n+1} = T(H^{n+1})`
//! 5. phase fractions, zones, diagnostics, commit
//!
//! Step 4 keeps the stored energy equal to what the linear system delivered, so the
//! latent heat is absorbed without an explicit phase front. Nothing is committed before
//! step 5: a failed or cancelled step leaves the last valid field in place.
//!
//! Pause requests are honoured between steps, cancel requests between SOR sweeps.
use crate::HeatTransfer::boundary::BoundaryConditionHandler;
use crate::HeatTransfer::discretizer::{Discretizer, FivePointSystem, SourceTreatment, THETA};
use crate::HeatTransfer::enthalpy::EnthalpyMap;
use crate::HeatTransfer::material::MaterialModel;
use crate::HeatTransfer::mesh::Mesh;
use crate::HeatTransfer::sor_solver::{SolveOutcome, SolveReport, SorSettings, SorSolver};
use crate::HeatTransfer::torch::TorchHeatSource;
use crate::Simulation::diagnostics::{FieldStatistics, StepDiagnostics};
use crate::Simulation::parameters::SimulationParameters;
use crate::Simulation::snapshot::ResultSnapshot;
use crate::Simulation::state::{FieldState, SimulationState};
use crate::errors::{FurnaceError, FurnaceResult};
use log::{debug, error, info, warn};
use nalgebra::DVector;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// |T| (°C) above which a field is treated as diverged
pub const BLOWUP_LIMIT: f64 = 1.0e6;

/// Thread-safe pause / cancel requests for a running controller.
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    pause: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl ControlHandle {
    /// honoured at the next step boundary
    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    /// aborts the step in flight; the controller keeps the last committed field
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.pause.store(false, Ordering::SeqCst);
        self.cancel.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// a step was committed and time remains
    Advanced,
    /// the committed step reached the simulation duration
    Completed,
    /// the step was discarded; the controller is `Paused`
    Cancelled,
}

/// Reason a run went to `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    pub code: Option<&'static str>,
    pub message: String,
    pub step: usize,
    pub time: f64,
}

/// Everything a step needs that stays fixed for the whole run.
#[derive(Debug, Clone)]
struct RunContext {
    mesh: Mesh,
    material: MaterialModel,
    map: EnthalpyMap,
    torches: TorchHeatSource,
    boundary: BoundaryConditionHandler,
    discretizer: Discretizer,
    solver: SorSolver,
}

impl RunContext {
    fn build(params: &SimulationParameters) -> FurnaceResult<Self> {
        let mesh = params.mesh()?;
        let material = MaterialModel::new(params.material.clone())?;
        let (t_lo, t_hi) = params.temperature_range();
        let map = EnthalpyMap::new(&material, t_lo, t_hi)?;
        let table_fallbacks = material.take_fallbacks();
        if table_fallbacks > 0 {
            warn!(
                "enthalpy table: {} specific heat evaluation(s) fell back to the base value",
                table_fallbacks
            );
        }
        let torches = TorchHeatSource::new(
            &mesh,
            &params.torches,
            material.emissivity(),
            params.convection_coefficient,
            params.enable_radiation,
            params.enable_convection,
        );
        debug!(
            "{} torch(es) deposit {:.1} W",
            torches.torch_count(),
            torches.deposited_power()
        );
        let boundary = BoundaryConditionHandler::new(
            &mesh,
            params.boundary,
            params.ambient_temperature,
            params.convection_coefficient,
            material.emissivity(),
            params.enable_convection,
            params.enable_radiation,
        );
        let discretizer = Discretizer::new(&mesh, params.source_treatment);
        let solver = SorSolver::new(params.sor_settings());
        Ok(Self {
            mesh,
            material,
            map,
            torches,
            boundary,
            discretizer,
            solver,
        })
    }

    fn initial_field(&self, params: &SimulationParameters) -> FieldState {
        FieldState::initial(self.mesh.len(), params.initial_temperature, &self.map, &self.boundary)
    }
}

/// Result of the linear solve of one step, after the retry policy.
struct SolvedStep {
    x: DVector<f64>,
    report: SolveReport,
    retried: bool,
}

#[derive(Debug)]
pub struct SimulationController {
    params: Option<SimulationParameters>,
    context: Option<RunContext>,
    state: SimulationState,
    field: Option<FieldState>,
    paused_field: Option<FieldState>,
    step_index: usize,
    energy_input: f64,
    history: Vec<StepDiagnostics>,
    failure: Option<FailureReport>,
    control: ControlHandle,
}

impl Default for SimulationController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationController {
    /// Controller without parameters; `configure` must be called before `start`.
    pub fn new() -> Self {
        Self {
            params: None,
            context: None,
            state: SimulationState::NotStarted,
            field: None,
            paused_field: None,
            step_index: 0,
            energy_input: 0.0,
            history: Vec::new(),
            failure: None,
            control: ControlHandle::default(),
        }
    }

    pub fn with_parameters(params: SimulationParameters) -> FurnaceResult<Self> {
        let mut controller = Self::new();
        controller.configure(params)?;
        Ok(controller)
    }

    fn invalid(&self, operation: &str) -> FurnaceError {
        FurnaceError::InvalidTransition {
            operation: operation.to_string(),
            state: self.state.to_string(),
        }
    }

    /// Validates and stores a parameter set and builds the run context.
    ///
    /// Rejected while a run is active. Re-configuring a not yet started controller with
    /// identical parameters is a no-op; a finished run is reset to `NotStarted`.
    pub fn configure(&mut self, params: SimulationParameters) -> FurnaceResult<()> {
        if matches!(self.state, SimulationState::Running | SimulationState::Paused) {
            return Err(self.invalid("configure"));
        }
        if self.state == SimulationState::NotStarted && self.params.as_ref() == Some(&params) {
            debug!("configure: identical parameters, nothing to do");
            return Ok(());
        }
        if let Err(e) = params.validate() {
            warn!("configuration rejected: {}", e);
            return Err(e);
        }
        let context = RunContext::build(&params)?;
        info!(
            "configured {}x{} grid (R = {} m, H = {} m), {} torch(es), Δt = {} s, {} step(s)",
            context.mesh.nr,
            context.mesh.nz,
            context.mesh.radius,
            context.mesh.height,
            context.torches.torch_count(),
            params.simulation_time_step,
            params.step_count()
        );
        self.field = Some(context.initial_field(&params));
        self.context = Some(context);
        self.params = Some(params);
        self.clear_run();
        Ok(())
    }

    fn clear_run(&mut self) {
        self.state = SimulationState::NotStarted;
        self.paused_field = None;
        self.step_index = 0;
        self.energy_input = 0.0;
        self.history.clear();
        self.failure = None;
        self.control.clear();
    }

    /// NotStarted → Running
    pub fn start(&mut self) -> FurnaceResult<()> {
        if self.state != SimulationState::NotStarted {
            return Err(self.invalid("start"));
        }
        let (Some(params), Some(context)) = (&self.params, &self.context) else {
            return Err(self.invalid("start"));
        };
        self.field = Some(context.initial_field(params));
        self.control.clear();
        self.state = SimulationState::Running;
        info!("simulation started");
        Ok(())
    }

    /// Running → Paused; the committed field is set aside until `resume`.
    pub fn pause(&mut self) -> FurnaceResult<()> {
        if self.state != SimulationState::Running {
            return Err(self.invalid("pause"));
        }
        self.paused_field = self.field.clone();
        self.state = SimulationState::Paused;
        info!("paused at step {} (t = {:.3} s)", self.step_index, self.time());
        Ok(())
    }

    /// Paused → Running; restores the field captured by `pause`.
    pub fn resume(&mut self) -> FurnaceResult<()> {
        if self.state != SimulationState::Paused {
            return Err(self.invalid("resume"));
        }
        if let Some(field) = self.paused_field.take() {
            self.field = Some(field);
        }
        self.control.clear();
        self.state = SimulationState::Running;
        info!("resumed at step {}", self.step_index);
        Ok(())
    }

    /// Back to `NotStarted` with the current parameters; not allowed while running.
    pub fn reset(&mut self) -> FurnaceResult<()> {
        if self.state == SimulationState::Running {
            return Err(self.invalid("reset"));
        }
        if let (Some(params), Some(context)) = (&self.params, &self.context) {
            self.field = Some(context.initial_field(params));
        }
        self.clear_run();
        info!("simulation reset");
        Ok(())
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn parameters(&self) -> Option<&SimulationParameters> {
        self.params.as_ref()
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.context.as_ref().map(|c| &c.mesh)
    }

    /// last committed field; after a failure this is the last valid one
    pub fn field(&self) -> Option<&FieldState> {
        self.field.as_ref()
    }

    pub fn history(&self) -> &[StepDiagnostics] {
        &self.history
    }

    pub fn failure(&self) -> Option<&FailureReport> {
        self.failure.as_ref()
    }

    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// simulated time of the committed field (s)
    pub fn time(&self) -> f64 {
        match &self.params {
            Some(p) => (self.step_index as f64 * p.simulation_time_step).min(p.simulation_duration),
            None => 0.0,
        }
    }

    /// Snapshot of the committed field with the latest diagnostics.
    pub fn snapshot(&self) -> Option<ResultSnapshot> {
        let mesh = self.mesh()?;
        let field = self.field.as_ref()?;
        Some(ResultSnapshot::new(
            mesh,
            self.step_index,
            self.time(),
            self.state,
            field,
            self.history.last().cloned(),
        ))
    }

    /// Advances one step. Requires `Running`.
    ///
    /// On a numerical failure the controller goes to `Failed`, keeps the last valid
    /// field and returns the error.
    pub fn step(&mut self) -> FurnaceResult<StepStatus> {
        if self.state != SimulationState::Running {
            return Err(self.invalid("step"));
        }
        match self.advance() {
            Ok(status) => Ok(status),
            Err(e) => {
                let (step, time) = (self.step_index + 1, self.time());
                error!("step {} failed: {}", step, e);
                self.failure = Some(FailureReport {
                    code: e.code(),
                    message: e.to_string(),
                    step,
                    time,
                });
                self.state = SimulationState::Failed;
                Err(e)
            }
        }
    }

    /// Steps until the run completes, fails, or is paused or cancelled through the
    /// control handle. Starts a `NotStarted` run; resumes a `Paused` one.
    pub fn run_to_completion(&mut self) -> FurnaceResult<SimulationState> {
        match self.state {
            SimulationState::NotStarted => self.start()?,
            SimulationState::Paused => self.resume()?,
            SimulationState::Running => {}
            SimulationState::Completed | SimulationState::Failed => return Ok(self.state),
        }
        while self.state == SimulationState::Running {
            if self.control.pause.swap(false, Ordering::SeqCst) {
                self.pause()?;
                break;
            }
            self.step()?;
        }
        Ok(self.state)
    }

    fn advance(&mut self) -> FurnaceResult<StepStatus> {
        let (Some(params), Some(ctx), Some(field)) = (&self.params, &self.context, &self.field)
        else {
            return Err(self.invalid("step"));
        };
        let step = self.step_index + 1;
        let t_now = self.time();
        let dt = params
            .simulation_time_step
            .min(params.simulation_duration - t_now);
        let t_old = &field.temperature;

        let conductivity = ctx.discretizer.nodal_conductivity(&ctx.material, t_old);
        let sources = ctx.torches.evaluate(t_old);
        let capacity = ctx.discretizer.heat_capacities(&ctx.material, &ctx.map, t_old);
        let mut system = ctx.discretizer.assemble(t_old, &conductivity, &capacity, &sources, dt);
        ctx.boundary.apply(&mut system, t_old, THETA);

        let mut x0 = t_old.clone();
        ctx.boundary.impose_fixed(&mut x0);

        let Some(solved) = self.solve(ctx, params, &system, &x0, step, t_now + dt)? else {
            self.control.cancel.store(false, Ordering::SeqCst);
            self.paused_field = self.field.clone();
            self.state = SimulationState::Paused;
            warn!("step {} cancelled, field kept at t = {:.3} s", step, t_now);
            return Ok(StepStatus::Cancelled);
        };
        check_field(&solved.x, step, t_now + dt)?;

        let rho = ctx.material.density();
        let volumes = ctx.discretizer.volumes();
        let mut enthalpy = field.enthalpy.clone();
        for p in 0..enthalpy.len() {
            let c_eff = capacity[p] / (rho * volumes[p]);
            enthalpy[p] += c_eff * (solved.x[p] - t_old[p]);
        }
        let new_field = FieldState::from_enthalpy(enthalpy, &ctx.map);
        check_field(&new_field.temperature, step, t_now + dt)?;

        // heat delivered by the sources and the Robin wall over the step
        let t_mid = t_old * (1.0 - THETA) + &solved.x * THETA;
        let mut source_power = sources.total();
        if ctx.discretizer.source_treatment == SourceTreatment::SemiImplicit {
            source_power += sources
                .slope
                .iter()
                .zip(solved.x.iter().zip(t_old.iter()))
                .map(|(s, (x, t))| THETA * s.min(0.0) * (x - t))
                .sum::<f64>();
        }
        let wall_power = ctx.boundary.wall_heat_flow(t_old, &t_mid);
        let energy_input = self.energy_input + (source_power + wall_power) * dt;

        let new_k = ctx.discretizer.nodal_conductivity(&ctx.material, &new_field.temperature);
        let stats = FieldStatistics::compute(&ctx.mesh, volumes, rho, &new_k, &new_field);
        let fallbacks = ctx.material.take_fallbacks();
        let mut warnings = Vec::new();
        if solved.retried {
            warnings.push(format!(
                "converged only with tolerance relaxed by {}",
                params.retry_tolerance_factor
            ));
        }
        if fallbacks > 0 {
            warnings.push(format!(
                "{} property evaluation(s) fell back to the base value",
                fallbacks
            ));
        }
        let time = (step as f64 * params.simulation_time_step).min(params.simulation_duration);
        let diagnostics = StepDiagnostics {
            step,
            time,
            dt,
            sor_iterations: solved.report.iterations,
            residual: solved.report.residual,
            retried: solved.retried,
            min_temperature: stats.min_temperature,
            max_temperature: stats.max_temperature,
            avg_temperature: stats.avg_temperature,
            max_gradient: stats.max_gradient,
            max_heat_flux: stats.max_heat_flux,
            total_energy: stats.total_energy,
            energy_input,
            melt_volume_fraction: stats.melt_volume_fraction,
            zone_counts: new_field.zone_counts(),
            property_fallbacks: fallbacks,
            warnings,
        };
        debug!(
            "step {}: t = {:.3} s, {} sweeps, T in [{:.2}, {:.2}] °C",
            step, time, diagnostics.sor_iterations, stats.min_temperature, stats.max_temperature
        );

        let done = step >= params.step_count();
        self.field = Some(new_field);
        self.energy_input = energy_input;
        self.step_index = step;
        self.history.push(diagnostics);
        if done {
            self.state = SimulationState::Completed;
            info!("simulation completed after {} step(s), t = {:.3} s", step, time);
            Ok(StepStatus::Completed)
        } else {
            Ok(StepStatus::Advanced)
        }
    }

    /// Runs SOR, retrying once with a relaxed tolerance. `None` means cancelled.
    fn solve(
        &self,
        ctx: &RunContext,
        params: &SimulationParameters,
        system: &FivePointSystem,
        x0: &DVector<f64>,
        step: usize,
        time: f64,
    ) -> FurnaceResult<Option<SolvedStep>> {
        let cancel = Some(self.control.cancel.as_ref());
        let (x, first) = match ctx.solver.solve(system, x0, cancel) {
            SolveOutcome::Converged { x, report } => {
                return Ok(Some(SolvedStep {
                    x,
                    report,
                    retried: false,
                }));
            }
            SolveOutcome::Cancelled { .. } => return Ok(None),
            SolveOutcome::DidNotConverge { x, report } => (x, report),
        };
        if !first.residual.is_finite() {
            return Err(FurnaceError::NumericalInstability {
                step,
                time,
                message: "SOR update became non-finite".to_string(),
            });
        }
        let relaxed = SorSettings {
            tolerance: params.convergence_tolerance * params.retry_tolerance_factor,
            ..ctx.solver.settings
        };
        warn!(
            "step {}: SOR stopped at update {:.3e} after {} sweeps, retrying with tolerance {:.3e}",
            step, first.residual, first.iterations, relaxed.tolerance
        );
        match SorSolver::new(relaxed).solve(system, &x, cancel) {
            SolveOutcome::Converged { x, mut report } => {
                report.iterations += first.iterations;
                Ok(Some(SolvedStep {
                    x,
                    report,
                    retried: true,
                }))
            }
            SolveOutcome::Cancelled { .. } => Ok(None),
            SolveOutcome::DidNotConverge { report, .. } => Err(FurnaceError::Convergence {
                iterations: first.iterations + report.iterations,
                residual: report.residual,
                tolerance: relaxed.tolerance,
            }),
        }
    }
}

fn check_field(t: &DVector<f64>, step: usize, time: f64) -> FurnaceResult<()> {
    if let Some(p) = t.iter().position(|v| !v.is_finite() || v.abs() > BLOWUP_LIMIT) {
        return Err(FurnaceError::NumericalInstability {
            step,
            time,
            message: format!("temperature {} at node {} is non-finite or diverging", t[p], p),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diverging_field_is_an_instability() {
        let ok = DVector::from_vec(vec![25.0, 1500.0, -20.0]);
        assert!(check_field(&ok, 1, 0.5).is_ok());
        for bad in [f64::NAN, f64::INFINITY, 2.0 * BLOWUP_LIMIT] {
            let t = DVector::from_vec(vec![25.0, bad]);
            let err = check_field(&t, 4, 2.0).unwrap_err();
            assert_eq!(err.code(), Some("E003"));
            assert!(err.to_string().contains("step 4"));
        }
    }

    #[test]
    fn control_handle_is_shared() {
        let controller = SimulationController::new();
        let handle = controller.control();
        handle.request_pause();
        assert!(controller.control().pause_requested());
        assert!(!controller.control().cancel_requested());
        handle.clear();
        assert!(!controller.control().pause_requested());
    }
}
