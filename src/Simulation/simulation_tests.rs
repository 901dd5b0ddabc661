#[cfg(test)]
mod tests {
    use super::super::controller::*;
    use super::super::parameters::SimulationParameters;
    use super::super::snapshot::{ResultSnapshot, SCHEMA_VERSION};
    use super::super::state::SimulationState;
    use crate::HeatTransfer::boundary::{BoundarySettings, EndCondition, WallCondition};
    use crate::HeatTransfer::material::{FormulaLaw, MaterialProperties, PropertyLaw};
    use crate::HeatTransfer::torch::PlasmaTorch;
    use crate::Utils::analytical::{CylinderQuench, relative_l2_error};
    use crate::errors::FurnaceError;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    /// small furnace with one axial torch and every exchange switched on
    fn small_furnace() -> SimulationParameters {
        SimulationParameters {
            furnace_radius: 0.3,
            furnace_height: 0.6,
            mesh_radial_cells: 9,
            mesh_axial_cells: 13,
            simulation_time_step: 0.5,
            simulation_duration: 5.0,
            torches: vec![PlasmaTorch {
                r_position: 0.0,
                z_position: 0.5,
                pitch: 90.0,
                power: 50.0,
                spread: 0.08,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// long solid cylinder with a suddenly imposed surface temperature
    fn quench(
        nr: usize,
        radius: f64,
        dt: f64,
        duration: f64,
        t_surface: f64,
    ) -> SimulationParameters {
        SimulationParameters {
            furnace_radius: radius,
            furnace_height: 2.0 * radius,
            mesh_radial_cells: nr,
            mesh_axial_cells: 5,
            simulation_time_step: dt,
            simulation_duration: duration,
            convergence_tolerance: 1e-8,
            initial_temperature: 25.0,
            enable_convection: false,
            enable_radiation: false,
            boundary: BoundarySettings {
                wall: WallCondition::FixedTemperature {
                    temperature: t_surface,
                },
                bottom: EndCondition::Adiabatic,
                top: EndCondition::Adiabatic,
            },
            torches: vec![],
            material: MaterialProperties {
                thermal_conductivity: 50.0,
                density: 7800.0,
                specific_heat: 500.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn radial_profile(controller: &SimulationController, j: usize) -> Vec<f64> {
        let snapshot = controller.snapshot().unwrap();
        (0..snapshot.nr).map(|i| snapshot.temperature_at(i, j)).collect()
    }

    #[test]
    fn cylinder_quench_matches_series_solution() {
        let mut params = quench(50, 0.1, 0.1, 60.0, 500.0);
        params.mesh_axial_cells = 50;
        params.furnace_height = 0.2;
        params.convergence_tolerance = 1e-6;
        let mut controller = SimulationController::with_parameters(params).unwrap();
        assert_eq!(controller.run_to_completion().unwrap(), SimulationState::Completed);
        assert_eq!(controller.step_index(), 600);
        assert_relative_eq!(controller.time(), 60.0, epsilon = 1e-9);

        let mesh = controller.mesh().unwrap().clone();
        let reference = CylinderQuench::new(0.1, 50.0 / (7800.0 * 500.0), 25.0, 500.0, 60);
        let computed = radial_profile(&controller, mesh.nz / 2);
        let exact: Vec<f64> = (0..mesh.nr)
            .map(|i| reference.temperature(mesh.r(i), 60.0))
            .collect();
        let error = relative_l2_error(&computed, &exact, 25.0);
        assert!(error < 0.05, "relative L2 error {}", error);
        // ends are adiabatic: no axial variation
        let bottom = radial_profile(&controller, 0);
        for (a, b) in bottom.iter().zip(&computed) {
            assert_relative_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn axis_profile_is_flat() {
        let params = quench(21, 0.01, 0.02, 5.0, 500.0);
        let mut controller = SimulationController::with_parameters(params).unwrap();
        controller.run_to_completion().unwrap();
        let t = radial_profile(&controller, 2);
        let (d0, d1) = (t[1] - t[0], t[2] - t[1]);
        assert!(d0 > 0.0 && d1 > d0, "{} {}", d0, d1);
        // T ≈ a + b r² near the axis
        let ratio = d0 / d1;
        assert!(ratio > 0.25 && ratio < 0.42, "ratio {}", ratio);
        let diag = controller.history().last().unwrap();
        assert!(diag.max_temperature <= 500.0 + 1e-6);
        assert!(diag.min_temperature >= 25.0 - 1e-6);
    }

    #[test]
    fn adiabatic_furnace_conserves_torch_energy() {
        let params = SimulationParameters {
            furnace_radius: 0.5,
            furnace_height: 1.0,
            mesh_radial_cells: 11,
            mesh_axial_cells: 11,
            simulation_time_step: 0.5,
            simulation_duration: 5.0,
            convergence_tolerance: 1e-10,
            enable_convection: false,
            enable_radiation: false,
            torches: vec![PlasmaTorch {
                r_position: 0.0,
                z_position: 0.5,
                pitch: 90.0,
                power: 100.0,
                efficiency: 0.7,
                spread: 0.1,
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut controller = SimulationController::with_parameters(params).unwrap();
        let mesh = controller.mesh().unwrap().clone();
        let volumes = mesh.volumes();
        let energy = |c: &SimulationController| -> f64 {
            let field = c.field().unwrap();
            volumes
                .iter()
                .zip(field.enthalpy.iter())
                .map(|(v, h)| 2500.0 * v * h)
                .sum()
        };
        let e0 = energy(&controller);
        controller.run_to_completion().unwrap();
        let delivered = 100.0e3 * 0.7 * 5.0;
        let gained = energy(&controller) - e0;
        assert_relative_eq!(gained, delivered, max_relative = 1e-3);
        let last = controller.history().last().unwrap();
        assert_relative_eq!(last.energy_input, delivered, max_relative = 1e-9);
        assert_relative_eq!(last.total_energy - e0, gained, max_relative = 1e-9);
        assert!(last.max_temperature > 25.0);
    }

    #[test]
    fn radiating_wall_loss_matches_the_stored_energy_drop() {
        let params = SimulationParameters {
            furnace_radius: 0.2,
            furnace_height: 0.4,
            mesh_radial_cells: 6,
            mesh_axial_cells: 6,
            simulation_time_step: 1.0,
            simulation_duration: 20.0,
            convergence_tolerance: 1e-10,
            max_iterations: 20_000,
            initial_temperature: 1500.0,
            enable_convection: false,
            enable_radiation: true,
            boundary: BoundarySettings {
                wall: WallCondition::Robin,
                bottom: EndCondition::Adiabatic,
                top: EndCondition::Adiabatic,
            },
            torches: vec![],
            ..Default::default()
        };
        let mut controller = SimulationController::with_parameters(params).unwrap();
        let mesh = controller.mesh().unwrap().clone();
        let volumes = mesh.volumes();
        let rho = MaterialProperties::default().density;
        let stored = |c: &SimulationController| -> f64 {
            let field = c.field().unwrap();
            volumes.iter().zip(field.enthalpy.iter()).map(|(v, h)| rho * v * h).sum()
        };
        let before = stored(&controller);
        assert_eq!(controller.run_to_completion().unwrap(), SimulationState::Completed);
        let last = controller.history().last().unwrap();
        let lost = stored(&controller) - before;
        assert!(lost < 0.0);
        assert_relative_eq!(last.energy_input, lost, max_relative = 1e-9);
        assert_relative_eq!(last.total_energy - before, lost, max_relative = 1e-9);
    }

    #[test]
    fn enthalpy_table_fallbacks_are_not_reported_as_step_fallbacks() {
        // log(T) is undefined below 0 °C, which the enthalpy table spans
        let law = FormulaLaw::new("base * (1 + 0 * log(T))", BTreeMap::new()).unwrap();
        let mut params = quench(5, 0.1, 0.5, 1.0, 25.0);
        params.material.specific_heat_law = PropertyLaw::Formula(law);
        let mut controller = SimulationController::with_parameters(params).unwrap();
        controller.run_to_completion().unwrap();
        for diag in controller.history() {
            assert_eq!(diag.property_fallbacks, 0);
            assert!(diag.warnings.is_empty(), "{:?}", diag.warnings);
        }
    }

    #[test]
    fn torch_outside_furnace_is_rejected_before_any_step() {
        let mut params = small_furnace();
        params.torches[0].r_position = params.furnace_radius + 0.05;
        let mut controller = SimulationController::new();
        let err = controller.configure(params).unwrap_err();
        assert_eq!(err.code(), Some("E001"));
        assert_eq!(controller.state(), SimulationState::NotStarted);
        assert!(controller.field().is_none());
        assert!(controller.history().is_empty());
        assert!(matches!(controller.start(), Err(FurnaceError::InvalidTransition { .. })));
    }

    #[test]
    fn pause_and_resume_do_not_change_the_trajectory() {
        let k = 3;
        let mut interrupted = SimulationController::with_parameters(small_furnace()).unwrap();
        interrupted.start().unwrap();
        for _ in 0..k {
            interrupted.step().unwrap();
        }
        interrupted.pause().unwrap();
        assert_eq!(interrupted.state(), SimulationState::Paused);
        assert!(matches!(interrupted.step(), Err(FurnaceError::InvalidTransition { .. })));
        interrupted.resume().unwrap();
        interrupted.step().unwrap();

        let mut straight = SimulationController::with_parameters(small_furnace()).unwrap();
        straight.start().unwrap();
        for _ in 0..=k {
            straight.step().unwrap();
        }
        assert_eq!(interrupted.step_index(), k + 1);
        assert_eq!(interrupted.field(), straight.field());
        assert_eq!(interrupted.history(), straight.history());
    }

    #[test]
    fn state_machine_rejects_invalid_transitions() {
        let mut controller = SimulationController::new();
        assert!(controller.start().is_err());

        let params = small_furnace();
        controller.configure(params.clone()).unwrap();
        controller.configure(params.clone()).unwrap();
        assert_eq!(controller.state(), SimulationState::NotStarted);
        assert!(controller.pause().is_err());
        assert!(controller.resume().is_err());
        assert!(controller.step().is_err());

        controller.start().unwrap();
        assert!(controller.start().is_err());
        assert!(controller.configure(params.clone()).is_err());
        assert!(controller.reset().is_err());
        controller.pause().unwrap();
        assert!(controller.configure(params.clone()).is_err());
        controller.reset().unwrap();
        assert_eq!(controller.state(), SimulationState::NotStarted);
        assert_eq!(controller.step_index(), 0);

        assert_eq!(controller.run_to_completion().unwrap(), SimulationState::Completed);
        assert_eq!(controller.step_index(), 10);
        assert_eq!(controller.history().len(), 10);
        assert!(controller.step().is_err());
        assert!(controller.pause().is_err());
        assert_eq!(controller.run_to_completion().unwrap(), SimulationState::Completed);

        let mut longer = params;
        longer.simulation_duration = 10.0;
        controller.configure(longer).unwrap();
        assert_eq!(controller.state(), SimulationState::NotStarted);
        assert!(controller.history().is_empty());
    }

    #[test]
    fn last_step_is_shortened_to_the_duration() {
        let mut params = small_furnace();
        params.simulation_time_step = 0.4;
        params.simulation_duration = 1.0;
        let mut controller = SimulationController::with_parameters(params).unwrap();
        controller.run_to_completion().unwrap();
        let history = controller.history();
        assert_eq!(history.len(), 3);
        assert_relative_eq!(history[2].dt, 0.2, epsilon = 1e-12);
        assert_relative_eq!(history[2].time, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn unconverged_solve_fails_and_keeps_the_last_valid_field() {
        let mut params = small_furnace();
        params.max_iterations = 1;
        params.convergence_tolerance = 1e-12;
        let mut controller = SimulationController::with_parameters(params).unwrap();
        controller.start().unwrap();
        let initial = controller.field().unwrap().clone();
        let err = controller.step().unwrap_err();
        assert_eq!(err.code(), Some("E004"));
        assert_eq!(controller.state(), SimulationState::Failed);
        let failure = controller.failure().unwrap();
        assert_eq!(failure.code, Some("E004"));
        assert_eq!(failure.step, 1);
        assert!(!failure.message.is_empty());
        assert_eq!(controller.field(), Some(&initial));
        assert_eq!(controller.step_index(), 0);
        assert!(controller.history().is_empty());
        assert!(controller.step().is_err());
        assert_eq!(controller.snapshot().unwrap().state, SimulationState::Failed);
    }

    #[test]
    fn cancel_discards_the_step_in_flight() {
        let mut controller = SimulationController::with_parameters(small_furnace()).unwrap();
        controller.start().unwrap();
        controller.step().unwrap();
        let committed = controller.field().unwrap().clone();

        let handle = controller.control();
        handle.request_cancel();
        assert_eq!(controller.step().unwrap(), StepStatus::Cancelled);
        assert_eq!(controller.state(), SimulationState::Paused);
        assert_eq!(controller.step_index(), 1);
        assert_eq!(controller.field(), Some(&committed));
        assert!(!handle.cancel_requested());

        controller.resume().unwrap();
        assert_eq!(controller.step().unwrap(), StepStatus::Advanced);
        assert_eq!(controller.step_index(), 2);
    }

    #[test]
    fn pause_request_is_honoured_at_a_step_boundary() {
        let mut controller = SimulationController::with_parameters(small_furnace()).unwrap();
        controller.start().unwrap();
        controller.control().request_pause();
        assert_eq!(controller.run_to_completion().unwrap(), SimulationState::Paused);
        assert_eq!(controller.step_index(), 0);
        assert!(!controller.control().pause_requested());
        assert_eq!(controller.run_to_completion().unwrap(), SimulationState::Completed);
        assert_eq!(controller.step_index(), 10);
    }

    #[test]
    fn hot_hearth_melts_the_charge() {
        let params = SimulationParameters {
            furnace_radius: 0.05,
            furnace_height: 0.1,
            mesh_radial_cells: 6,
            mesh_axial_cells: 21,
            simulation_time_step: 1.0,
            simulation_duration: 60.0,
            enable_convection: false,
            enable_radiation: false,
            boundary: BoundarySettings {
                wall: WallCondition::Robin,
                bottom: EndCondition::FixedTemperature { temperature: 1200.0 },
                top: EndCondition::Adiabatic,
            },
            torches: vec![],
            material: MaterialProperties {
                thermal_conductivity: 20.0,
                melting_point: Some(600.0),
                latent_heat_fusion: Some(2.0e5),
                phase_change_interval: 20.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut controller = SimulationController::with_parameters(params).unwrap();
        controller.run_to_completion().unwrap();
        let mesh = controller.mesh().unwrap().clone();
        let field = controller.field().unwrap();
        assert_eq!(field.phase_fraction[mesh.idx(2, 0)], 1.0);
        assert!(field.phase_fraction[mesh.idx(2, 1)] > 0.0);
        assert_eq!(field.phase_fraction[mesh.idx(2, mesh.nz - 1)], 0.0);
        let last = controller.history().last().unwrap();
        assert!(last.melt_volume_fraction > 0.0 && last.melt_volume_fraction < 1.0);
        assert!(last.zone_counts[3] >= mesh.nr);
        assert_eq!(last.zone_counts.iter().sum::<usize>(), mesh.len());
        // heat enters only through the hearth, so T never exceeds it
        assert!(last.max_temperature <= 1200.0 + 1e-6);
    }

    #[test]
    fn snapshot_is_versioned_json() {
        let mut controller = SimulationController::with_parameters(small_furnace()).unwrap();
        let before = controller.snapshot().unwrap();
        assert_eq!(before.state, SimulationState::NotStarted);
        assert!(before.diagnostics.is_none());

        controller.start().unwrap();
        controller.step().unwrap();
        controller.step().unwrap();
        let json = controller.snapshot().unwrap().to_json().unwrap();
        assert!(json.contains("\"schemaVersion\":1"));
        let parsed = ResultSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed.schema_version, SCHEMA_VERSION);
        assert_eq!(parsed.step, 2);
        assert_eq!(parsed.state, SimulationState::Running);
        assert_eq!(parsed.temperature.len(), 9 * 13);
        let diag = parsed.diagnostics.unwrap();
        assert_eq!(diag.step, 2);
        assert!(diag.max_temperature >= diag.avg_temperature);
        assert!(diag.avg_temperature >= diag.min_temperature);
    }
}
