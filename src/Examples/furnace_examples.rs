use crate::HeatTransfer::boundary::{BoundarySettings, EndCondition, WallCondition};
use crate::HeatTransfer::material::{FormulaLaw, MaterialProperties, PolynomialLaw, PropertyLaw};
use crate::HeatTransfer::sor_solver::SweepOrder;
use crate::HeatTransfer::torch::PlasmaTorch;
use crate::Simulation::controller::SimulationController;
use crate::Simulation::diagnostics::pretty_print_history;
use crate::Simulation::parameters::SimulationParameters;
use crate::Utils::analytical::{CylinderQuench, relative_l2_error};
use crate::errors::FurnaceResult;
use log::info;
use std::collections::BTreeMap;

/// Waste charge heated by one torch on the axis, looking down.
pub fn single_torch() -> SimulationParameters {
    SimulationParameters {
        furnace_radius: 0.5,
        furnace_height: 1.5,
        mesh_radial_cells: 21,
        mesh_axial_cells: 41,
        simulation_time_step: 1.0,
        simulation_duration: 120.0,
        torches: vec![PlasmaTorch {
            r_position: 0.0,
            z_position: 1.4,
            pitch: 90.0,
            power: 150.0,
            efficiency: 0.7,
            gas_temperature: 6000.0,
            spread: 0.1,
            ..Default::default()
        }],
        material: MaterialProperties {
            density: 1200.0,
            specific_heat: 1400.0,
            thermal_conductivity: 0.4,
            emissivity: 0.9,
            moisture_content: 0.2,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Two inclined torches over a slag-forming charge with temperature-dependent properties.
pub fn twin_torches_with_melting() -> FurnaceResult<SimulationParameters> {
    let torch = |r: f64, yaw: f64| PlasmaTorch {
        r_position: r,
        z_position: 0.9,
        pitch: 45.0,
        yaw,
        power: 250.0,
        efficiency: 0.75,
        gas_temperature: 8000.0,
        spread: 0.06,
        ..Default::default()
    };
    let mut vars = BTreeMap::new();
    vars.insert("a".to_string(), 4.0e-4);
    Ok(SimulationParameters {
        furnace_radius: 0.4,
        furnace_height: 1.0,
        mesh_radial_cells: 17,
        mesh_axial_cells: 41,
        simulation_time_step: 0.5,
        simulation_duration: 60.0,
        sweep_order: SweepOrder::RedBlack,
        torches: vec![torch(0.3, 0.0), torch(0.1, 180.0)],
        boundary: BoundarySettings {
            wall: WallCondition::Robin,
            bottom: EndCondition::FixedTemperature { temperature: 300.0 },
            top: EndCondition::Adiabatic,
        },
        material: MaterialProperties {
            density: 2800.0,
            specific_heat: 900.0,
            thermal_conductivity: 2.0,
            melting_point: Some(1250.0),
            latent_heat_fusion: Some(4.0e5),
            moisture_content: 0.05,
            phase_change_interval: 15.0,
            conductivity_law: PropertyLaw::Polynomial(PolynomialLaw {
                coefficients: vec![5.0e-4],
            }),
            specific_heat_law: PropertyLaw::Formula(FormulaLaw::new(
                "base * (1 + a * min(T, 1500))",
                vars,
            )?),
            ..Default::default()
        },
        ..Default::default()
    })
}

/// Solid steel cylinder with a sudden 500 °C surface temperature.
pub fn cylinder_benchmark() -> SimulationParameters {
    SimulationParameters {
        furnace_radius: 0.1,
        furnace_height: 0.2,
        mesh_radial_cells: 50,
        mesh_axial_cells: 50,
        simulation_time_step: 0.1,
        simulation_duration: 60.0,
        initial_temperature: 25.0,
        enable_convection: false,
        enable_radiation: false,
        boundary: BoundarySettings {
            wall: WallCondition::FixedTemperature { temperature: 500.0 },
            bottom: EndCondition::Adiabatic,
            top: EndCondition::Adiabatic,
        },
        torches: vec![],
        material: MaterialProperties {
            density: 7800.0,
            specific_heat: 500.0,
            thermal_conductivity: 50.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Runs a parameter set to the end and prints the diagnostics.
pub fn run_and_report(
    params: SimulationParameters,
    stride: usize,
) -> FurnaceResult<SimulationController> {
    params.pretty_print();
    let mut controller = SimulationController::with_parameters(params)?;
    let state = controller.run_to_completion()?;
    info!("run finished in state {}", state);
    pretty_print_history(controller.history(), stride);
    Ok(controller)
}

/// Runs the cylinder benchmark and compares it with the series solution; returns the
/// relative L2 error of the mid-height radial profile.
pub fn benchmark_report() -> FurnaceResult<f64> {
    use prettytable::{Table, row};
    let params = cylinder_benchmark();
    let m = &params.material;
    let reference = CylinderQuench::new(
        params.furnace_radius,
        m.thermal_conductivity / (m.density * m.specific_heat),
        params.initial_temperature,
        500.0,
        60,
    );
    let (duration, baseline) = (params.simulation_duration, params.initial_temperature);
    let controller = run_and_report(params, 100)?;
    let (Some(mesh), Some(field)) = (controller.mesh(), controller.field()) else {
        return Ok(f64::NAN);
    };
    let j = mesh.nz / 2;
    let computed: Vec<f64> = (0..mesh.nr).map(|i| field.temperature[mesh.idx(i, j)]).collect();
    let exact: Vec<f64> = (0..mesh.nr)
        .map(|i| reference.temperature(mesh.r(i), duration))
        .collect();

    let mut table = Table::new();
    table.add_row(row!["r, m", "T computed, °C", "T series, °C"]);
    for i in (0..mesh.nr).step_by(7).chain(std::iter::once(mesh.nr - 1)) {
        table.add_row(row![
            format!("{:.4}", mesh.r(i)),
            format!("{:.3}", computed[i]),
            format!("{:.3}", exact[i])
        ]);
    }
    table.printstd();
    let error = relative_l2_error(&computed, &exact, baseline);
    println!("relative L2 error: {:.4}", error);
    Ok(error)
}

pub fn furnace_examples(task: usize) -> FurnaceResult<()> {
    match task {
        0 => {
            // one torch, moist charge, Robin wall
            run_and_report(single_torch(), 20)?;
        }
        1 => {
            // twin inclined torches, melting slag, red-black SOR
            let controller = run_and_report(twin_torches_with_melting()?, 20)?;
            if let Some(snapshot) = controller.snapshot() {
                println!("final snapshot: {} bytes of JSON", snapshot.to_json()?.len());
            }
        }
        2 => {
            benchmark_report()?;
        }
        _ => println!("no example with number {}", task),
    }
    Ok(())
}
