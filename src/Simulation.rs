//! # Furnace run management
//!
//! | Module | Role |
//! |--------|------|
//! | `parameters` | JSON parameter record, defaults, validation |
//! | `state` | lifecycle states and the per-node field |
//! | `controller` | state machine and the time-step pipeline |
//! | `diagnostics` | per-step scalar diagnostics |
//! | `snapshot` | versioned result record for consumers |
//!
//! ## Example
//! ```no_run
//! use PlasmaFurnace::Simulation::controller::SimulationController;
//! use PlasmaFurnace::Simulation::parameters::SimulationParameters;
//!
//! let params = SimulationParameters::from_file("furnace.json").unwrap();
//! let mut controller = SimulationController::with_parameters(params).unwrap();
//! let state = controller.run_to_completion().unwrap();
//! println!("{} after {} steps", state, controller.step_index());
//! ```
pub mod controller;
pub mod diagnostics;
pub mod parameters;
pub mod snapshot;
pub mod state;

mod simulation_tests;
