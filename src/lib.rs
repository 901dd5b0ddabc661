#[allow(non_snake_case)]
pub mod Examples;
#[allow(non_snake_case)]
pub mod HeatTransfer;
#[allow(non_snake_case)]
pub mod Simulation;
#[allow(non_snake_case)]
pub mod Utils;
pub mod cli;
pub mod errors;
