use PlasmaFurnace::Utils::logger::{init_logger, parse_level};
use PlasmaFurnace::cli::cli_main::{print_error, run_file, run_interactive_menu};
use std::env;
use std::process::ExitCode;

/// `PlasmaFurnace [parameters.json]`; the log level comes from `FURNACE_LOG`.
pub fn main() -> ExitCode {
    let level = env::var("FURNACE_LOG").unwrap_or_else(|_| "info".to_string());
    init_logger(parse_level(&level));

    match env::args().nth(1) {
        Some(path) => match run_file(&path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                print_error(&e);
                ExitCode::FAILURE
            }
        },
        None => {
            run_interactive_menu();
            ExitCode::SUCCESS
        }
    }
}
