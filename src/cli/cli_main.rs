use super::cli_examples::examples_menu;
use crate::Examples::furnace_examples::{benchmark_report, run_and_report};
use crate::Simulation::parameters::SimulationParameters;
use crate::errors::{FurnaceError, FurnaceResult};
use log::error;
use std::io::{self, Write};
use std::path::Path;

pub fn run_interactive_menu() {
    loop {
        show_main_menu();
        let choice = get_user_input();

        match choice.trim() {
            "1" => {
                let path = ask("Path to the JSON parameter file: ");
                report(run_file(path.trim()));
            }
            "2" => examples_menu(),
            "3" => report(benchmark_report().map(|_| ())),
            "4" => {
                let path = ask("Where to write the template [furnace.json]: ");
                let path = match path.trim() {
                    "" => "furnace.json",
                    p => p,
                };
                report(write_template(path));
            }
            "0" => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please try again."),
        }
    }
}
/* colors
Blue (\x1b[34m) - Welcome header text

Yellow (\x1b[33m) - Menu options

Cyan (\x1b[36m) - prompts

Red (\x1b[31m) - errors
*/
fn show_main_menu() {
    println!(
        "\x1b[34m\n Plasma furnace: axisymmetric heat transfer with phase change\n
    under plasma torch heating \n \x1b[0m"
    );
    println!("\x1b[33m1. Run a parameter file\x1b[0m");
    println!("\x1b[33m2. Examples\x1b[0m");
    println!("\x1b[33m3. Analytical benchmark\x1b[0m");
    println!("\x1b[33m4. Write a parameter template\x1b[0m");
    println!("\x1b[33m0. Exit\x1b[0m");
    print!("\x1b[36mEnter your choice: \x1b[0m");
    let _ = io::stdout().flush();
}

fn ask(prompt: &str) -> String {
    print!("\x1b[36m{}\x1b[0m", prompt);
    let _ = io::stdout().flush();
    get_user_input()
}

/// one line from stdin; empty on read errors
pub fn get_user_input() -> String {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_line(&mut input) {
        error!("failed to read input: {}", e);
    }
    input
}

/// Prints a failed action with its engine code, if any.
pub fn report(result: FurnaceResult<()>) {
    if let Err(e) = result {
        print_error(&e);
    }
}

pub fn print_error(e: &FurnaceError) {
    match e.code() {
        Some(code) => println!("\x1b[31m[{}] {}\x1b[0m", code, e),
        None => println!("\x1b[31m{}\x1b[0m", e),
    }
}

/// Loads, runs and reports one parameter file.
pub fn run_file(path: impl AsRef<Path>) -> FurnaceResult<()> {
    let params = SimulationParameters::from_file(path)?;
    let stride = (params.step_count() / 20).max(1);
    run_and_report(params, stride)?;
    Ok(())
}

/// Writes the default parameter set as a starting point for a new case.
pub fn write_template(path: impl AsRef<Path>) -> FurnaceResult<()> {
    let path = path.as_ref();
    SimulationParameters::default().save(path)?;
    println!("template written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn template_is_a_valid_parameter_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("furnace.json");
        write_template(&path).unwrap();
        let params = SimulationParameters::from_file(&path).unwrap();
        params.validate().unwrap();
        assert_eq!(params, SimulationParameters::default());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = run_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, FurnaceError::Io(_)));
        assert_eq!(err.code(), None);
    }
}
