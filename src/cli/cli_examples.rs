use super::cli_main::{get_user_input, report};
use crate::Examples::furnace_examples::furnace_examples;
use std::io::{self, Write};

pub fn examples_menu() {
    loop {
        println!("\n=== Examples ===");
        println!("1. Single axial torch, moist charge");
        println!("2. Twin inclined torches, melting slag");
        println!("3. Cylinder quench benchmark");
        println!("0. Back to main menu");
        print!("Enter your choice: ");
        let _ = io::stdout().flush();

        let choice = get_user_input();
        match choice.trim() {
            "1" => report(furnace_examples(0)),
            "2" => report(furnace_examples(1)),
            "3" => report(furnace_examples(2)),
            "0" => break,
            _ => println!("Invalid choice. Please try again."),
        }
    }
}
