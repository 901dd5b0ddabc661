//! Ready-made furnace runs, callable from the CLI menu.
pub mod furnace_examples;
