//! Helpers shared by the engine, the examples and the binary.
//!
//! | Module | Role |
//! |--------|------|
//! | `formula` | user expressions for k(T) and c_p(T) |
//! | `analytical` | Carslaw–Jaeger reference solution and error norms |
//! | `logger` | terminal logger setup for the binary |
pub mod analytical;
pub mod formula;
pub mod logger;
