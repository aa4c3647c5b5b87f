// swimmer_sim/src/lib.rs

// This prelude is for convenience for other files WITHIN the swimmer_sim crate.
pub mod prelude;

// Command line, configuration and the run driver.
pub mod cli;
pub mod config;
pub mod engine;
pub mod io;
pub mod logging;
