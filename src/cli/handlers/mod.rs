// src/cli/handlers/mod.rs

// One module per CLI command, plus shared wiring.

pub mod commons;
pub mod profiles;
pub mod travel;
pub mod xargs;
