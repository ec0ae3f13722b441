// Expose the modules to the rest of the crate and to the binaries.
pub mod adapters;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
