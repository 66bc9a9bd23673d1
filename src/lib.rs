pub mod cli;
pub mod config;
pub mod core;
pub mod detectors;
pub mod frontend;
pub mod models;
pub mod output;
pub mod utils;
