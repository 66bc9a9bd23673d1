pub mod analyze;
pub mod detectors;
pub mod init;

use crate::config::ConfigError;
use crate::core::error::EngineError;
use crate::frontend::ProjectError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error("analysis failed: {0}")]
    Engine(#[from] EngineError),
    #[error("error generating report: {0}")]
    Output(#[from] std::io::Error),
    #[error("{0}")]
    InvalidArgument(String),
}
