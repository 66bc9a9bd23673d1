use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Returned by detector callbacks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectorError {
    /// The run was canceled; never reported as a crash.
    #[error("analysis canceled")]
    Canceled,
    #[error("{0}")]
    Failed(String),
}

impl DetectorError {
    pub fn failed(message: impl fmt::Display) -> Self {
        DetectorError::Failed(message.to_string())
    }
}

pub type DetectorResult = Result<(), DetectorError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("analysis canceled")]
    Canceled,
    #[error("no projects to analyze")]
    NoProjects,
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
