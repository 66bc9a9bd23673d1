use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Error,
    #[default]
    Warning,
    #[serde(alias = "info")]
    Informational,
    Ignore,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "Fatal"),
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Informational => write!(f, "Information"),
            Severity::Ignore => write!(f, "Ignore"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fatal" => Ok(Severity::Fatal),
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" | "information" | "informational" => Ok(Severity::Informational),
            "ignore" => Ok(Severity::Ignore),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

impl Severity {
    pub fn as_value(&self) -> u8 {
        match self {
            Severity::Fatal => 4,
            Severity::Error => 3,
            Severity::Warning => 2,
            Severity::Informational => 1,
            Severity::Ignore => 0,
        }
    }

    /// Fatal and Error both count as errors for summaries and baselines.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Fatal | Severity::Error)
    }
}
