use crate::models::severity::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: Option<usize>,
    pub line_end: Option<usize>,
    pub column_end: Option<usize>,
    pub snippet: Option<String>,
    /// Additional location of a multi-location finding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Box<Location>>,
}

impl Location {
    pub fn new(file: &str, line: usize) -> Self {
        Self {
            file: file.to_string(),
            line,
            ..Default::default()
        }
    }

    pub fn with_secondary(mut self, secondary: Location) -> Self {
        self.secondary = Some(Box::new(secondary));
        self
    }

    /// The primary location followed by its secondary chain.
    pub fn chain(&self) -> impl Iterator<Item = &Location> {
        std::iter::successors(Some(self), |l| l.secondary.as_deref())
    }

    pub fn file_name(&self) -> &str {
        self.file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.file.as_str())
    }
}

/// A report that survived suppression, severity filtering and the baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    pub issue_id: String,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

/// Incidents of one issue, grouped for the human readable reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub issue_id: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub category: String,
    pub instances: Vec<FindingInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingInstance {
    pub message: String,
    pub location: Location,
}
