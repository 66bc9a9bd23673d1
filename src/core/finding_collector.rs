use crate::models::{Incident, Severity};
use std::collections::HashMap;

/// Receives every incident that survived suppression, severity and baseline
/// filtering.
pub trait ReportSink {
    fn report(&mut self, incident: Incident);

    /// Terminal notification that the run was canceled.
    fn canceled(&mut self) {}
}

impl ReportSink for Vec<Incident> {
    fn report(&mut self, incident: Incident) {
        self.push(incident);
    }
}

#[derive(Debug, Default)]
pub struct FindingCollector {
    incidents: Vec<Incident>,
    by_issue: HashMap<String, usize>,
    canceled: bool,
}

impl FindingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn into_incidents(self) -> Vec<Incident> {
        self.incidents
    }

    /// Get incident count for a specific issue
    pub fn count_for(&self, issue_id: &str) -> usize {
        self.by_issue.get(issue_id).copied().unwrap_or(0)
    }

    /// Get all issue ids with incidents
    pub fn issue_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_issue.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn error_count(&self) -> usize {
        self.incidents
            .iter()
            .filter(|i| i.severity.is_error())
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.incidents
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn total(&self) -> usize {
        self.incidents.len()
    }

    pub fn was_canceled(&self) -> bool {
        self.canceled
    }
}

impl ReportSink for FindingCollector {
    fn report(&mut self, incident: Incident) {
        *self.by_issue.entry(incident.issue_id.clone()).or_insert(0) += 1;
        self.incidents.push(incident);
    }

    fn canceled(&mut self) {
        self.canceled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    fn incident(id: &str, severity: Severity) -> Incident {
        Incident {
            issue_id: id.to_string(),
            severity,
            location: Location::new("A.sol", 1),
            message: String::new(),
        }
    }

    #[test]
    fn test_counts_by_issue_and_severity() {
        let mut collector = FindingCollector::new();
        collector.report(incident("B", Severity::Warning));
        collector.report(incident("A", Severity::Fatal));
        collector.report(incident("A", Severity::Error));
        collector.report(incident("C", Severity::Informational));

        assert_eq!(collector.total(), 4);
        assert_eq!(collector.count_for("A"), 2);
        assert_eq!(collector.count_for("missing"), 0);
        assert_eq!(collector.issue_ids(), vec!["A", "B", "C"]);
        assert_eq!(collector.error_count(), 2);
        assert_eq!(collector.warning_count(), 1);
        assert!(!collector.was_canceled());

        collector.canceled();
        assert!(collector.was_canceled());
    }
}
