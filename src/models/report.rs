use crate::models::finding::{Finding, FindingInstance, Incident};
use crate::models::issue::Issue;
use crate::models::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub fatal: usize,
    pub error: usize,
    pub warning: usize,
    pub informational: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub comment: String,
    pub footnote: String,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups incidents by issue id. `describe` supplies the catalog entry
    /// for each id; incidents of unknown issues keep their bare id.
    pub fn from_incidents<'a, F>(incidents: &[Incident], describe: F) -> Self
    where
        F: Fn(&str) -> Option<&'a Issue>,
    {
        let mut report = Self::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for incident in incidents {
            let index = *positions.entry(incident.issue_id.as_str()).or_insert_with(|| {
                let issue = describe(&incident.issue_id);
                report.findings.push(Finding {
                    issue_id: incident.issue_id.clone(),
                    severity: incident.severity,
                    title: issue.map_or_else(|| incident.issue_id.clone(), |i| i.brief.clone()),
                    description: issue.map(|i| i.explanation.clone()).unwrap_or_default(),
                    category: issue.map(|i| i.category.full_name()).unwrap_or_default(),
                    instances: Vec::new(),
                });
                report.findings.len() - 1
            });

            let finding = &mut report.findings[index];
            // A finding is as severe as its worst instance.
            if incident.severity < finding.severity {
                finding.severity = incident.severity;
            }
            finding.instances.push(FindingInstance {
                message: incident.message.clone(),
                location: incident.location.clone(),
            });
        }

        report.findings.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.issue_id.cmp(&b.issue_id))
        });
        report
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn with_footnote(mut self, footnote: &str) -> Self {
        self.footnote = footnote.to_string();
        self
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.to_string());
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();

        for finding in &self.findings {
            let count = finding.instances.len();
            match finding.severity {
                Severity::Fatal => summary.fatal += count,
                Severity::Error => summary.error += count,
                Severity::Warning => summary.warning += count,
                Severity::Informational => summary.informational += count,
                Severity::Ignore => continue,
            }
            summary.total += count;
        }

        summary
    }
}
