use super::{Config, Configuration};
use crate::core::baseline::is_same_path_suffix;
use crate::core::catalog::IssueCatalog;
use crate::models::{Issue, Severity};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Severity override for one file; `issue` may be `all`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FileOverride {
    pub path: String,
    #[serde(default = "default_issue")]
    pub issue: String,
    pub severity: Severity,
}

fn default_issue() -> String {
    "all".to_string()
}

/// Resolves severities from a loaded [`Config`]:
/// file override, then issue, then category and its parents, then the catalog default.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfiguration {
    severity: BTreeMap<String, Severity>,
    category_severity: BTreeMap<String, Severity>,
    disable: Vec<String>,
    enable: Vec<String>,
    options: BTreeMap<String, BTreeMap<String, String>>,
    file_overrides: Vec<FileOverride>,
    check_comments: bool,
}

impl ProjectConfiguration {
    pub fn new(config: &Config) -> Self {
        Self {
            severity: config.severity.clone(),
            category_severity: config.category_severity.clone(),
            disable: config.disable.clone(),
            enable: config.enable.clone(),
            options: config.options.clone(),
            file_overrides: config.file_override.clone(),
            check_comments: config.check_comments,
        }
    }

    fn lists(list: &[String], name: &str) -> bool {
        list.iter().any(|entry| entry.eq_ignore_ascii_case(name))
    }

    /// `all` never reaches the engine's own diagnostics; they must be named.
    fn matches_wildcard(issue: &Issue, entry: &str) -> bool {
        entry.eq_ignore_ascii_case("all") && !IssueCatalog::is_internal(issue)
    }

    fn file_severity(&self, issue: &Issue, file: &Path) -> Option<Severity> {
        let file = file.to_string_lossy();
        self.file_overrides
            .iter()
            .find(|o| {
                (Self::matches_wildcard(issue, &o.issue)
                    || o.issue.eq_ignore_ascii_case(&issue.id))
                    && is_same_path_suffix(&file, &o.path)
            })
            .map(|o| o.severity)
    }

    fn issue_severity(&self, issue: &Issue) -> Option<Severity> {
        if let Some(severity) = self
            .severity
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(&issue.id))
            .map(|(_, s)| *s)
        {
            return Some(severity);
        }
        if Self::lists(&self.disable, &issue.id) {
            return Some(Severity::Ignore);
        }
        if Self::lists(&self.enable, &issue.id) {
            return Some(issue.default_severity);
        }
        None
    }

    fn category_severity(&self, issue: &Issue) -> Option<Severity> {
        for category in issue.category.lineage() {
            let full_name = category.full_name();
            for name in [full_name.as_str(), category.name.as_str()] {
                if let Some(severity) = self.category_severity.get(name) {
                    return Some(*severity);
                }
                if Self::lists(&self.disable, name) {
                    return Some(Severity::Ignore);
                }
            }
        }
        None
    }

    fn configured_severity(&self, issue: &Issue) -> Severity {
        self.issue_severity(issue)
            .or_else(|| self.category_severity(issue))
            .or_else(|| {
                self.disable
                    .iter()
                    .any(|entry| Self::matches_wildcard(issue, entry))
                    .then_some(Severity::Ignore)
            })
            .unwrap_or(if issue.enabled_by_default {
                issue.default_severity
            } else {
                Severity::Ignore
            })
    }
}

impl Configuration for ProjectConfiguration {
    fn severity_of(&self, issue: &Issue, file: Option<&Path>) -> Severity {
        file.and_then(|f| self.file_severity(issue, f))
            .unwrap_or_else(|| self.configured_severity(issue))
    }

    /// An issue disabled globally still runs when some file turns it back on.
    fn is_enabled(&self, issue: &Issue) -> bool {
        self.configured_severity(issue) != Severity::Ignore
            || self.file_overrides.iter().any(|o| {
                o.severity != Severity::Ignore
                    && (Self::matches_wildcard(issue, &o.issue)
                        || o.issue.eq_ignore_ascii_case(&issue.id))
            })
    }

    fn option_value(&self, issue_id: &str, key: &str) -> Option<String> {
        self.options
            .get(issue_id)
            .and_then(|options| options.get(key))
            .cloned()
    }

    fn check_comment_suppressions(&self) -> bool {
        self.check_comments
    }
}
