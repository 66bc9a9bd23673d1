use crate::models::{Category, Implementation, Issue, ScopeSet, Severity};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Detector key of the engine's own diagnostics; no factory is ever registered for it.
pub const INTERNAL_DETECTOR: &str = "";

pub const LINT_ERROR: &str = "LintError";
pub const PARSER_ERROR: &str = "ParserError";
pub const BASELINE: &str = "Baseline";
pub const PLUGIN_ERROR: &str = "PluginError";

/// The categories shipped with the engine.
#[derive(Debug, Clone)]
pub struct Categories {
    pub lint: Arc<Category>,
    pub correctness: Arc<Category>,
    pub security: Arc<Category>,
    pub access_control: Arc<Category>,
    pub performance: Arc<Category>,
}

impl Categories {
    pub fn standard() -> Self {
        let security = Category::new("Security", 9);
        Self {
            lint: Category::new("Lint", 10),
            correctness: Category::new("Correctness", 8),
            access_control: Category::child(&security, "AccessControl", 9),
            security,
            performance: Category::new("Performance", 5),
        }
    }
}

fn internal_issues(categories: &Categories) -> Vec<Issue> {
    let internal = || Implementation::new(INTERNAL_DETECTOR, ScopeSet::EMPTY);
    vec![
        Issue::new(
            LINT_ERROR,
            "Analysis failure",
            "A detector failed while analyzing a file. The results for that file are \
             incomplete; the failure is most likely a bug in the detector.",
            &categories.lint,
            10,
            Severity::Error,
            internal(),
        ),
        Issue::new(
            PARSER_ERROR,
            "Unparsable file",
            "The file could not be parsed, so no detector ran on it.",
            &categories.lint,
            10,
            Severity::Error,
            internal(),
        ),
        Issue::new(
            BASELINE,
            "Baseline applied",
            "Issues listed in the baseline file are filtered out of the report. This \
             diagnostic summarizes what the baseline matched, and which of its entries \
             no longer occur.",
            &categories.lint,
            10,
            Severity::Informational,
            internal(),
        ),
        Issue::new(
            PLUGIN_ERROR,
            "Rejected detector plugin",
            "A detector plugin was built against an incompatible engine API or refers to \
             engine symbols that do not exist. Its detectors were not registered.",
            &categories.lint,
            10,
            Severity::Warning,
            internal(),
        ),
    ]
}

/// Every issue the engine knows about, built once per run.
#[derive(Debug, Default)]
pub struct IssueCatalog {
    issues: Vec<Issue>,
    by_id: HashMap<String, usize>,
}

impl IssueCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    pub fn get(&self, id: &str) -> Option<&Issue> {
        self.by_id.get(id).map(|index| &self.issues[*index])
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn issues_for_detector<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Issue> {
        self.issues.iter().filter(move |i| i.detector_key() == key)
    }

    /// Distinct categories in display order.
    pub fn categories(&self) -> Vec<Arc<Category>> {
        let mut categories: Vec<Arc<Category>> = Vec::new();
        for issue in &self.issues {
            if !categories
                .iter()
                .any(|c| c.full_name() == issue.category.full_name())
            {
                categories.push(Arc::clone(&issue.category));
            }
        }
        categories.sort();
        categories
    }

    pub fn is_internal(issue: &Issue) -> bool {
        issue.detector_key() == INTERNAL_DETECTOR
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

pub struct CatalogBuilder {
    issues: Vec<Issue>,
}

impl CatalogBuilder {
    /// Starts with the engine's internal diagnostics.
    pub fn new() -> Self {
        Self {
            issues: internal_issues(&Categories::standard()),
        }
    }

    pub fn add(&mut self, issue: Issue) -> &mut Self {
        self.issues.push(issue);
        self
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) -> &mut Self {
        self.issues.extend(issues);
        self
    }

    pub fn build(self) -> IssueCatalog {
        let mut catalog = IssueCatalog::default();
        for issue in self.issues {
            if catalog.by_id.contains_key(&issue.id) {
                warn!(issue = %issue.id, "Duplicate issue id; keeping the first definition");
                continue;
            }
            catalog.by_id.insert(issue.id.clone(), catalog.issues.len());
            catalog.issues.push(issue);
        }
        catalog
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
