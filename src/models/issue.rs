use crate::models::scope::ScopeSet;
use crate::models::severity::Severity;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Groups related issues. Categories nest one level or more through `parent`.
#[derive(Debug, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub parent: Option<Arc<Category>>,
    pub priority: u8,
}

impl Category {
    pub fn new(name: &str, priority: u8) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            parent: None,
            priority,
        })
    }

    pub fn child(parent: &Arc<Category>, name: &str, priority: u8) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            parent: Some(Arc::clone(parent)),
            priority,
        })
    }

    /// `Parent:Child` for nested categories, the plain name otherwise.
    pub fn full_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}:{}", parent.full_name(), self.name),
            None => self.name.clone(),
        }
    }

    /// This category followed by its parents, innermost first.
    pub fn lineage(&self) -> impl Iterator<Item = &Category> {
        std::iter::successors(Some(self), |c| c.parent.as_deref())
    }
}

impl Ord for Category {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.full_name().cmp(&other.full_name()))
    }
}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Which detector reports an issue, and what it needs to see to do so.
#[derive(Debug, Clone)]
pub struct Implementation {
    pub detector: String,
    pub scope: ScopeSet,
    pub analysis_scopes: Vec<ScopeSet>,
}

impl Implementation {
    pub fn new(detector: &str, scope: ScopeSet) -> Self {
        Self {
            detector: detector.to_string(),
            scope,
            analysis_scopes: Vec::new(),
        }
    }

    pub fn with_analysis_scope(mut self, scope: ScopeSet) -> Self {
        self.analysis_scopes.push(scope);
        self
    }

    /// An issue can run when the run covers one of its analysis scopes or its full scope.
    pub fn is_adequate(&self, run_scope: ScopeSet) -> bool {
        self.analysis_scopes
            .iter()
            .any(|scope| run_scope.contains_all(*scope))
            || run_scope.contains_all(self.scope)
    }
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub id: String,
    pub brief: String,
    pub explanation: String,
    pub category: Arc<Category>,
    pub priority: u8,
    pub default_severity: Severity,
    pub implementation: Implementation,
    pub enabled_by_default: bool,
}

impl Issue {
    pub fn new(
        id: &str,
        brief: &str,
        explanation: &str,
        category: &Arc<Category>,
        priority: u8,
        default_severity: Severity,
        implementation: Implementation,
    ) -> Self {
        Self {
            id: id.to_string(),
            brief: brief.to_string(),
            explanation: explanation.to_string(),
            category: Arc::clone(category),
            priority: priority.clamp(1, 10),
            default_severity,
            implementation,
            enabled_by_default: true,
        }
    }

    pub fn disabled_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    pub fn detector_key(&self) -> &str {
        &self.implementation.detector
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id: {}\nSummary: {}\nCategory: {}\nPriority: {}/10\nSeverity: {}\nExplanation: {}",
            self.id,
            self.brief,
            self.category,
            self.priority,
            self.default_severity,
            self.explanation
        )
    }
}
