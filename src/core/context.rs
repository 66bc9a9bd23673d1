use crate::config::Configuration;
use crate::core::baseline::BaselineStore;
use crate::core::catalog::IssueCatalog;
use crate::core::dispatch::Slot;
use crate::core::finding_collector::ReportSink;
use crate::core::suppression::SuppressionResolver;
use crate::core::tree::{Declaration, NodeId, SyntaxTree, TreeProvider};
use crate::models::{Incident, Issue, Location, Scope, ScopeSet, Severity};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Source,
    TestSource,
    ClassFile,
    Library,
    ResourceFile,
    ResourceFolder,
    BinaryResource,
    Manifest,
    BuildFile,
    ProguardFile,
    PropertyFile,
    Other,
}

impl ArtifactKind {
    /// Scopes under which detectors get to see artifacts of this kind.
    pub fn scopes(self) -> ScopeSet {
        match self {
            ArtifactKind::Source => ScopeSet::of(&[Scope::SourceFile, Scope::AllSourceFiles]),
            ArtifactKind::TestSource => ScopeSet::single(Scope::TestSources),
            ArtifactKind::ClassFile => ScopeSet::of(&[Scope::ClassFile, Scope::AllClassFiles]),
            ArtifactKind::Library => ScopeSet::single(Scope::Libraries),
            ArtifactKind::ResourceFile => {
                ScopeSet::of(&[Scope::ResourceFile, Scope::AllResourceFiles])
            }
            ArtifactKind::ResourceFolder => ScopeSet::single(Scope::ResourceFolder),
            ArtifactKind::BinaryResource => ScopeSet::single(Scope::BinaryResource),
            ArtifactKind::Manifest => ScopeSet::single(Scope::Manifest),
            ArtifactKind::BuildFile => ScopeSet::single(Scope::BuildFile),
            ArtifactKind::ProguardFile => ScopeSet::single(Scope::ProguardFile),
            ArtifactKind::PropertyFile => ScopeSet::single(Scope::PropertyFile),
            ArtifactKind::Other => ScopeSet::single(Scope::Other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Project {
    pub name: String,
    pub dir: PathBuf,
    pub artifacts: Vec<Artifact>,
    pub is_library: bool,
}

impl Project {
    pub fn new(name: &str, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.into(),
            artifacts: Vec::new(),
            is_library: false,
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Path of an artifact as shown in reports: relative to the project when possible.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

/// Accumulated `request_repeat` calls of one phase.
#[derive(Debug, Clone, Default)]
pub struct RepeatRequests {
    slots: Vec<Slot>,
    scope: Option<ScopeSet>,
}

impl RepeatRequests {
    pub fn add(&mut self, slot: Slot, hint: Option<ScopeSet>) {
        if !self.slots.contains(&slot) {
            self.slots.push(slot);
        }
        let hint = hint.unwrap_or(ScopeSet::ALL);
        self.scope = Some(self.scope.map_or(hint, |scope| scope.union(hint)));
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn scope(&self) -> ScopeSet {
        self.scope.unwrap_or(ScopeSet::EMPTY)
    }
}

/// Run-wide reporting state: the tail of the report pipeline after suppression.
pub struct Reporter<'r> {
    catalog: &'r IssueCatalog,
    configuration: &'r dyn Configuration,
    sink: &'r mut dyn ReportSink,
    baseline: Option<&'r mut BaselineStore>,
    repeats: RepeatRequests,
    crashes: usize,
    delivered: usize,
}

impl<'r> Reporter<'r> {
    pub fn new(
        catalog: &'r IssueCatalog,
        configuration: &'r dyn Configuration,
        sink: &'r mut dyn ReportSink,
    ) -> Self {
        Self {
            catalog,
            configuration,
            sink,
            baseline: None,
            repeats: RepeatRequests::default(),
            crashes: 0,
            delivered: 0,
        }
    }

    pub fn with_baseline(mut self, baseline: Option<&'r mut BaselineStore>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn catalog(&self) -> &'r IssueCatalog {
        self.catalog
    }

    pub fn configuration(&self) -> &'r dyn Configuration {
        self.configuration
    }

    /// Resolves severity, consults the baseline and hands the incident to the
    /// sink. Returns whether the incident was delivered.
    pub fn report(&mut self, issue: &Issue, location: Location, message: String) -> bool {
        let severity = self
            .configuration
            .severity_of(issue, Some(Path::new(&location.file)));
        if severity == Severity::Ignore {
            return false;
        }

        if let Some(baseline) = self.baseline.as_deref_mut() {
            if baseline.find_and_mark(issue, &location, &message, severity) {
                debug!(issue = %issue.id, file = %location.file, "Matched baseline entry");
                return false;
            }
        }

        self.deliver(Incident {
            issue_id: issue.id.clone(),
            severity,
            location,
            message,
        });
        true
    }

    /// Reports one of the engine's own issues by id.
    pub fn report_internal(&mut self, issue_id: &str, location: Location, message: String) {
        let catalog = self.catalog;
        match catalog.get(issue_id) {
            Some(issue) => {
                self.report(issue, location, message);
            }
            None => warn!(issue_id, "Internal issue missing from catalog: {}", message),
        }
    }

    /// Bypasses the baseline; used for the baseline's own summary diagnostics.
    pub(crate) fn report_unfiltered(&mut self, issue_id: &str, location: Location, message: String) {
        let catalog = self.catalog;
        let Some(issue) = catalog.get(issue_id) else {
            warn!(issue_id, "Internal issue missing from catalog: {}", message);
            return;
        };
        let severity = self
            .configuration
            .severity_of(issue, Some(Path::new(&location.file)));
        if severity == Severity::Ignore {
            return;
        }
        self.deliver(Incident {
            issue_id: issue.id.clone(),
            severity,
            location,
            message,
        });
    }

    fn deliver(&mut self, incident: Incident) {
        self.delivered += 1;
        self.sink.report(incident);
    }

    pub(crate) fn request_repeat(&mut self, slot: Slot, hint: Option<ScopeSet>) {
        self.repeats.add(slot, hint);
    }

    pub(crate) fn take_repeats(&mut self) -> RepeatRequests {
        std::mem::take(&mut self.repeats)
    }

    /// Bumps the crash counter and returns the new count.
    pub(crate) fn record_crash(&mut self) -> usize {
        self.crashes += 1;
        self.crashes
    }

    pub(crate) fn baseline_mut(&mut self) -> Option<&mut BaselineStore> {
        self.baseline.as_deref_mut()
    }

    pub(crate) fn notify_canceled(&mut self) {
        self.sink.canceled();
    }

    pub fn crashes(&self) -> usize {
        self.crashes
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

/// What a detector sees while one artifact is being traversed.
pub struct FileContext<'a, 'r> {
    project: &'a Project,
    artifact: &'a Artifact,
    tree: &'a SyntaxTree,
    provider: &'a dyn TreeProvider,
    suppression: &'a SuppressionResolver,
    reporter: &'a mut Reporter<'r>,
    phase: usize,
    is_main_project: bool,
    pub(crate) slot: Slot,
}

impl<'a, 'r> FileContext<'a, 'r> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project: &'a Project,
        artifact: &'a Artifact,
        tree: &'a SyntaxTree,
        provider: &'a dyn TreeProvider,
        suppression: &'a SuppressionResolver,
        reporter: &'a mut Reporter<'r>,
        phase: usize,
        is_main_project: bool,
    ) -> Self {
        Self {
            project,
            artifact,
            tree,
            provider,
            suppression,
            reporter,
            phase,
            is_main_project,
            slot: 0,
        }
    }

    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn artifact(&self) -> &'a Artifact {
        self.artifact
    }

    pub fn tree(&self) -> &'a SyntaxTree {
        self.tree
    }

    pub fn provider(&self) -> &'a dyn TreeProvider {
        self.provider
    }

    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn is_main_project(&self) -> bool {
        self.is_main_project
    }

    pub fn resolve(&self, node: NodeId) -> Option<Declaration> {
        self.provider.resolve(self.tree, node)
    }

    pub fn location(&self, node: NodeId) -> Location {
        let range = self.tree.range(node);
        Location {
            file: self.project.display_path(&self.artifact.path),
            line: range.start_line.max(1),
            column: Some(range.start_column),
            line_end: Some(range.end_line.max(range.start_line).max(1)),
            column_end: Some(range.end_column),
            snippet: self.tree.snippet(node),
            secondary: None,
        }
    }

    pub fn is_suppressed(&self, issue_id: &str, node: NodeId) -> bool {
        self.reporter
            .catalog()
            .get(issue_id)
            .is_some_and(|issue| self.suppression.is_suppressed(issue, self.tree, node))
    }

    /// Reports `issue_id` at `node` unless a suppression directive covers it.
    pub fn report(&mut self, issue_id: &str, node: NodeId, message: impl Into<String>) {
        let location = self.location(node);
        self.report_at(issue_id, node, location, message);
    }

    /// Like [`FileContext::report`] with an explicit location; suppression is
    /// still checked against `node`.
    pub fn report_at(
        &mut self,
        issue_id: &str,
        node: NodeId,
        location: Location,
        message: impl Into<String>,
    ) {
        let catalog = self.reporter.catalog();
        let Some(issue) = catalog.get(issue_id) else {
            warn!(issue_id, "Detector reported an unknown issue");
            return;
        };
        if self.suppression.is_suppressed(issue, self.tree, node) {
            debug!(issue = issue_id, line = location.line, "Suppressed");
            return;
        }
        self.reporter.report(issue, location, message.into());
    }

    /// Asks for another phase over `scope`; `None` asks for everything.
    pub fn request_repeat(&mut self, scope: Option<ScopeSet>) {
        self.reporter.request_repeat(self.slot, scope);
    }

    pub fn option(&self, issue_id: &str, key: &str) -> Option<String> {
        self.reporter.configuration().option_value(issue_id, key)
    }
}

/// What a detector sees before and after the artifacts of a project.
pub struct ProjectContext<'a, 'r> {
    project: &'a Project,
    reporter: &'a mut Reporter<'r>,
    phase: usize,
    is_main_project: bool,
    pub(crate) slot: Slot,
}

impl<'a, 'r> ProjectContext<'a, 'r> {
    pub fn new(
        project: &'a Project,
        reporter: &'a mut Reporter<'r>,
        phase: usize,
        is_main_project: bool,
    ) -> Self {
        Self {
            project,
            reporter,
            phase,
            is_main_project,
            slot: 0,
        }
    }

    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn is_main_project(&self) -> bool {
        self.is_main_project
    }

    /// Project-level report; there is no node to check suppression against.
    pub fn report(&mut self, issue_id: &str, location: Location, message: impl Into<String>) {
        let catalog = self.reporter.catalog();
        match catalog.get(issue_id) {
            Some(issue) => {
                self.reporter.report(issue, location, message.into());
            }
            None => warn!(issue_id, "Detector reported an unknown issue"),
        }
    }

    pub fn request_repeat(&mut self, scope: Option<ScopeSet>) {
        self.reporter.request_repeat(self.slot, scope);
    }

    pub fn option(&self, issue_id: &str, key: &str) -> Option<String> {
        self.reporter.configuration().option_value(issue_id, key)
    }
}
