use crate::config::{Configuration, DefaultConfiguration};
use crate::core::catalog::IssueCatalog;
use crate::core::context::{Artifact, ArtifactKind, FileContext, Project, Reporter};
use crate::core::engine::AnalysisEngine;
use crate::core::finding_collector::FindingCollector;
use crate::core::suppression::SuppressionResolver;
use crate::core::tree::{Annotation, Declaration, NodeId, SyntaxTree, TreeProvider};
use crate::detectors::builtin_plugin;
use crate::frontend::SolidityProvider;
use crate::models::{Incident, Issue, Severity};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Trees and declarations held in memory; calls and references resolve by name.
#[derive(Default)]
pub struct MemoryProvider {
    trees: HashMap<PathBuf, SyntaxTree>,
    declarations: HashMap<String, Declaration>,
    super_types: HashMap<String, Vec<String>>,
    meta_annotations: HashMap<String, Vec<Annotation>>,
}

impl MemoryProvider {
    pub fn add_tree(&mut self, path: &str, tree: SyntaxTree) {
        self.trees.insert(PathBuf::from(path), tree);
    }

    pub fn add_declaration(&mut self, name: &str, declaration: Declaration) {
        self.declarations.insert(name.to_string(), declaration);
    }

    pub fn add_super_type(&mut self, class: &str, super_type: &str) {
        self.super_types
            .entry(class.to_string())
            .or_default()
            .push(super_type.to_string());
    }

    pub fn add_meta_annotation(&mut self, annotation: &str, meta: Annotation) {
        self.meta_annotations
            .entry(annotation.to_string())
            .or_default()
            .push(meta);
    }
}

impl TreeProvider for MemoryProvider {
    fn parse(&self, artifact: &Artifact) -> Option<SyntaxTree> {
        self.trees.get(&artifact.path).cloned()
    }

    fn resolve(&self, tree: &SyntaxTree, node: NodeId) -> Option<Declaration> {
        self.declarations.get(tree.name(node)?).cloned()
    }

    fn super_types(&self, qualified_name: &str) -> Vec<String> {
        self.super_types
            .get(qualified_name)
            .cloned()
            .unwrap_or_default()
    }

    fn meta_annotations(&self, annotation: &str) -> Vec<Annotation> {
        self.meta_annotations
            .get(annotation)
            .cloned()
            .unwrap_or_default()
    }
}

/// Runs `f` with a file context over `tree`: empty catalog, default
/// configuration, main project `test`.
pub fn with_file_context<R>(
    tree: &SyntaxTree,
    provider: &dyn TreeProvider,
    f: impl FnOnce(&mut FileContext) -> R,
) -> R {
    let catalog = IssueCatalog::builder().build();
    let configuration = DefaultConfiguration;
    let mut sink: Vec<Incident> = Vec::new();
    let mut reporter = Reporter::new(&catalog, &configuration, &mut sink);
    let project = Project::new("test", "");
    let artifact = Artifact::new(tree.path(), ArtifactKind::Source);
    let suppression = SuppressionResolver::new(true);
    let mut ctx = FileContext::new(
        &project,
        &artifact,
        tree,
        provider,
        &suppression,
        &mut reporter,
        1,
        true,
    );
    f(&mut ctx)
}

/// Turns on every issue, including the disabled-by-default ones.
pub struct EnableAll;

impl Configuration for EnableAll {
    fn severity_of(&self, issue: &Issue, _file: Option<&Path>) -> Severity {
        issue.default_severity
    }
}

/// Analyzes `code` with the built-in detectors and returns the incidents.
pub fn analyze_code(code: &str, filename: &str) -> Vec<Incident> {
    analyze_code_with(code, filename, &EnableAll)
}

pub fn analyze_code_with(
    code: &str,
    filename: &str,
    configuration: &dyn Configuration,
) -> Vec<Incident> {
    let provider = SolidityProvider::default().with_source(filename, code);
    let project = Project::new("test", "")
        .with_artifact(Artifact::new(filename, ArtifactKind::Source));
    let mut engine = AnalysisEngine::from_plugins(vec![builtin_plugin()]);
    let mut sink = FindingCollector::new();
    engine
        .analyze(&[project], &provider, configuration, &mut sink)
        .expect("analysis runs");
    sink.into_incidents()
}

/// Lines reported for the issues of detector `key`, in report order.
pub fn run_detector_on_code(key: &str, code: &str, filename: &str) -> Vec<usize> {
    let engine = AnalysisEngine::from_plugins(vec![builtin_plugin()]);
    let ids: Vec<String> = engine
        .catalog()
        .issues_for_detector(key)
        .map(|issue| issue.id.clone())
        .collect();
    analyze_code(code, filename)
        .into_iter()
        .filter(|incident| ids.contains(&incident.issue_id))
        .map(|incident| incident.location.line)
        .collect()
}
