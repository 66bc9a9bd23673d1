//! End-to-end runs of the engine over hand-built trees.

use ferret::config::DefaultConfiguration;
use ferret::core::annotations::AnnotationUsage;
use ferret::core::baseline::BaselineStore;
use ferret::core::cancel::CancellationToken;
use ferret::core::catalog::{Categories, BASELINE, LINT_ERROR, PARSER_ERROR};
use ferret::core::context::{Artifact, ArtifactKind, FileContext, Project, ProjectContext};
use ferret::core::engine::{AnalysisEngine, RunOutcome, RunSummary};
use ferret::core::error::{DetectorError, DetectorResult};
use ferret::core::finding_collector::FindingCollector;
use ferret::core::plugin::DetectorPlugin;
use ferret::core::registry::DetectorFactory;
use ferret::core::tree::{
    Annotation, Declaration, NodeId, NodeKind, SyntaxTree, TextRange, TreeProvider,
};
use ferret::detectors::Detector;
use ferret::models::scope::{CLASS_FILE_SCOPE, RESOURCE_FILE_SCOPE, SOURCE_FILE_SCOPE};
use ferret::models::{Implementation, Issue, Scope, ScopeSet, Severity};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

#[derive(Default)]
struct Trees {
    trees: HashMap<PathBuf, SyntaxTree>,
    meta: HashMap<String, Vec<Annotation>>,
}

impl Trees {
    fn add(&mut self, tree: SyntaxTree) {
        self.trees.insert(tree.path().to_path_buf(), tree);
    }
}

impl TreeProvider for Trees {
    fn parse(&self, artifact: &Artifact) -> Option<SyntaxTree> {
        self.trees.get(&artifact.path).cloned()
    }

    fn resolve(&self, _tree: &SyntaxTree, _node: NodeId) -> Option<Declaration> {
        None
    }

    fn super_types(&self, _qualified_name: &str) -> Vec<String> {
        Vec::new()
    }

    fn meta_annotations(&self, annotation: &str) -> Vec<Annotation> {
        self.meta.get(annotation).cloned().unwrap_or_default()
    }
}

fn issue(id: &str, implementation: Implementation) -> Issue {
    Issue::new(
        id,
        id,
        "",
        &Categories::standard().correctness,
        5,
        Severity::Warning,
        implementation,
    )
}

fn at_line(tree: &mut SyntaxTree, node: NodeId, line: usize) {
    tree.node_mut(node).range = TextRange {
        start_line: line,
        start_column: 0,
        end_line: line,
        end_column: 1,
    };
}

fn empty_tree(path: &str) -> SyntaxTree {
    let mut tree = SyntaxTree::new(path);
    let class = tree.add_named(tree.root(), NodeKind::Class, "A");
    at_line(&mut tree, class, 1);
    tree
}

/// Logs every file it sees as `key:phase:path` and asks for more phases
/// until `repeat_until`.
#[derive(Clone)]
struct Probe {
    key: &'static str,
    log: Log,
    repeat_until: usize,
    hint: Option<ScopeSet>,
}

impl Probe {
    fn new(key: &'static str, log: &Log) -> Self {
        Self {
            key,
            log: Rc::clone(log),
            repeat_until: 0,
            hint: None,
        }
    }

    fn repeating(mut self, until: usize, hint: Option<ScopeSet>) -> Self {
        self.repeat_until = until;
        self.hint = hint;
        self
    }

    fn factory(self) -> DetectorFactory {
        Box::new(move || -> Result<Box<dyn Detector>, DetectorError> {
            self.log.borrow_mut().push(format!("new:{}", self.key));
            Ok(Box::new(self.clone()))
        })
    }
}

impl Detector for Probe {
    fn before_check_file(&mut self, ctx: &mut FileContext) -> DetectorResult {
        self.log.borrow_mut().push(format!(
            "{}:{}:{}",
            self.key,
            ctx.phase(),
            ctx.artifact().path.display()
        ));
        Ok(())
    }

    fn after_check_project(&mut self, ctx: &mut ProjectContext) -> DetectorResult {
        if ctx.phase() < self.repeat_until {
            ctx.request_repeat(self.hint);
        }
        Ok(())
    }
}

fn visits(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|entry| !entry.starts_with("new:"))
        .cloned()
        .collect()
}

fn constructions(log: &Log, key: &str) -> usize {
    log.borrow()
        .iter()
        .filter(|entry| *entry == &format!("new:{}", key))
        .count()
}

fn source_project(files: &[&str]) -> Project {
    files.iter().fold(Project::new("app", ""), |project, file| {
        project.with_artifact(Artifact::new(*file, ArtifactKind::Source))
    })
}

fn run(engine: &mut AnalysisEngine, project: Project, trees: &Trees) -> (FindingCollector, RunSummary) {
    let mut collector = FindingCollector::new();
    let summary = engine
        .analyze(&[project], trees, &DefaultConfiguration, &mut collector)
        .expect("analysis runs");
    (collector, summary)
}

#[test]
fn test_inadequate_detector_is_never_constructed() {
    let log: Log = Rc::default();
    let plugin = || {
        DetectorPlugin::new("probes", "^1")
            .issue(issue("Narrow", Implementation::new("narrow", SOURCE_FILE_SCOPE)))
            .issue(issue(
                "Wide",
                Implementation::new("wide", SOURCE_FILE_SCOPE.union(CLASS_FILE_SCOPE)),
            ))
            .factory("narrow", Probe::new("narrow", &log).factory())
            .factory("wide", Probe::new("wide", &log).factory())
    };
    let mut trees = Trees::default();
    trees.add(empty_tree("A.sol"));

    let mut engine = AnalysisEngine::from_plugins(vec![plugin()]).with_scope(SOURCE_FILE_SCOPE);
    run(&mut engine, source_project(&["A.sol"]), &trees);
    assert_eq!(constructions(&log, "narrow"), 1);
    assert_eq!(constructions(&log, "wide"), 0);
    assert_eq!(visits(&log), vec!["narrow:1:A.sol"]);

    log.borrow_mut().clear();
    let mut engine = AnalysisEngine::from_plugins(vec![plugin()]);
    run(&mut engine, source_project(&["A.sol"]), &trees);
    assert_eq!(constructions(&log, "wide"), 1);
    assert_eq!(visits(&log), vec!["narrow:1:A.sol", "wide:1:A.sol"]);
}

#[test]
fn test_detector_with_two_issues_has_one_instance_across_phases() {
    let log: Log = Rc::default();
    let plugin = DetectorPlugin::new("probes", "^1")
        .issue(issue("First", Implementation::new("pair", SOURCE_FILE_SCOPE)))
        .issue(issue("Second", Implementation::new("pair", SOURCE_FILE_SCOPE)))
        .factory("pair", Probe::new("pair", &log).repeating(2, None).factory());
    let mut trees = Trees::default();
    trees.add(empty_tree("A.sol"));
    trees.add(empty_tree("B.sol"));

    let mut engine = AnalysisEngine::from_plugins(vec![plugin]);
    let (_, summary) = run(&mut engine, source_project(&["A.sol", "B.sol"]), &trees);

    assert_eq!(summary.phases, vec![2]);
    assert_eq!(constructions(&log, "pair"), 1);
    assert_eq!(
        visits(&log),
        vec!["pair:1:A.sol", "pair:1:B.sol", "pair:2:A.sol", "pair:2:B.sol"]
    );
}

#[test]
fn test_phases_stop_after_three() {
    let log: Log = Rc::default();
    let plugin = DetectorPlugin::new("probes", "^1")
        .issue(issue("Greedy", Implementation::new("greedy", SOURCE_FILE_SCOPE)))
        .factory(
            "greedy",
            Probe::new("greedy", &log).repeating(usize::MAX, None).factory(),
        );
    let mut trees = Trees::default();
    trees.add(empty_tree("A.sol"));

    let mut engine = AnalysisEngine::from_plugins(vec![plugin]);
    let (_, summary) = run(&mut engine, source_project(&["A.sol"]), &trees);

    assert_eq!(summary.phases, vec![3]);
    assert_eq!(
        visits(&log),
        vec!["greedy:1:A.sol", "greedy:2:A.sol", "greedy:3:A.sol"]
    );
}

#[test]
fn test_class_file_repeat_runs_only_the_requesting_detector() {
    let log: Log = Rc::default();
    let binary = Implementation::new("binary", SOURCE_FILE_SCOPE.union(CLASS_FILE_SCOPE))
        .with_analysis_scope(CLASS_FILE_SCOPE);
    let plugin = DetectorPlugin::new("probes", "^1")
        .issue(issue("Binary", binary))
        .issue(issue("Source", Implementation::new("source", SOURCE_FILE_SCOPE)))
        .factory(
            "binary",
            Probe::new("binary", &log)
                .repeating(2, Some(CLASS_FILE_SCOPE))
                .factory(),
        )
        .factory("source", Probe::new("source", &log).factory());
    let mut trees = Trees::default();
    trees.add(empty_tree("A.sol"));
    trees.add(empty_tree("A.class"));
    let project = Project::new("app", "")
        .with_artifact(Artifact::new("A.sol", ArtifactKind::Source))
        .with_artifact(Artifact::new("A.class", ArtifactKind::ClassFile));

    let mut engine = AnalysisEngine::from_plugins(vec![plugin])
        .with_scope(ScopeSet::of(&[Scope::SourceFile, Scope::ClassFile]));
    let (_, summary) = run(&mut engine, project, &trees);

    assert_eq!(summary.phases, vec![2]);
    let mut seen = visits(&log);
    seen.sort();
    assert_eq!(
        seen,
        vec![
            "binary:1:A.class",
            "binary:1:A.sol",
            "binary:2:A.class",
            "source:1:A.sol",
        ]
    );
}

#[test]
fn test_repeat_hint_narrower_than_issue_scope_keeps_the_detector() {
    let log: Log = Rc::default();
    let plugin = DetectorPlugin::new("probes", "^1")
        .issue(issue(
            "Binary",
            Implementation::new("binary", SOURCE_FILE_SCOPE.union(CLASS_FILE_SCOPE)),
        ))
        .factory(
            "binary",
            Probe::new("binary", &log)
                .repeating(2, Some(CLASS_FILE_SCOPE))
                .factory(),
        );
    let mut trees = Trees::default();
    trees.add(empty_tree("A.sol"));
    trees.add(empty_tree("A.class"));
    let project = Project::new("app", "")
        .with_artifact(Artifact::new("A.sol", ArtifactKind::Source))
        .with_artifact(Artifact::new("A.class", ArtifactKind::ClassFile));

    let mut engine = AnalysisEngine::from_plugins(vec![plugin])
        .with_scope(ScopeSet::of(&[Scope::SourceFile, Scope::ClassFile]));
    let (_, summary) = run(&mut engine, project, &trees);

    assert_eq!(summary.phases, vec![2]);
    let mut seen = visits(&log);
    seen.sort();
    assert_eq!(
        seen,
        vec!["binary:1:A.class", "binary:1:A.sol", "binary:2:A.class"]
    );
}

#[test]
fn test_unparsable_file_is_reported_once_across_phases() {
    let log: Log = Rc::default();
    let plugin = DetectorPlugin::new("probes", "^1")
        .issue(issue("Greedy", Implementation::new("greedy", SOURCE_FILE_SCOPE)))
        .factory(
            "greedy",
            Probe::new("greedy", &log).repeating(usize::MAX, None).factory(),
        );
    // Broken.sol has no tree, so the provider fails to parse it.
    let mut trees = Trees::default();
    trees.add(empty_tree("A.sol"));

    let mut engine = AnalysisEngine::from_plugins(vec![plugin]);
    let (collector, summary) = run(&mut engine, source_project(&["A.sol", "Broken.sol"]), &trees);

    assert_eq!(summary.phases, vec![3]);
    assert_eq!(collector.count_for(PARSER_ERROR), 1);
    assert_eq!(
        visits(&log),
        vec!["greedy:1:A.sol", "greedy:2:A.sol", "greedy:3:A.sol"]
    );
}

/// Reports `Flagged` and `Other` at every call.
#[derive(Default)]
struct CallFlagger;

impl Detector for CallFlagger {
    fn applicable_node_kinds(&self) -> &[NodeKind] {
        &[NodeKind::Call]
    }

    fn visit_node(&mut self, ctx: &mut FileContext, node: NodeId) -> DetectorResult {
        ctx.report("Flagged", node, "flagged call");
        ctx.report("Other", node, "other call");
        Ok(())
    }
}

#[test]
fn test_suppression_covers_descendants_and_only_named_ids() {
    let mut tree = SyntaxTree::new("Vault.sol");
    let root = tree.root();

    let suppressed = tree.add_named(root, NodeKind::Class, "Vault");
    at_line(&mut tree, suppressed, 1);
    let annotation = tree.add_named(suppressed, NodeKind::Annotation, "SuppressWarnings");
    tree.node_mut(annotation).values = vec!["Flagged".to_string()];
    let method = tree.add_named(suppressed, NodeKind::Method, "withdraw");
    at_line(&mut tree, method, 3);
    let call = tree.add_named(method, NodeKind::Call, "send");
    at_line(&mut tree, call, 4);

    let open = tree.add_named(root, NodeKind::Class, "Open");
    at_line(&mut tree, open, 10);
    let call = tree.add_named(open, NodeKind::Call, "send");
    at_line(&mut tree, call, 11);

    let quiet = tree.add_named(root, NodeKind::Class, "Quiet");
    at_line(&mut tree, quiet, 20);
    tree.add_comment(19, "// noinspection all");
    let call = tree.add_named(quiet, NodeKind::Call, "send");
    at_line(&mut tree, call, 22);

    let mut trees = Trees::default();
    trees.add(tree);
    let plugin = DetectorPlugin::new("flagger", "^1")
        .issue(issue("Flagged", Implementation::new("flagger", SOURCE_FILE_SCOPE)))
        .issue(issue("Other", Implementation::new("flagger", SOURCE_FILE_SCOPE)))
        .detector::<CallFlagger>("flagger");

    let mut engine = AnalysisEngine::from_plugins(vec![plugin]);
    let (collector, _) = run(&mut engine, source_project(&["Vault.sol"]), &trees);

    let reported: Vec<(&str, usize)> = collector
        .incidents()
        .iter()
        .map(|i| (i.issue_id.as_str(), i.location.line))
        .collect();
    assert_eq!(reported, vec![("Other", 4), ("Flagged", 11), ("Other", 11)]);
}

/// Logs annotation usages as `kind:declaration:annotation:via`.
struct IntDefUsages {
    log: Log,
}

impl Detector for IntDefUsages {
    fn applicable_annotations(&self) -> &[&'static str] {
        &["IntDef"]
    }

    fn visit_annotation_usage(
        &mut self,
        _ctx: &mut FileContext,
        usage: &AnnotationUsage,
    ) -> DetectorResult {
        let via = usage
            .via
            .as_ref()
            .map_or("-", |a| a.qualified_name.as_str());
        self.log.borrow_mut().push(format!(
            "{:?}:{}:{}:{}",
            usage.kind, usage.declaration, usage.annotation.qualified_name, via
        ));
        Ok(())
    }
}

#[test]
fn test_meta_annotation_dispatches_like_the_annotation_itself() {
    let mut tree = SyntaxTree::new("Colors.sol");
    let class = tree.add_named(tree.root(), NodeKind::Class, "Colors");
    let indirect = tree.add_named(class, NodeKind::Method, "setColor");
    tree.add_named(indirect, NodeKind::Annotation, "Foo");
    let direct = tree.add_named(class, NodeKind::Method, "setShade");
    tree.add_named(direct, NodeKind::Annotation, "IntDef");

    let mut trees = Trees::default();
    trees.add(tree);
    trees
        .meta
        .insert("Foo".to_string(), vec![Annotation::new("IntDef")]);

    let log: Log = Rc::default();
    let usages = Rc::clone(&log);
    let plugin = DetectorPlugin::new("annotations", "^1")
        .issue(issue("IntDefUsage", Implementation::new("intdef", SOURCE_FILE_SCOPE)))
        .factory(
            "intdef",
            Box::new(move || -> Result<Box<dyn Detector>, DetectorError> {
                Ok(Box::new(IntDefUsages {
                    log: Rc::clone(&usages),
                }))
            }),
        );

    let mut engine = AnalysisEngine::from_plugins(vec![plugin]);
    run(&mut engine, source_project(&["Colors.sol"]), &trees);

    assert_eq!(
        *log.borrow(),
        vec![
            "Definition:setColor:IntDef:Foo",
            "Definition:setShade:IntDef:-",
        ]
    );
}

/// Reports every `Other` node named `unused` as an unused resource.
#[derive(Default)]
struct UnusedResources;

impl Detector for UnusedResources {
    fn applicable_node_kinds(&self) -> &[NodeKind] {
        &[NodeKind::Other]
    }

    fn visit_node(&mut self, ctx: &mut FileContext, node: NodeId) -> DetectorResult {
        if ctx.tree().name(node) == Some("unused") {
            ctx.report("UnusedResource", node, "R.string.unused is unused");
        }
        Ok(())
    }
}

#[test]
fn test_baseline_filters_listed_report_and_counts_fixed_entries() {
    let path = "res/values/strings.xml";
    let mut tree = SyntaxTree::new(path);
    let string = tree.add_named(tree.root(), NodeKind::Other, "unused");
    at_line(&mut tree, string, 12);
    let mut trees = Trees::default();
    trees.add(tree);

    let mut baseline = BaselineStore::empty("ferret-baseline.json");
    baseline.add_chain(
        "UnusedResource",
        "R.string.unused is unused",
        &[(path.to_string(), 12)],
    );
    baseline.add_chain(
        "UnusedResource",
        "R.string.gone is unused",
        &[(path.to_string(), 30)],
    );

    let plugin = DetectorPlugin::new("resources", "^1")
        .issue(issue(
            "UnusedResource",
            Implementation::new("unused-resources", RESOURCE_FILE_SCOPE),
        ))
        .detector::<UnusedResources>("unused-resources");
    let mut engine = AnalysisEngine::from_plugins(vec![plugin]).with_baseline(baseline);
    let project =
        Project::new("app", "").with_artifact(Artifact::new(path, ArtifactKind::ResourceFile));
    let (collector, summary) = run(&mut engine, project, &trees);

    assert_eq!(collector.count_for("UnusedResource"), 0);
    assert_eq!(collector.count_for(BASELINE), 2);

    let counts = summary.baseline.expect("baseline summary");
    assert_eq!(counts.found_warnings, 1);
    assert_eq!(counts.found_errors, 0);
    assert_eq!(counts.total, 2);
    assert_eq!(counts.fixed, counts.total - counts.found());
    assert_eq!(counts.fixed, 1);
}

/// Fails on every file it is handed.
#[derive(Default)]
struct Crashing;

impl Detector for Crashing {
    fn before_check_file(&mut self, _ctx: &mut FileContext) -> DetectorResult {
        Err(DetectorError::failed("boom"))
    }
}

#[test]
fn test_crash_diagnostics_are_capped() {
    let files: Vec<String> = (0..25).map(|i| format!("C{}.sol", i)).collect();
    let mut trees = Trees::default();
    for file in &files {
        trees.add(empty_tree(file));
    }
    let names: Vec<&str> = files.iter().map(String::as_str).collect();

    let plugin = DetectorPlugin::new("crashing", "^1")
        .issue(issue("Crashes", Implementation::new("crashing", SOURCE_FILE_SCOPE)))
        .detector::<Crashing>("crashing");
    let mut engine = AnalysisEngine::from_plugins(vec![plugin]);
    let (collector, summary) = run(&mut engine, source_project(&names), &trees);

    assert_eq!(summary.crashes, 25);
    assert_eq!(collector.count_for(LINT_ERROR), 20);
    assert_eq!(summary.outcome, RunOutcome::Completed);
}

/// Cancels the run from inside the first file it sees.
struct Canceling {
    token: Rc<RefCell<Option<CancellationToken>>>,
    log: Log,
}

impl Detector for Canceling {
    fn before_check_file(&mut self, ctx: &mut FileContext) -> DetectorResult {
        self.log
            .borrow_mut()
            .push(ctx.artifact().path.display().to_string());
        if let Some(token) = self.token.borrow().as_ref() {
            token.cancel();
        }
        Ok(())
    }
}

#[test]
fn test_cancellation_stops_the_run_and_notifies_the_sink() {
    let mut trees = Trees::default();
    trees.add(empty_tree("A.sol"));
    trees.add(empty_tree("B.sol"));

    let token: Rc<RefCell<Option<CancellationToken>>> = Rc::default();
    let log: Log = Rc::default();
    let (shared_token, shared_log) = (Rc::clone(&token), Rc::clone(&log));
    let plugin = DetectorPlugin::new("canceling", "^1")
        .issue(issue("Cancels", Implementation::new("canceling", SOURCE_FILE_SCOPE)))
        .factory(
            "canceling",
            Box::new(move || -> Result<Box<dyn Detector>, DetectorError> {
                Ok(Box::new(Canceling {
                    token: Rc::clone(&shared_token),
                    log: Rc::clone(&shared_log),
                }))
            }),
        );

    let mut engine = AnalysisEngine::from_plugins(vec![plugin]);
    *token.borrow_mut() = Some(engine.cancel_token());
    let (collector, summary) = run(&mut engine, source_project(&["A.sol", "B.sol"]), &trees);

    assert_eq!(summary.outcome, RunOutcome::Canceled);
    assert!(collector.was_canceled());
    assert!(summary.baseline.is_none());
    assert_eq!(*log.borrow(), vec!["A.sol"]);
}
