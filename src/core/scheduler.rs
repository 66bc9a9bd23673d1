use crate::core::cancel::CancellationToken;
use crate::core::catalog::{IssueCatalog, LINT_ERROR, PARSER_ERROR};
use crate::core::context::{Artifact, FileContext, Project, ProjectContext, Reporter};
use crate::core::dispatch::{DispatchIndex, Slot};
use crate::core::error::EngineError;
use crate::core::registry::{select_repeating, DetectorInstance, DetectorRegistry, ScopeMap};
use crate::core::suppression::SuppressionResolver;
use crate::core::tree::{SyntaxTree, TreeProvider};
use crate::core::visitor::{guarded, CrashReport, Failure, VisitError, Visitor};
use crate::models::{Location, ScopeSet};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, error, info};

pub const MAX_PHASES: usize = 3;

/// Crash diagnostics surfaced per run; later crashes are only logged.
pub const MAX_REPORTED_CRASHES: usize = 20;

/// Runs the phases of one project: selects detectors, visits every artifact
/// in scope, and repeats with a narrower scope while detectors ask for it.
pub struct PhaseScheduler<'s> {
    catalog: &'s IssueCatalog,
    registry: &'s DetectorRegistry,
    provider: &'s dyn TreeProvider,
    cancel: &'s CancellationToken,
    scope: ScopeSet,
}

impl<'s> PhaseScheduler<'s> {
    pub fn new(
        catalog: &'s IssueCatalog,
        registry: &'s DetectorRegistry,
        provider: &'s dyn TreeProvider,
        cancel: &'s CancellationToken,
        scope: ScopeSet,
    ) -> Self {
        Self {
            catalog,
            registry,
            provider,
            cancel,
            scope,
        }
    }

    fn check_canceled(&self) -> Result<(), EngineError> {
        if self.cancel.is_canceled() {
            Err(EngineError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Returns the number of phases that ran.
    pub fn run_project(
        &self,
        project: &Project,
        is_main_project: bool,
        reporter: &mut Reporter,
    ) -> Result<usize, EngineError> {
        let result = self.run_phases(project, is_main_project, reporter);
        // Leftover requests of an aborted phase must not leak into the next project.
        reporter.take_repeats();
        result
    }

    fn run_phases(
        &self,
        project: &Project,
        is_main_project: bool,
        reporter: &mut Reporter,
    ) -> Result<usize, EngineError> {
        self.check_canceled()?;
        let configuration = reporter.configuration();
        let selection = self
            .registry
            .select_detectors(self.catalog, self.scope, configuration);
        let mut instances = selection.instances;
        let mut scope_map = selection.scope_map;
        let mut scope = self.scope;
        let mut phase = 1;
        // Reported once; later phases skip them.
        let mut unparsable: HashSet<PathBuf> = HashSet::new();

        loop {
            self.check_canceled()?;
            debug!(
                project = %project.name,
                phase,
                scope = ?scope,
                detectors = scope_map.all_slots().len(),
                "Starting phase"
            );
            self.run_phase(
                project,
                is_main_project,
                phase,
                scope,
                &mut instances,
                &scope_map,
                &mut unparsable,
                reporter,
            )?;

            let repeats = reporter.take_repeats();
            if repeats.is_empty() {
                break;
            }
            if phase >= MAX_PHASES {
                info!(project = %project.name, "Phase limit reached; ignoring repeat requests");
                break;
            }
            let next = scope.intersect(repeats.scope());
            if next.is_empty() {
                break;
            }
            scope_map = select_repeating(self.catalog, &instances, repeats.slots(), configuration);
            if scope_map.is_empty() {
                break;
            }
            scope = next;
            phase += 1;
        }

        Ok(phase)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_phase(
        &self,
        project: &Project,
        is_main_project: bool,
        phase: usize,
        scope: ScopeSet,
        instances: &mut [DetectorInstance],
        scope_map: &ScopeMap,
        unparsable: &mut HashSet<PathBuf>,
        reporter: &mut Reporter,
    ) -> Result<(), EngineError> {
        let active = scope_map.all_slots();
        let suppression =
            SuppressionResolver::new(reporter.configuration().check_comment_suppressions());

        for &slot in &active {
            let mut ctx = ProjectContext::new(project, reporter, phase, is_main_project);
            ctx.slot = slot;
            let detector = &mut instances[slot].detector;
            let outcome = guarded(|| detector.before_check_project(&mut ctx));
            self.project_callback_failed(outcome, project, instances, slot, reporter)?;
        }

        // Artifacts with the same detector set share one index.
        let mut indexes: HashMap<Vec<Slot>, DispatchIndex> = HashMap::new();

        for artifact in &project.artifacts {
            self.check_canceled()?;
            let visible = artifact.kind.scopes().intersect(scope);
            if visible.is_empty() || unparsable.contains(&artifact.path) {
                continue;
            }
            let slots = scope_map.slots_for(visible);
            if slots.is_empty() {
                continue;
            }
            let index = indexes
                .entry(slots)
                .or_insert_with_key(|slots| DispatchIndex::build(instances, slots));

            let Some(tree) = self.provider.parse(artifact) else {
                let display_path = project.display_path(&artifact.path);
                reporter.report_internal(
                    PARSER_ERROR,
                    Location::new(&display_path, 1),
                    format!("{} could not be parsed; no detector ran on it", display_path),
                );
                unparsable.insert(artifact.path.clone());
                continue;
            };
            self.visit_artifact(
                project,
                artifact,
                &tree,
                is_main_project,
                phase,
                index,
                instances,
                &suppression,
                reporter,
            )?;
        }

        for &slot in &active {
            let mut ctx = ProjectContext::new(project, reporter, phase, is_main_project);
            ctx.slot = slot;
            let detector = &mut instances[slot].detector;
            let outcome = guarded(|| detector.after_check_project(&mut ctx));
            self.project_callback_failed(outcome, project, instances, slot, reporter)?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_artifact(
        &self,
        project: &Project,
        artifact: &Artifact,
        tree: &SyntaxTree,
        is_main_project: bool,
        phase: usize,
        index: &DispatchIndex,
        instances: &mut [DetectorInstance],
        suppression: &SuppressionResolver,
        reporter: &mut Reporter,
    ) -> Result<(), EngineError> {
        let display_path = project.display_path(&artifact.path);
        debug!(file = %display_path, phase, nodes = tree.len(), "Visiting");
        let _guard = self.provider.read_lock();
        let mut ctx = FileContext::new(
            project,
            artifact,
            tree,
            self.provider,
            suppression,
            reporter,
            phase,
            is_main_project,
        );
        let outcome = Visitor::new(index, self.cancel).visit(instances, &mut ctx);
        match outcome {
            Ok(()) => Ok(()),
            Err(VisitError::Canceled) => Err(EngineError::Canceled),
            Err(VisitError::Crashed(crash)) => {
                self.report_crash(reporter, Location::new(&display_path, 1), &display_path, &crash);
                Ok(())
            }
        }
    }

    fn project_callback_failed(
        &self,
        outcome: Result<(), Failure>,
        project: &Project,
        instances: &[DetectorInstance],
        slot: Slot,
        reporter: &mut Reporter,
    ) -> Result<(), EngineError> {
        match outcome {
            Ok(()) => Ok(()),
            Err(Failure::Canceled) => Err(EngineError::Canceled),
            Err(Failure::Crashed(message)) => {
                let crash = CrashReport {
                    slot,
                    detector: instances[slot].key.clone(),
                    message,
                    trace: Vec::new(),
                };
                let path = project.dir.to_string_lossy().to_string();
                self.report_crash(reporter, Location::new(&path, 1), &project.name, &crash);
                Ok(())
            }
        }
    }

    fn report_crash(
        &self,
        reporter: &mut Reporter,
        location: Location,
        subject: &str,
        crash: &CrashReport,
    ) {
        let count = reporter.record_crash();
        error!(
            detector = %crash.detector,
            subject,
            "Detector failed: {}",
            crash.summary()
        );
        if count > MAX_REPORTED_CRASHES {
            return;
        }

        let ids: Vec<&str> = self
            .catalog
            .issues_for_detector(&crash.detector)
            .map(|issue| issue.id.as_str())
            .collect();
        let message = format!(
            "Unexpected failure during analysis of {} (this is a bug in detector `{}`; \
             disable it with `disable = [\"{}\"]` in ferret.toml): {}",
            subject,
            crash.detector,
            ids.join("\", \""),
            crash.summary()
        );
        reporter.report_internal(LINT_ERROR, location, message);
    }
}
