use crate::config::Configuration;
use crate::core::baseline::{BaselineStore, BaselineSummary};
use crate::core::cancel::CancellationToken;
use crate::core::catalog::{IssueCatalog, BASELINE, PLUGIN_ERROR};
use crate::core::context::{Project, Reporter};
use crate::core::error::EngineError;
use crate::core::finding_collector::ReportSink;
use crate::core::plugin::{load_plugins, DetectorPlugin, PluginError};
use crate::core::registry::DetectorRegistry;
use crate::core::scheduler::PhaseScheduler;
use crate::core::tree::TreeProvider;
use crate::detectors::builtin_plugin;
use crate::models::{Location, ScopeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub projects: usize,
    /// Phases that ran, per analyzed project.
    pub phases: Vec<usize>,
    /// Incidents that reached the sink.
    pub incidents: usize,
    pub crashes: usize,
    pub baseline: Option<BaselineSummary>,
}

/// Drives a run: the projects in order, each through the phase scheduler,
/// with every report flowing through one [`Reporter`].
pub struct AnalysisEngine {
    catalog: IssueCatalog,
    registry: DetectorRegistry,
    rejected: Vec<PluginError>,
    scope: ScopeSet,
    cancel: CancellationToken,
    baseline: Option<BaselineStore>,
}

impl AnalysisEngine {
    pub fn from_plugins(plugins: Vec<DetectorPlugin>) -> Self {
        let loaded = load_plugins(plugins);
        debug!(
            issues = loaded.catalog.len(),
            detectors = loaded.registry.count(),
            rejected = loaded.rejected.len(),
            "Loaded plugins"
        );
        Self {
            catalog: loaded.catalog,
            registry: loaded.registry,
            rejected: loaded.rejected,
            scope: ScopeSet::ALL,
            cancel: CancellationToken::new(),
            baseline: None,
        }
    }

    pub fn with_builtin_detectors() -> Self {
        Self::from_plugins(vec![builtin_plugin()])
    }

    pub fn with_scope(mut self, scope: ScopeSet) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_baseline(mut self, baseline: BaselineStore) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// A handle that cancels the run from another thread.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn catalog(&self) -> &IssueCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn rejected_plugins(&self) -> &[PluginError] {
        &self.rejected
    }

    pub fn baseline(&self) -> Option<&BaselineStore> {
        self.baseline.as_ref()
    }

    /// Analyzes `projects` in order; the first one is the main project.
    pub fn analyze(
        &mut self,
        projects: &[Project],
        provider: &dyn TreeProvider,
        configuration: &dyn Configuration,
        sink: &mut dyn ReportSink,
    ) -> Result<RunSummary, EngineError> {
        if projects.is_empty() {
            return Err(EngineError::NoProjects);
        }

        let scheduler = PhaseScheduler::new(
            &self.catalog,
            &self.registry,
            provider,
            &self.cancel,
            self.scope,
        );
        let mut reporter =
            Reporter::new(&self.catalog, configuration, sink).with_baseline(self.baseline.as_mut());

        let origin = Location::new(&projects[0].dir.to_string_lossy(), 1);
        for rejected in &self.rejected {
            reporter.report_internal(PLUGIN_ERROR, origin.clone(), rejected.to_string());
        }

        let mut outcome = RunOutcome::Completed;
        let mut phases = Vec::with_capacity(projects.len());
        for (index, project) in projects.iter().enumerate() {
            let is_main = index == 0;
            info!(project = %project.name, artifacts = project.artifacts.len(), "Analyzing project");
            match scheduler.run_project(project, is_main, &mut reporter) {
                Ok(count) => phases.push(count),
                Err(EngineError::Canceled) => {
                    info!(project = %project.name, "Analysis canceled");
                    reporter.notify_canceled();
                    outcome = RunOutcome::Canceled;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let baseline = match outcome {
            RunOutcome::Completed => report_baseline_summary(&mut reporter, origin),
            RunOutcome::Canceled => None,
        };

        let summary = RunSummary {
            outcome,
            projects: phases.len(),
            phases,
            incidents: reporter.delivered(),
            crashes: reporter.crashes(),
            baseline,
        };
        drop(reporter);

        // A canceled run saw only part of the project; keep the old baseline
        if let Some(store) = self.baseline.as_mut().filter(|_| outcome == RunOutcome::Completed) {
            if let Err(e) = store.close() {
                warn!("Failed to write baseline: {}", e);
            }
        }
        Ok(summary)
    }
}

/// Emits the end-of-run baseline diagnostics and returns the counts.
fn report_baseline_summary(reporter: &mut Reporter, origin: Location) -> Option<BaselineSummary> {
    let store = reporter.baseline_mut()?;
    let summary = store.summary();
    let path = store.path().display().to_string();
    let unmatched = store.unmatched_by_issue();
    let quiet_fixed = store.is_writing() && store.removes_fixed();

    if summary.found() > 0 {
        let what = match (summary.found_errors, summary.found_warnings) {
            (0, warnings) => plural(warnings, "warning"),
            (errors, 0) => plural(errors, "error"),
            (errors, warnings) => {
                format!("{} and {}", plural(errors, "error"), plural(warnings, "warning"))
            }
        };
        let verb = if summary.found() == 1 { "was" } else { "were" };
        reporter.report_unfiltered(
            BASELINE,
            Location::new(&path, 1),
            format!(
                "{} {} filtered out because {} listed in the baseline file, {}",
                what,
                verb,
                if summary.found() == 1 { "it is" } else { "they are" },
                path
            ),
        );
    }

    if summary.fixed > 0 && !quiet_fixed {
        let listing: Vec<String> = unmatched
            .iter()
            .map(|(id, count)| format!("{} ({})", id, count))
            .collect();
        reporter.report_unfiltered(
            BASELINE,
            origin,
            format!(
                "{} from the baseline {} no longer found: {}",
                plural(summary.fixed, "issue"),
                if summary.fixed == 1 { "was" } else { "were" },
                listing.join(", ")
            ),
        );
    }

    debug!(
        found_errors = summary.found_errors,
        found_warnings = summary.found_warnings,
        fixed = summary.fixed,
        "Baseline applied"
    );
    Some(summary)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
