use crate::cli::CliError;
use crate::config::{load_config, warn_unknown_ids, CliOverrides, ProjectConfiguration};
use crate::core::baseline::BaselineStore;
use crate::core::engine::{AnalysisEngine, RunOutcome};
use crate::core::finding_collector::FindingCollector;
use crate::frontend::{discover_project, SolidityProvider};
use crate::models::Report;
use crate::output;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct AnalyzeArgs {
    pub overrides: CliOverrides,
    pub output: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

/// Runs the built-in detectors over the configured scope and writes the
/// report. Returns the number of reported errors (fatal included).
pub fn handle_analyze_command(args: AnalyzeArgs) -> Result<usize, CliError> {
    let config = load_config(args.overrides, args.config_path)?;
    let project = discover_project(&config.scope, &config.exclude)?;

    let paths: Vec<PathBuf> = project.artifacts.iter().map(|a| a.path.clone()).collect();
    let provider = SolidityProvider::load(&paths);

    let mut engine = AnalysisEngine::with_builtin_detectors();
    for rejected in engine.rejected_plugins() {
        warn!("{}", rejected);
    }

    let known: Vec<String> = engine
        .catalog()
        .issues()
        .iter()
        .map(|issue| issue.id.clone())
        .chain(engine.catalog().categories().iter().flat_map(|c| [c.name.clone(), c.full_name()]))
        .collect();
    warn_unknown_ids(&config, known.iter().map(String::as_str));

    if let Some(path) = &config.baseline {
        let mut store = BaselineStore::load(path);
        // A missing baseline is created from this run
        if config.write_baseline || !path.exists() {
            store = store.write_on_close(config.remove_fixed);
        }
        engine = engine.with_baseline(store);
    }

    let configuration = ProjectConfiguration::new(&config);
    let mut collector = FindingCollector::new();
    let summary = engine.analyze(
        std::slice::from_ref(&project),
        &provider,
        &configuration,
        &mut collector,
    )?;
    if summary.outcome == RunOutcome::Canceled {
        return Err(CliError::Engine(crate::core::error::EngineError::Canceled));
    }

    let mut report = Report::from_incidents(collector.incidents(), |id| engine.catalog().get(id))
        .with_comment("This analysis was performed with the Ferret static analyzer.")
        .with_footnote("Findings can be suppressed with `// noinspection <IssueId>` on or above the reported line.");
    report.add_metadata("ferret_version", crate::core::version());
    report.add_metadata("timestamp", &chrono::Utc::now().to_rfc3339());
    report.add_metadata("project", &project.name);
    report.add_metadata("files", &project.artifacts.len().to_string());
    report.add_metadata(
        "phases",
        &summary.phases.first().copied().unwrap_or_default().to_string(),
    );

    output::generate_report(&report, config.format, args.output)?;

    let totals = report.summary();
    info!(
        total = totals.total,
        errors = totals.error + totals.fatal,
        crashes = summary.crashes,
        "Analysis complete"
    );
    Ok(totals.error + totals.fatal)
}
