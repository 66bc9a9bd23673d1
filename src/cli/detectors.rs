use crate::cli::CliError;
use crate::core::catalog::IssueCatalog;
use crate::core::engine::AnalysisEngine;
use crate::models::{Issue, Severity};

fn describe(issue: &Issue) -> String {
    let mut text = format!(
        "{} ({})\n  Category: {}\n  Detector: {}\n  Priority: {}\n",
        issue.id,
        issue.default_severity,
        issue.category.full_name(),
        issue.detector_key(),
        issue.priority,
    );
    if !issue.enabled_by_default {
        text.push_str("  Disabled by default\n");
    }
    text.push_str(&format!("\n{}\n\n{}\n", issue.brief, issue.explanation));
    text
}

pub fn handle_detectors_command(
    severity: Option<String>,
    details: Option<String>,
) -> Result<(), CliError> {
    let engine = AnalysisEngine::with_builtin_detectors();
    let catalog = engine.catalog();

    if let Some(issue_id) = details {
        return match catalog.get(&issue_id) {
            Some(issue) => {
                println!("{}", describe(issue));
                Ok(())
            }
            None => Err(CliError::InvalidArgument(format!(
                "Issue with ID '{}' not found.",
                issue_id
            ))),
        };
    }

    let filter = severity
        .map(|s| {
            s.parse::<Severity>().map_err(|e| {
                CliError::InvalidArgument(format!(
                    "{} (acceptable values: fatal, error, warning, informational)",
                    e
                ))
            })
        })
        .transpose()?;

    let issues: Vec<&Issue> = catalog
        .issues()
        .iter()
        .filter(|issue| !IssueCatalog::is_internal(issue))
        .filter(|issue| filter.map_or(true, |s| issue.default_severity == s))
        .collect();

    match filter {
        Some(s) => println!("\nAvailable issues filtered by severity: {}", s),
        None => println!("\nAvailable issues (Total: {}):", issues.len()),
    }

    if issues.is_empty() {
        println!("No issues found");
        return Ok(());
    }

    let mut current_detector = "";
    for issue in issues {
        if issue.detector_key() != current_detector {
            current_detector = issue.detector_key();
            println!("\n[{}]", current_detector);
        }
        println!("  ({}) - {}: {}", issue.default_severity, issue.id, issue.brief);
    }
    Ok(())
}
