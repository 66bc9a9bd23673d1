use crate::models::{Finding, Report, Severity};
use serde_sarif::sarif::{
    self, ArtifactLocation, Message, MultiformatMessageString, PhysicalLocation,
    ReportingDescriptor, Result as SarifResult, ResultLevel, Run, Sarif, ToolComponent, Version,
    SCHEMA_URL,
};
use fnv::FnvHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

fn severity_to_level(severity: &Severity) -> ResultLevel {
    match severity {
        Severity::Fatal | Severity::Error => ResultLevel::Error,
        Severity::Warning => ResultLevel::Warning,
        Severity::Informational | Severity::Ignore => ResultLevel::Note,
    }
}

/// security-severity score read by GitHub code scanning
fn severity_to_score(severity: &Severity) -> &'static str {
    match severity {
        Severity::Fatal => "9.5",
        Severity::Error => "8.0",
        Severity::Warning => "5.0",
        Severity::Informational => "2.0",
        Severity::Ignore => "0.0",
    }
}

/// Stable identifier of a result across runs, from issue id, file, line and snippet.
/// FnvHasher keeps it stable across Rust versions.
fn generate_fingerprint(issue_id: &str, file: &str, line: usize, snippet: Option<&str>) -> String {
    let mut hasher = FnvHasher::default();
    issue_id.hash(&mut hasher);
    file.hash(&mut hasher);
    line.hash(&mut hasher);
    if let Some(s) = snippet {
        s.trim().hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

/// One rule per issue, one result per instance.
pub fn generate_sarif_report(report: &Report) -> Sarif {
    let mut rules: Vec<ReportingDescriptor> = Vec::new();
    let mut rule_indices: HashMap<String, i64> = HashMap::new();
    let mut results: Vec<SarifResult> = Vec::new();

    for finding in &report.findings {
        let rule_index = match rule_indices.get(&finding.issue_id) {
            Some(index) => *index,
            None => {
                let index = rules.len() as i64;
                rule_indices.insert(finding.issue_id.clone(), index);
                rules.push(rule_for(finding));
                index
            }
        };

        for instance in &finding.instances {
            let location = &instance.location;
            // Strip ./ prefix for GitHub compatibility
            let file_path = location.file.strip_prefix("./").unwrap_or(&location.file);
            let artifact_location = ArtifactLocation::builder().uri(file_path).build();

            // SARIF columns are 1-based
            let start_col = location.column.map_or(1, |c| c + 1) as i64;
            let end_col = location.column_end.map_or(start_col as usize, |c| c + 1) as i64;

            let region = sarif::Region::builder()
                .start_line(location.line as i64)
                .start_column(start_col)
                .end_line(location.line_end.unwrap_or(location.line) as i64)
                .end_column(end_col)
                .build();

            let physical_location = PhysicalLocation::builder()
                .artifact_location(artifact_location)
                .region(region)
                .build();

            let sarif_location = sarif::Location::builder()
                .physical_location(physical_location)
                .build();

            let fingerprint = generate_fingerprint(
                &finding.issue_id,
                &location.file,
                location.line,
                location.snippet.as_deref(),
            );
            let mut partial_fingerprints = BTreeMap::new();
            partial_fingerprints.insert("primaryLocationLineHash".to_string(), fingerprint);

            let text = if instance.message.is_empty() {
                &finding.title
            } else {
                &instance.message
            };
            let result = SarifResult::builder()
                .rule_id(&finding.issue_id)
                .rule_index(rule_index)
                .level(severity_to_level(&finding.severity))
                .message(Message::builder().text(text).build())
                .locations(vec![sarif_location])
                .partial_fingerprints(partial_fingerprints)
                .build();

            results.push(result);
        }
    }

    let tool_component = ToolComponent::builder()
        .name("ferret")
        .semantic_version(env!("CARGO_PKG_VERSION"))
        .rules(rules)
        .build();

    let run = Run::builder()
        .tool(tool_component)
        .results(results)
        .build();

    Sarif::builder()
        .version(Version::V2_1_0.to_string())
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .build()
}

fn rule_for(finding: &Finding) -> ReportingDescriptor {
    let mut props = BTreeMap::new();
    props.insert(
        "security-severity".to_string(),
        serde_json::json!(severity_to_score(&finding.severity)),
    );
    props.insert("precision".to_string(), serde_json::json!("high"));
    if !finding.category.is_empty() {
        let tags: Vec<&str> = finding.category.split(':').collect();
        props.insert("tags".to_string(), serde_json::json!(tags));
    }

    ReportingDescriptor::builder()
        .id(&finding.issue_id)
        .name(&finding.title)
        .short_description(&finding.title)
        .full_description(&finding.description)
        .help(
            MultiformatMessageString::builder()
                .text(&finding.description)
                .build(),
        )
        .properties(
            sarif::PropertyBag::builder()
                .additional_properties(props)
                .build(),
        )
        .build()
}
