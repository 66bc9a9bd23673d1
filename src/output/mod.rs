pub mod sarif;

use crate::models::finding::Location;
use crate::models::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    #[default]
    #[serde(alias = "md")]
    Markdown,
    Sarif,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "md" | "markdown" => Ok(ReportFormat::Markdown),
            "sarif" => Ok(ReportFormat::Sarif),
            _ => Err(format!("Invalid report format: {}", s)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "Json"),
            ReportFormat::Markdown => write!(f, "Markdown"),
            ReportFormat::Sarif => write!(f, "Sarif"),
        }
    }
}

impl ReportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
            ReportFormat::Sarif => "sarif",
        }
    }
}

/// Writes `report` to `output` (extension set from the format) or stdout.
pub fn generate_report(
    report: &Report,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> io::Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(path.with_extension(format.extension()))?),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, report)?;
            writeln!(writer)?;
        }
        ReportFormat::Markdown => {
            write!(writer, "{}", generate_markdown_report(report))?;
        }
        ReportFormat::Sarif => {
            let document = sarif::generate_sarif_report(report);
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writeln!(writer)?;
        }
    }
    writer.flush()
}

/// Generate a markdown report
pub fn generate_markdown_report(report: &Report) -> String {
    let mut markdown = String::new();

    markdown.push_str("# Static Analysis Report\n\n");

    if let Some(metadata) = &report.metadata {
        markdown.push_str("## Metadata\n\n");
        let sorted: BTreeMap<&String, &String> = metadata.iter().collect();
        for (key, value) in sorted {
            markdown.push_str(&format!("- **{}**: {}\n", key, value));
        }
        markdown.push('\n');
    }

    if !report.comment.is_empty() {
        markdown.push_str(&format!("## Overview\n\n{}\n\n", report.comment));
    }

    let summary = report.summary();
    markdown.push_str("## Summary\n\n");
    markdown.push_str(&format!("- **Fatal**: {}\n", summary.fatal));
    markdown.push_str(&format!("- **Error**: {}\n", summary.error));
    markdown.push_str(&format!("- **Warning**: {}\n", summary.warning));
    markdown.push_str(&format!("- **Information**: {}\n", summary.informational));
    markdown.push_str(&format!("- **Total**: {}\n\n", summary.total));

    markdown.push_str("## Findings\n\n");
    if report.findings.is_empty() {
        markdown.push_str("No issues found.\n\n");
    }

    for (i, finding) in report.findings.iter().enumerate() {
        markdown.push_str(&format!(
            "### {}. {} ({})\n\n",
            i + 1,
            finding.title,
            finding.severity
        ));
        markdown.push_str(&format!("**Id**: `{}`", finding.issue_id));
        if !finding.category.is_empty() {
            markdown.push_str(&format!(" | **Category**: {}", finding.category));
        }
        markdown.push_str("\n\n");

        if !finding.description.is_empty() {
            markdown.push_str(&format!("**Description**:\n{}\n\n", finding.description));
        }

        if !finding.instances.is_empty() {
            // Grouped by file, files in name order
            let mut by_file: BTreeMap<&str, Vec<(&Location, &str)>> = BTreeMap::new();
            for instance in &finding.instances {
                by_file
                    .entry(instance.location.file.as_str())
                    .or_default()
                    .push((&instance.location, instance.message.as_str()));
            }

            let num_files = by_file.len();
            let file_plural = if num_files == 1 { "file" } else { "files" };
            let total_instances = finding.instances.len();
            let instance_plural = if total_instances == 1 {
                "instance"
            } else {
                "instances"
            };

            markdown.push_str(&format!(
                "<details>\n<summary><i>{} {} in {} {}</i></summary>\n\n",
                total_instances, instance_plural, num_files, file_plural
            ));

            for (file_path, locations) in &by_file {
                markdown.push_str("```solidity\n");
                markdown.push_str(&format!("File: {}\n\n", file_path));
                for (loc, message) in locations {
                    let snippet = loc.snippet.as_deref().unwrap_or("...");
                    markdown.push_str(&format!("{}: {}\n", loc.line, snippet));
                    if !message.is_empty() {
                        markdown.push_str(&format!("// {}\n", message));
                    }
                }
                markdown.push_str("```\n\n");
            }

            markdown.push_str("</details>\n\n");
        }

        markdown.push_str("---\n\n");
    }

    if !report.footnote.is_empty() {
        markdown.push_str(&format!("## Note\n\n{}\n", report.footnote));
    }

    markdown
}
