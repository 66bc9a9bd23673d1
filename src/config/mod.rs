mod overrides;

pub use overrides::{FileOverride, ProjectConfiguration};

use crate::models::{Issue, Severity};
use crate::output::ReportFormat;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CONFIG_FILE_NAME: &str = "ferret.toml";

pub const DEFAULT_CONFIG_CONTENT: &str = r#"# ferret.toml

# Paths to include in the analysis.
# If omitted, it defaults to ["src"]
# scope = ["src"]

# Paths to exclude from the analysis.
# These can be directories (including subdirectories) or specific files.
# If omitted, it defaults to ["lib"]
# exclude = ["lib", "node_modules"]

# Output format for the report.
# Options: "json", "md" (or "markdown"), "sarif"
# If omitted, it defaults to "md".
# format = "md"

# Baseline file. Issues recorded there are filtered out of the report.
# baseline = "ferret-baseline.json"
# Record every issue found in this run into the baseline file instead.
# write_baseline = false
# While writing, drop baseline entries that no longer occur.
# remove_fixed = false

# Honor `// noinspection <IssueId>` comments.
# check_comments = true

# Issue ids (or category names) to turn off, and disabled-by-default issues to turn on.
# Run `ferret detectors` to see all available issue ids.
# disable = ["TxOriginUsage"]
# enable = ["UnusedInternalFunction"]

# Per-issue severity: "fatal", "error", "warning", "info" or "ignore".
[severity]
# DelegatecallInLoop = "fatal"

# Per-category severity; nested categories are written "Parent:Child".
[category_severity]
# Performance = "info"

# Detector options, keyed by issue id.
[options]
# [options.UnusedInternalFunction]
# ignore_prefix = "_test"

# Per-file severity overrides. `path` matches as a suffix of the file path.
# [[file_override]]
# path = "src/legacy/Vault.sol"
# issue = "all"
# severity = "ignore"
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error parsing config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("error writing '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scope: Vec<PathBuf>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<PathBuf>,
    #[serde(default)]
    pub format: ReportFormat,
    #[serde(default)]
    pub baseline: Option<PathBuf>,
    #[serde(default)]
    pub write_baseline: bool,
    #[serde(default)]
    pub remove_fixed: bool,
    #[serde(default = "default_true")]
    pub check_comments: bool,
    #[serde(default)]
    pub disable: Vec<String>,
    #[serde(default)]
    pub enable: Vec<String>,
    #[serde(default)]
    pub severity: BTreeMap<String, Severity>,
    #[serde(default)]
    pub category_severity: BTreeMap<String, Severity>,
    #[serde(default)]
    pub options: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub file_override: Vec<FileOverride>,
}

fn default_exclude() -> Vec<PathBuf> {
    vec![PathBuf::from("lib")]
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scope: Vec::new(),
            exclude: default_exclude(),
            format: ReportFormat::default(),
            baseline: None,
            write_baseline: false,
            remove_fixed: false,
            check_comments: true,
            disable: Vec::new(),
            enable: Vec::new(),
            severity: BTreeMap::new(),
            category_severity: BTreeMap::new(),
            options: BTreeMap::new(),
            file_override: Vec::new(),
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub scope: Option<Vec<PathBuf>>,
    pub exclude: Option<Vec<PathBuf>>,
    pub format: Option<String>,
    pub baseline: Option<PathBuf>,
    pub write_baseline: bool,
    pub remove_fixed: bool,
    pub disable: Option<Vec<String>>,
    pub enable: Option<Vec<String>>,
}

/// The global fallback config, consulted when the working directory has none.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ferret").join(CONFIG_FILE_NAME))
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<Config>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_config(
    overrides: CliOverrides,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigError> {
    let config = match config_path {
        Some(path) => read_config(&path)?,
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                read_config(&local)?
            } else if let Some(global) = global_config_path().filter(|p| p.exists()) {
                debug!(path = %global.display(), "Using global config");
                read_config(&global)?
            } else {
                Config::default()
            }
        }
    };

    // CLI lists extend the file lists
    let mut disable = config.disable;
    disable.extend(overrides.disable.unwrap_or_default());
    let mut enable = config.enable;
    enable.extend(overrides.enable.unwrap_or_default());

    let format = match overrides.format {
        Some(s) => s.parse().map_err(|message| ConfigError::InvalidValue {
            field: "format",
            message,
        })?,
        None => config.format,
    };

    Ok(Config {
        scope: overrides.scope.unwrap_or(config.scope),
        exclude: overrides.exclude.unwrap_or(config.exclude),
        format,
        baseline: overrides.baseline.or(config.baseline),
        write_baseline: overrides.write_baseline || config.write_baseline,
        remove_fixed: overrides.remove_fixed || config.remove_fixed,
        check_comments: config.check_comments,
        disable,
        enable,
        severity: config.severity,
        category_severity: config.category_severity,
        options: config.options,
        file_override: config.file_override,
    })
}

pub fn initialize_config_file(config_path_override: Option<&Path>) -> Result<(), ConfigError> {
    let default_path = Path::new(CONFIG_FILE_NAME);
    let config_path = config_path_override.unwrap_or(default_path);

    if config_path.exists() {
        info!("'{}' already exists.", config_path.display());
        return Ok(());
    }

    let write_error = |source| ConfigError::Write {
        path: config_path.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(config_path).map_err(write_error)?;
    file.write_all(DEFAULT_CONFIG_CONTENT.as_bytes())
        .map_err(write_error)?;
    info!("Created default '{}' configuration file.", config_path.display());
    Ok(())
}

/// How a run resolves issue severities, options and comment suppression.
pub trait Configuration {
    /// Effective severity of `issue`, optionally for one file.
    /// `Severity::Ignore` means the issue is off.
    fn severity_of(&self, issue: &Issue, file: Option<&Path>) -> Severity;

    fn is_enabled(&self, issue: &Issue) -> bool {
        self.severity_of(issue, None) != Severity::Ignore
    }

    fn option_value(&self, _issue_id: &str, _key: &str) -> Option<String> {
        None
    }

    fn check_comment_suppressions(&self) -> bool {
        true
    }
}

/// Catalog defaults with nothing configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConfiguration;

impl Configuration for DefaultConfiguration {
    fn severity_of(&self, issue: &Issue, _file: Option<&Path>) -> Severity {
        if issue.enabled_by_default {
            issue.default_severity
        } else {
            Severity::Ignore
        }
    }
}

/// Warns about config keys that name no known issue or category.
pub fn warn_unknown_ids<'a>(config: &Config, known: impl Iterator<Item = &'a str> + Clone) {
    let listed = config
        .disable
        .iter()
        .chain(config.enable.iter())
        .chain(config.severity.keys())
        .chain(config.options.keys());
    for id in listed {
        if id.eq_ignore_ascii_case("all") {
            continue;
        }
        if !known.clone().any(|k| k.eq_ignore_ascii_case(id)) {
            warn!(id = %id, "Config refers to an unknown issue or category");
        }
    }
}
