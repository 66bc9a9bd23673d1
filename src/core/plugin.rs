//! Registration boundary for detector plugins.
//!
//! A plugin bundles issues with the factories of the detectors that report
//! them. Before anything is registered the plugin is verified against the
//! running engine: its API requirement must accept [`engine_api_version`]
//! and every engine symbol it names must exist.

use crate::core::catalog::IssueCatalog;
use crate::core::error::DetectorError;
use crate::core::registry::{DetectorFactory, DetectorRegistry};
use crate::detectors::Detector;
use crate::models::Issue;
use semver::{Version, VersionReq};
use thiserror::Error;
use tracing::{debug, warn};

/// Version of the detector-facing API: the `Detector` trait, the contexts and
/// the tree model.
pub fn engine_api_version() -> Version {
    Version::new(1, 0, 0)
}

/// Engine items a plugin may refer to.
pub const EXPORTED_SYMBOLS: &[&str] = &[
    "Detector",
    "DetectorError",
    "DetectorResult",
    "FileContext",
    "ProjectContext",
    "SyntaxTree",
    "NodeId",
    "NodeKind",
    "Role",
    "BinaryOperator",
    "Declaration",
    "Annotation",
    "AnnotationUsage",
    "AnnotationUsageKind",
    "Issue",
    "Implementation",
    "Category",
    "Categories",
    "Severity",
    "Scope",
    "ScopeSet",
    "Location",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("plugin '{plugin}' has an invalid API requirement '{requirement}': {message}")]
    InvalidRequirement {
        plugin: String,
        requirement: String,
        message: String,
    },
    #[error("plugin '{plugin}' requires engine API {requirement}, but this engine provides {found}")]
    IncompatibleApi {
        plugin: String,
        requirement: String,
        found: Version,
    },
    #[error("plugin '{plugin}' refers to engine symbols that do not exist: {}", missing.join(", "))]
    MissingSymbols { plugin: String, missing: Vec<String> },
}

/// A set of issues and the detector factories implementing them.
pub struct DetectorPlugin {
    pub name: String,
    pub api_requirement: String,
    pub references: Vec<String>,
    pub issues: Vec<Issue>,
    pub factories: Vec<(String, DetectorFactory)>,
}

impl DetectorPlugin {
    pub fn new(name: &str, api_requirement: &str) -> Self {
        Self {
            name: name.to_string(),
            api_requirement: api_requirement.to_string(),
            references: Vec::new(),
            issues: Vec::new(),
            factories: Vec::new(),
        }
    }

    pub fn references(mut self, symbols: &[&str]) -> Self {
        self.references
            .extend(symbols.iter().map(|s| s.to_string()));
        self
    }

    pub fn issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn issues(mut self, issues: impl IntoIterator<Item = Issue>) -> Self {
        self.issues.extend(issues);
        self
    }

    /// Registers a detector type constructed through `Default`.
    pub fn detector<D>(self, key: &str) -> Self
    where
        D: Detector + Default + 'static,
    {
        self.factory(
            key,
            Box::new(|| -> Result<Box<dyn Detector>, DetectorError> { Ok(Box::new(D::default())) }),
        )
    }

    pub fn factory(mut self, key: &str, factory: DetectorFactory) -> Self {
        self.factories.push((key.to_string(), factory));
        self
    }
}

/// Checks a plugin against the running engine without registering anything.
pub fn verify_plugin(plugin: &DetectorPlugin) -> Result<(), PluginError> {
    let requirement =
        VersionReq::parse(&plugin.api_requirement).map_err(|e| PluginError::InvalidRequirement {
            plugin: plugin.name.clone(),
            requirement: plugin.api_requirement.clone(),
            message: e.to_string(),
        })?;

    let found = engine_api_version();
    if !requirement.matches(&found) {
        return Err(PluginError::IncompatibleApi {
            plugin: plugin.name.clone(),
            requirement: plugin.api_requirement.clone(),
            found,
        });
    }

    let missing: Vec<String> = plugin
        .references
        .iter()
        .filter(|symbol| !EXPORTED_SYMBOLS.contains(&symbol.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PluginError::MissingSymbols {
            plugin: plugin.name.clone(),
            missing,
        });
    }

    Ok(())
}

/// Catalog and registry built from the plugins that passed verification.
pub struct LoadedPlugins {
    pub catalog: IssueCatalog,
    pub registry: DetectorRegistry,
    pub rejected: Vec<PluginError>,
}

pub fn load_plugins(plugins: Vec<DetectorPlugin>) -> LoadedPlugins {
    let mut builder = IssueCatalog::builder();
    let mut registry = DetectorRegistry::new();
    let mut rejected = Vec::new();

    for plugin in plugins {
        if let Err(e) = verify_plugin(&plugin) {
            warn!(plugin = %plugin.name, "Rejecting plugin: {}", e);
            rejected.push(e);
            continue;
        }
        debug!(
            plugin = %plugin.name,
            issues = plugin.issues.len(),
            detectors = plugin.factories.len(),
            "Registering plugin"
        );
        builder.extend(plugin.issues);
        for (key, factory) in plugin.factories {
            registry.register(&key, factory);
        }
    }

    LoadedPlugins {
        catalog: builder.build(),
        registry,
        rejected,
    }
}

/// Factory for a detector whose construction can fail.
pub fn fallible_factory<F>(build: F) -> DetectorFactory
where
    F: Fn() -> Result<Box<dyn Detector>, DetectorError> + 'static,
{
    Box::new(build)
}
