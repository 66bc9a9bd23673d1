use crate::core::context::{Artifact, ArtifactKind, Project};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse '{path}': {source}")]
    FoundryToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no Solidity sources found under {0:?}")]
    Empty(Vec<PathBuf>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Foundry, // foundry.toml
    Hardhat, // hardhat.config.js / .ts
    Truffle, // truffle-config.js
    Custom,
}

const PROJECT_MARKERS: &[&str] = &[
    "foundry.toml",
    "hardhat.config.js",
    "hardhat.config.ts",
    "truffle-config.js",
];

/// Directory names whose sources are treated as tests.
const TEST_DIRS: &[&str] = &["test", "tests"];

#[derive(Debug, Deserialize, Default)]
struct FoundryToml {
    #[serde(default)]
    profile: FoundryProfiles,
}

#[derive(Debug, Deserialize, Default)]
struct FoundryProfiles {
    #[serde(default)]
    default: FoundryProfile,
}

#[derive(Debug, Deserialize)]
struct FoundryProfile {
    #[serde(default = "default_src")]
    src: String,
    #[serde(default = "default_libs")]
    libs: Vec<String>,
}

fn default_src() -> String {
    "src".to_string()
}

fn default_libs() -> Vec<String> {
    vec!["lib".to_string()]
}

impl Default for FoundryProfile {
    fn default() -> Self {
        Self {
            src: default_src(),
            libs: default_libs(),
        }
    }
}

/// Where a project keeps its sources and dependencies.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_type: ProjectType,
    pub root: PathBuf,
    /// Relative to `root`; analyzed when no scope is given.
    pub default_scope: Vec<PathBuf>,
    /// Relative to `root`; sources below are libraries.
    pub library_paths: Vec<PathBuf>,
}

impl ProjectLayout {
    pub fn detect(root: &Path) -> Result<Self, ProjectError> {
        let project_type = Self::detect_project_type(root);
        let (default_scope, library_paths) = match project_type {
            ProjectType::Foundry => {
                let profile = Self::load_foundry_profile(root)?;
                let src = if profile.src.is_empty() {
                    default_src()
                } else {
                    profile.src
                };
                (
                    vec![PathBuf::from(src)],
                    profile.libs.into_iter().map(PathBuf::from).collect(),
                )
            }
            ProjectType::Hardhat | ProjectType::Truffle => (
                vec![PathBuf::from("contracts")],
                vec![PathBuf::from("node_modules")],
            ),
            ProjectType::Custom => (
                vec![PathBuf::from("src")],
                vec![PathBuf::from("lib"), PathBuf::from("node_modules")],
            ),
        };
        Ok(Self {
            project_type,
            root: root.to_path_buf(),
            default_scope,
            library_paths,
        })
    }

    fn detect_project_type(root: &Path) -> ProjectType {
        if root.join("foundry.toml").exists() {
            ProjectType::Foundry
        } else if root.join("hardhat.config.js").exists() || root.join("hardhat.config.ts").exists() {
            ProjectType::Hardhat
        } else if root.join("truffle-config.js").exists() {
            ProjectType::Truffle
        } else {
            ProjectType::Custom
        }
    }

    fn load_foundry_profile(root: &Path) -> Result<FoundryProfile, ProjectError> {
        let path = root.join("foundry.toml");
        let content = fs::read_to_string(&path).map_err(|source| ProjectError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed: FoundryToml = toml::from_str(&content)
            .map_err(|source| ProjectError::FoundryToml { path, source })?;
        Ok(parsed.profile.default)
    }

    /// Walks up from the first scope entry to the nearest directory holding a
    /// project marker; falls back to the scope directory itself.
    pub fn find_root(scope: &[PathBuf]) -> PathBuf {
        let Some(first) = scope.first() else {
            return PathBuf::from(".");
        };
        let start = if first.is_dir() {
            first.clone()
        } else {
            first
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        };
        start
            .ancestors()
            .find(|dir| PROJECT_MARKERS.iter().any(|m| dir.join(m).exists()))
            .map(Path::to_path_buf)
            .unwrap_or(start)
    }

    fn is_library(&self, path: &Path) -> bool {
        self.library_paths
            .iter()
            .any(|lib| path.starts_with(self.root.join(lib)) || path.starts_with(lib))
    }

    fn kind_of(&self, path: &Path) -> ArtifactKind {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let in_test_dir = relative.components().any(|c| {
            TEST_DIRS
                .iter()
                .any(|t| c.as_os_str().eq_ignore_ascii_case(t))
        });
        if file_name.ends_with(".t.sol") || in_test_dir {
            ArtifactKind::TestSource
        } else if self.is_library(path) {
            ArtifactKind::Library
        } else {
            ArtifactKind::Source
        }
    }
}

fn is_solidity_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "sol")
}

fn is_excluded(path: &Path, exclude: &[PathBuf]) -> bool {
    exclude.iter().any(|pattern| path.starts_with(pattern))
}

fn collect_files(path: &Path, exclude: &[PathBuf], files: &mut Vec<PathBuf>) -> Result<(), ProjectError> {
    if is_excluded(path, exclude) {
        return Ok(());
    }
    if path.is_dir() {
        let read_error = |source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut entries: Vec<PathBuf> = fs::read_dir(path)
            .map_err(read_error)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .map_err(read_error)?;
        // Stable artifact order across platforms
        entries.sort();
        for entry in entries {
            collect_files(&entry, exclude, files)?;
        }
    } else if path.is_file() && is_solidity_file(path) {
        files.push(path.to_path_buf());
    }
    Ok(())
}

/// Builds the project to analyze: detects the layout, walks `scope` (or the
/// layout's default scope) and classifies every Solidity file found.
pub fn discover_project(scope: &[PathBuf], exclude: &[PathBuf]) -> Result<Project, ProjectError> {
    let root = ProjectLayout::find_root(scope);
    let layout = ProjectLayout::detect(&root)?;
    debug!(root = %root.display(), project_type = ?layout.project_type, "Detected project");

    let scope: Vec<PathBuf> = if scope.is_empty() {
        layout.default_scope.iter().map(|s| root.join(s)).collect()
    } else {
        scope.to_vec()
    };

    let mut files = Vec::new();
    for path in &scope {
        collect_files(path, exclude, &mut files)?;
    }
    files.dedup();
    if files.is_empty() {
        return Err(ProjectError::Empty(scope));
    }

    let name = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "project".to_string());
    let mut project = Project::new(&name, &root);
    for file in files {
        let kind = layout.kind_of(&file);
        project = project.with_artifact(Artifact::new(file, kind));
    }
    Ok(project)
}
