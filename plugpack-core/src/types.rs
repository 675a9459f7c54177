//! Domain types shared by the detector, the pipeline and the CLI.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tool availability
// ---------------------------------------------------------------------------

/// Which external collaborators are usable for this run.
///
/// Produced by filesystem / `PATH` probing only; no tool is executed to fill it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAvailability {
    /// Task runner (local `node_modules/.bin` or on `PATH`).
    pub task_runner: Option<PathBuf>,
    /// Archiver plugin package installed under `node_modules/`.
    pub archiver_plugin: bool,
    /// Translation extractor executable.
    pub translation_tool: Option<PathBuf>,
    /// PHP dependency manager executable.
    pub php_dependency_manager: Option<PathBuf>,
    /// Node dependency manager executable.
    pub node_dependency_manager: Option<PathBuf>,
    /// External validation script inside the project.
    pub validation_script: Option<PathBuf>,
    /// The project declares PHP dependencies (`composer.json`).
    pub needs_php_dependencies: bool,
    /// The project declares Node dependencies (`package.json`).
    pub needs_node_dependencies: bool,
}

impl ToolAvailability {
    /// The delegated archiver needs both the task runner and its plugin.
    pub fn delegated_archiver(&self) -> bool {
        self.task_runner.is_some() && self.archiver_plugin
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Which distributable an archive is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Production,
    Development,
}

impl ArtifactKind {
    /// File name for this kind: `<slug>-<version>.zip` or `<slug>-<version>-dev.zip`.
    pub fn file_name(self, slug: &str, version: &str) -> String {
        match self {
            ArtifactKind::Production => format!("{slug}-{version}.zip"),
            ArtifactKind::Development => format!("{slug}-{version}-dev.zip"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Production => write!(f, "production"),
            ArtifactKind::Development => write!(f, "development"),
        }
    }
}

/// A produced archive. Never mutated after creation; a re-run overwrites the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub version_tag: String,
    pub size_bytes: u64,
    /// Hex SHA-256 of the archive bytes.
    pub sha256: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_file_names_embed_version() {
        assert_eq!(
            ArtifactKind::Production.file_name("plugin", "11.5.1"),
            "plugin-11.5.1.zip"
        );
        assert_eq!(
            ArtifactKind::Development.file_name("plugin", "11.5.1"),
            "plugin-11.5.1-dev.zip"
        );
    }

    #[test]
    fn delegated_archiver_needs_runner_and_plugin() {
        let mut tools = ToolAvailability {
            archiver_plugin: true,
            ..ToolAvailability::default()
        };
        assert!(!tools.delegated_archiver());
        tools.task_runner = Some(PathBuf::from("/usr/bin/grunt"));
        assert!(tools.delegated_archiver());
    }

    #[test]
    fn artifact_kind_display() {
        assert_eq!(ArtifactKind::Development.to_string(), "development");
    }
}
