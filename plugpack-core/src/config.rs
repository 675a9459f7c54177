//! Project configuration.
//!
//! # File layout
//!
//! ```text
//! <project>/
//!   plugpack.yaml     (optional; every field has a default)
//! ```
//!
//! String fields that name paths inside the plugin may contain the `{slug}`
//! placeholder, expanded once the plugin slug is known (see [`expand_slug`]).

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// Default config file name looked up at the project root.
pub const CONFIG_FILE_NAME: &str = "plugpack.yaml";

/// Placeholder replaced by the resolved plugin slug.
pub const SLUG_PLACEHOLDER: &str = "{slug}";

/// Default per-step timeout for external processes (15 minutes).
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 900;

// ---------------------------------------------------------------------------
// Config struct
// ---------------------------------------------------------------------------

/// Contents of `plugpack.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlugpackConfig {
    /// Plugin distribution folder name. Derived from the manifest when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Source tree copied verbatim when the delegated build produces nothing.
    pub source_dir: PathBuf,
    /// Build output directory, relative to the project root.
    pub build_dir: PathBuf,
    /// Directory receiving the produced archives.
    pub dist_dir: PathBuf,
    /// Plugin header files searched for `Version:`, in order.
    pub header_files: Vec<String>,
    /// Version used when neither manifest nor header declares one.
    pub fallback_version: String,
    /// Timeout applied to every external process.
    pub step_timeout_secs: u64,
    /// Run the translation extractor as this user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as: Option<String>,

    /// Task runner executable name.
    pub task_runner: String,
    /// Task runner task producing the build directory.
    pub build_task: String,
    /// Task runner task producing the production archive.
    pub archive_task: String,
    /// Package directory under `node_modules/` providing the archive task.
    pub archiver_plugin: String,
    /// Translation extractor executable name.
    pub translation_tool: String,
    /// Optional external validation script, relative to the project root.
    pub validation_script: PathBuf,

    /// Root files copied into the build output when absent there.
    pub auxiliary_files: Vec<String>,
    /// Globs excluded when copying the source tree as a build fallback.
    /// A glob without `**/` only matches from the tree root.
    pub copy_exclude: Vec<String>,
    /// Globs excluded from the development archive.
    pub dev_exclude: Vec<String>,
    /// Globs passed to the translation extractor as `--exclude`.
    pub pot_exclude: Vec<String>,

    /// Top-level files that must exist in the build output.
    pub required_files: Vec<String>,
    /// Top-level component directories that must exist in the build output.
    pub required_dirs: Vec<String>,
    /// Entries whose absence only produces a warning.
    pub optional_entries: Vec<String>,
}

impl Default for PlugpackConfig {
    fn default() -> Self {
        Self {
            slug: None,
            source_dir: PathBuf::from("."),
            build_dir: PathBuf::from("build"),
            dist_dir: PathBuf::from("."),
            header_files: strings(&["{slug}.php", "src/{slug}.php"]),
            fallback_version: crate::version::FALLBACK_VERSION.to_string(),
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            run_as: None,
            task_runner: "grunt".to_string(),
            build_task: "build".to_string(),
            archive_task: "compress".to_string(),
            archiver_plugin: "grunt-contrib-compress".to_string(),
            translation_tool: "wp".to_string(),
            validation_script: PathBuf::from("bin/validate-build.sh"),
            auxiliary_files: strings(&["LICENSE", "license.txt", "readme.txt", "README.md"]),
            copy_exclude: strings(&[
                "**/node_modules",
                "build",
                "*.zip",
                "**/.git",
                "**/.svn",
                "**/.DS_Store",
                "**/Thumbs.db",
                CONFIG_FILE_NAME,
            ]),
            dev_exclude: strings(&[
                "**/node_modules",
                "**/vendor",
                "build",
                "**/*.zip",
                "**/.git",
                "**/.svn",
                "**/.DS_Store",
                "**/Thumbs.db",
            ]),
            pot_exclude: strings(&["node_modules", "vendor", "tests"]),
            required_files: strings(&["{slug}.php", "readme.txt"]),
            required_dirs: strings(&[
                "admin",
                "assets",
                "blocks",
                "build",
                "includes",
                "languages",
                "lib",
                "public",
                "templates",
                "vendor",
                "widgets",
            ]),
            optional_entries: strings(&["languages/{slug}.pot"]),
        }
    }
}

impl PlugpackConfig {
    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "step_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.fallback_version.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "fallback_version",
                message: "must not be empty".to_string(),
            });
        }
        if !crate::version::is_file_name_safe(self.fallback_version.trim()) {
            return Err(ConfigError::Invalid {
                field: "fallback_version",
                message: format!(
                    "'{}' must not contain path separators or '..'",
                    self.fallback_version
                ),
            });
        }
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        if self.build_dir.as_os_str().is_empty() || self.build_dir == Path::new(".") {
            return Err(ConfigError::Invalid {
                field: "build_dir",
                message: "must name a dedicated directory".to_string(),
            });
        }
        // The build dir is deleted on every run; keep it inside the project.
        if self.build_dir.is_absolute()
            || self
                .build_dir
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ConfigError::Invalid {
                field: "build_dir",
                message: "must be a relative path inside the project".to_string(),
            });
        }
        Ok(())
    }
}

/// A slug becomes a folder name inside archives, so it must be a single
/// non-empty path component.
pub fn validate_slug(slug: &str) -> Result<(), ConfigError> {
    let trimmed = slug.trim();
    if trimmed.is_empty() || trimmed != slug {
        return Err(ConfigError::Invalid {
            field: "slug",
            message: format!("'{slug}' must be non-empty without surrounding whitespace"),
        });
    }
    if slug.contains(['/', '\\']) || slug == "." || slug == ".." {
        return Err(ConfigError::Invalid {
            field: "slug",
            message: format!("'{slug}' must be a single path component"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load `<project_root>/plugpack.yaml`, or defaults when the file is absent.
pub fn load_at(project_root: &Path) -> Result<PlugpackConfig, ConfigError> {
    let path = project_root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PlugpackConfig::default());
    }
    load_file(&path)
}

/// Load an explicit config file. Unlike [`load_at`], a missing file is an error.
pub fn load_file(path: &Path) -> Result<PlugpackConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    // An empty file is valid YAML `null`; treat it as "all defaults".
    if contents.trim().is_empty() {
        return Ok(PlugpackConfig::default());
    }
    let config: PlugpackConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
    config.validate()?;
    Ok(config)
}

/// Replace every `{slug}` placeholder in `template`.
pub fn expand_slug(template: &str, slug: &str) -> String {
    template.replace(SLUG_PLACEHOLDER, slug)
}

/// [`expand_slug`] over a list.
pub fn expand_all(templates: &[String], slug: &str) -> Vec<String> {
    templates.iter().map(|t| expand_slug(t, slug)).collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
