//! Tool detection for `plugpack-detector`.
//!
//! `probe_tools_at(root, search_path, config)` inspects the project tree and the
//! executable search path and reports which external collaborators are usable.
//! Nothing is ever executed: presence of a file is the only signal.
//!
//! `check_gate(tools)` turns that availability into a go/no-go decision for the
//! pipeline: a missing tool with no fallback is fatal, everything else degrades.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use plugpack_core::{PlugpackConfig, ToolAvailability};
use serde::Serialize;
use thiserror::Error;

/// PHP dependency manifest.
pub const COMPOSER_MANIFEST: &str = "composer.json";
/// Node dependency manifest.
pub const NODE_MANIFEST: &str = "package.json";
/// PHP dependency manager executable.
pub const COMPOSER: &str = "composer";
/// Node dependency manager executable.
pub const NPM: &str = "npm";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Non-fatal gate findings, reported before the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateNotice {
    /// Translation template generation will be skipped.
    TranslationToolMissing { tool: String },
    /// The production archive will be built directly instead of delegated.
    ArchiverPluginMissing { plugin: String },
    /// The delegated build cannot run; the source tree will be copied.
    TaskRunnerMissing { tool: String },
    /// Node dependencies declared but no installer found.
    NodeManagerMissing,
    /// No external validation script; only built-in validation runs.
    ValidationScriptMissing { path: PathBuf },
}

impl GateNotice {
    /// Informational notices describe a planned fallback, not a degradation.
    pub fn is_warning(&self) -> bool {
        !matches!(self, GateNotice::ArchiverPluginMissing { .. })
    }
}

impl fmt::Display for GateNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateNotice::TranslationToolMissing { tool } => write!(
                f,
                "translation extractor '{tool}' not found; translation template will be skipped"
            ),
            GateNotice::ArchiverPluginMissing { plugin } => write!(
                f,
                "archiver plugin '{plugin}' not installed; production archive will be built directly"
            ),
            GateNotice::TaskRunnerMissing { tool } => write!(
                f,
                "task runner '{tool}' not found; build will fall back to copying the source tree"
            ),
            GateNotice::NodeManagerMissing => {
                write!(f, "'{NPM}' not found; Node dependencies will not be installed")
            }
            GateNotice::ValidationScriptMissing { path } => write!(
                f,
                "validation script {} not found; only built-in checks will run",
                path.display()
            ),
        }
    }
}

/// Fatal gate outcome.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("required tool '{tool}' not found: {hint}")]
    MissingTool { tool: String, hint: String },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Probe tools for `project_root` using the process `PATH`.
pub fn probe_tools(project_root: &Path, config: &PlugpackConfig) -> ToolAvailability {
    let search_path = std::env::var_os("PATH").unwrap_or_default();
    probe_tools_at(project_root, &search_path, config)
}

/// Probe tools for `project_root` against an explicit search path.
///
/// Project-local binaries (`node_modules/.bin`) take priority over `search_path`.
pub fn probe_tools_at(
    project_root: &Path,
    search_path: &OsStr,
    config: &PlugpackConfig,
) -> ToolAvailability {
    let local_bin = project_root.join("node_modules").join(".bin");
    let mut local_path = OsString::from(local_bin.as_os_str());
    if !search_path.is_empty() {
        local_path.push(path_list_separator());
        local_path.push(search_path);
    }

    let validation_script = project_root.join(&config.validation_script);

    let tools = ToolAvailability {
        task_runner: find_executable(&config.task_runner, &local_path),
        archiver_plugin: project_root
            .join("node_modules")
            .join(&config.archiver_plugin)
            .is_dir(),
        translation_tool: find_executable(&config.translation_tool, search_path),
        php_dependency_manager: find_executable(COMPOSER, search_path),
        node_dependency_manager: find_executable(NPM, search_path),
        validation_script: validation_script.is_file().then_some(validation_script),
        needs_php_dependencies: project_root.join(COMPOSER_MANIFEST).is_file(),
        needs_node_dependencies: project_root.join(NODE_MANIFEST).is_file(),
    };
    tracing::debug!(?tools, "probed tools");
    tools
}

/// Decide whether the pipeline may start.
///
/// Only a missing PHP dependency manager is fatal: the build has no way to
/// produce `vendor/` without it.
pub fn check_gate(
    tools: &ToolAvailability,
    config: &PlugpackConfig,
) -> Result<Vec<GateNotice>, GateError> {
    if tools.needs_php_dependencies && tools.php_dependency_manager.is_none() {
        return Err(GateError::MissingTool {
            tool: COMPOSER.to_string(),
            hint: format!(
                "{COMPOSER_MANIFEST} declares PHP dependencies; install Composer \
                 (https://getcomposer.org/download/) and make sure it is on PATH"
            ),
        });
    }

    let mut notices = Vec::new();
    if tools.needs_node_dependencies && tools.node_dependency_manager.is_none() {
        notices.push(GateNotice::NodeManagerMissing);
    }
    if tools.task_runner.is_none() {
        notices.push(GateNotice::TaskRunnerMissing {
            tool: config.task_runner.clone(),
        });
    }
    if !tools.archiver_plugin {
        notices.push(GateNotice::ArchiverPluginMissing {
            plugin: config.archiver_plugin.clone(),
        });
    }
    if tools.translation_tool.is_none() {
        notices.push(GateNotice::TranslationToolMissing {
            tool: config.translation_tool.clone(),
        });
    }
    // An empty path means no script is configured at all.
    if tools.validation_script.is_none() && !config.validation_script.as_os_str().is_empty() {
        notices.push(GateNotice::ValidationScriptMissing {
            path: config.validation_script.clone(),
        });
    }
    Ok(notices)
}

/// Find `name` as an executable file in any directory of `search_path`.
///
/// Names containing a separator are checked as given.
pub fn find_executable(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let direct = Path::new(name);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }
    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| candidate_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|candidate| is_executable(candidate))
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(windows)]
fn candidate_names(name: &str) -> Vec<String> {
    vec![
        name.to_string(),
        format!("{name}.exe"),
        format!("{name}.cmd"),
        format!("{name}.bat"),
    ]
}

#[cfg(not(windows))]
fn candidate_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(windows)]
fn path_list_separator() -> &'static str {
    ";"
}

#[cfg(not(windows))]
fn path_list_separator() -> &'static str {
    ":"
}
