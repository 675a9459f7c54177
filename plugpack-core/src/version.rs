//! Plugin version and slug resolution.
//!
//! Version precedence:
//! 1. `package.json` `version` (non-empty string)
//! 2. `Version:` line in the plugin header file (primary, then secondary path)
//! 3. [`FALLBACK_VERSION`] (or the configured override)
//!
//! Resolution never fails; unreadable sources are treated as absent. So are
//! values that cannot be embedded in an archive file name (see
//! [`is_file_name_safe`]).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Version used when no source declares one.
pub const FALLBACK_VERSION: &str = "1.0.0";

/// Manifest file declaring the package name and version.
pub const MANIFEST_FILE: &str = "package.json";

/// Where the resolved version came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum VersionSource {
    Manifest,
    Header(PathBuf),
    Fallback,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSource::Manifest => write!(f, "{MANIFEST_FILE}"),
            VersionSource::Header(path) => write!(f, "plugin header {}", path.display()),
            VersionSource::Fallback => write!(f, "fallback constant"),
        }
    }
}

/// A version string plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    pub version: String,
    pub source: VersionSource,
}

/// Resolve the plugin version for `project_root`.
///
/// `header_files` are tried in order, relative to `project_root`.
pub fn resolve_version(
    project_root: &Path,
    header_files: &[PathBuf],
    fallback: &str,
) -> ResolvedVersion {
    let manifest = manifest_field(project_root, "version").filter(|v| usable(v, "manifest"));
    if let Some(version) = manifest {
        return ResolvedVersion {
            version,
            source: VersionSource::Manifest,
        };
    }

    for relative in header_files {
        let path = project_root.join(relative);
        if let Some(version) = header_version(&path).filter(|v| usable(v, "header")) {
            return ResolvedVersion {
                version,
                source: VersionSource::Header(relative.clone()),
            };
        }
    }

    tracing::debug!(fallback, "no version source found");
    ResolvedVersion {
        version: fallback.to_string(),
        source: VersionSource::Fallback,
    }
}

/// Whether `value` can sit inside a single file name: no path separators and
/// no `..` sequence.
pub fn is_file_name_safe(value: &str) -> bool {
    !value.is_empty() && !value.contains(['/', '\\']) && !value.contains("..")
}

fn usable(version: &str, origin: &str) -> bool {
    let ok = is_file_name_safe(version);
    if !ok {
        tracing::warn!(version, origin, "ignoring version that is not a valid file name part");
    }
    ok
}

/// Resolve the plugin slug: explicit value, manifest `name`, then directory name.
pub fn resolve_slug(project_root: &Path, configured: Option<&str>) -> String {
    if let Some(slug) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        return slug.to_string();
    }
    if let Some(name) = manifest_field(project_root, "name") {
        // Scoped npm names (`@vendor/pkg`) keep only the package part.
        let bare = name.rsplit('/').next().unwrap_or(&name).to_string();
        if !bare.is_empty() {
            return bare;
        }
    }
    project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "plugin".to_string())
}

/// Read a non-empty string field from `package.json`.
fn manifest_field(project_root: &Path, field: &str) -> Option<String> {
    let path = project_root.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).ok()?;
    let json: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "manifest is not valid JSON");
            return None;
        }
    };
    json.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Extract the `Version:` value from a plugin header file.
fn header_version(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_header_version(&content)
}

/// Find the first `Version:` line, tolerating comment decoration.
pub fn parse_header_version(content: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"(?im)^[\s/*#@]*Version:[ \t]*(\S+)").expect("static regex is valid")
    });
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_docblock_header() {
        let header = "<?php\n/**\n * Plugin Name: Acme\n * Version: 2.3.0\n */\n";
        assert_eq!(parse_header_version(header).as_deref(), Some("2.3.0"));
    }

    #[test]
    fn parses_undecorated_header() {
        assert_eq!(parse_header_version("Version: 4.0.1-beta").as_deref(), Some("4.0.1-beta"));
    }

    #[test]
    fn ignores_other_version_keys() {
        let header = " * Requires PHP: 7.4\n * Tested up to: 6.5\n";
        assert!(parse_header_version(header).is_none());
        assert!(parse_header_version(" * Stable tag Version 3\n").is_none());
    }

    #[test]
    fn file_name_safety() {
        assert!(is_file_name_safe("11.5.1"));
        assert!(is_file_name_safe("4.0.1-beta+build.7"));
        assert!(!is_file_name_safe("1.0/../../escaped"));
        assert!(!is_file_name_safe("1.0\\x"));
        assert!(!is_file_name_safe(".."));
        assert!(!is_file_name_safe(""));
    }

    #[test]
    fn empty_version_value_does_not_match_next_line() {
        let header = " * Version:\n * Author: someone\n";
        assert!(parse_header_version(header).is_none());
    }
}
