//! The immutable per-run build context.
//!
//! Built once at pipeline start. The slug and version are resolved inside
//! [`BuildContext::new`] and never change afterwards; steps only ever see
//! `&BuildContext`.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::config::{expand_all, validate_slug, PlugpackConfig};
use crate::error::ConfigError;
use crate::types::{ArtifactKind, ToolAvailability};
use crate::version::{resolve_slug, resolve_version, ResolvedVersion};

/// Everything a pipeline step may read.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub project_root: PathBuf,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub slug: String,
    pub version: ResolvedVersion,
    pub tools: ToolAvailability,
    /// User the translation extractor runs as, when privileges are dropped.
    pub run_as: Option<String>,
    pub step_timeout: Duration,
    pub config: PlugpackConfig,
}

impl BuildContext {
    /// Resolve slug and version and anchor every configured path at `project_root`.
    pub fn new(
        project_root: &Path,
        config: PlugpackConfig,
        tools: ToolAvailability,
        run_as: Option<String>,
    ) -> Result<Self, ConfigError> {
        if !project_root.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: project_root.to_path_buf(),
            });
        }
        config.validate()?;

        let slug = resolve_slug(project_root, config.slug.as_deref());
        validate_slug(&slug)?;

        let header_files: Vec<PathBuf> = expand_all(&config.header_files, &slug)
            .into_iter()
            .map(PathBuf::from)
            .collect();
        let version = resolve_version(project_root, &header_files, &config.fallback_version);
        tracing::info!(
            slug = %slug,
            version = %version.version,
            source = %version.source,
            "resolved plugin identity"
        );

        Ok(Self {
            project_root: project_root.to_path_buf(),
            source_dir: anchor(project_root, &config.source_dir),
            build_dir: anchor(project_root, &config.build_dir),
            dist_dir: anchor(project_root, &config.dist_dir),
            step_timeout: Duration::from_secs(config.step_timeout_secs),
            slug,
            version,
            tools,
            run_as,
            config,
        })
    }

    /// The resolved version string.
    pub fn version(&self) -> &str {
        &self.version.version
    }

    /// Destination path of an archive of `kind`.
    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        self.dist_dir.join(kind.file_name(&self.slug, self.version()))
    }

    /// Translation template path inside the build output.
    pub fn pot_path(&self) -> PathBuf {
        self.build_dir
            .join("languages")
            .join(format!("{}.pot", self.slug))
    }

    /// Main plugin file name (`<slug>.php`).
    pub fn main_plugin_file(&self) -> String {
        format!("{}.php", self.slug)
    }

    /// A config list with `{slug}` expanded.
    pub fn expanded(&self, templates: &[String]) -> Vec<String> {
        expand_all(templates, &self.slug)
    }
}

/// `root.join(relative)` without `.` components, so `"."` maps to `root` itself.
fn anchor(root: &Path, relative: &Path) -> PathBuf {
    relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .fold(root.to_path_buf(), |acc, c| acc.join(c))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn artifact_paths_share_one_version() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "plugin", "version": "11.5.1"}"#,
        )
        .expect("write");
        let ctx = BuildContext::new(
            dir.path(),
            PlugpackConfig::default(),
            ToolAvailability::default(),
            None,
        )
        .expect("context");

        let prod = ctx.artifact_path(ArtifactKind::Production);
        let dev = ctx.artifact_path(ArtifactKind::Development);
        assert!(prod.ends_with("plugin-11.5.1.zip"));
        assert!(dev.ends_with("plugin-11.5.1-dev.zip"));
        assert!(ctx.pot_path().ends_with("build/languages/plugin.pot"));
        assert_eq!(ctx.dist_dir, dir.path());
        assert_eq!(ctx.source_dir, dir.path());
    }

    #[test]
    fn missing_root_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let err = BuildContext::new(
            &dir.path().join("nope"),
            PlugpackConfig::default(),
            ToolAvailability::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotADirectory { .. }));
    }
}
