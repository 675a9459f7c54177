pub mod build;
pub mod tools;
pub mod validate;
pub mod version;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use plugpack_core::{config, PlugpackConfig};

/// Project location arguments shared by every subcommand.
#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Plugin project root.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file to use instead of `<PATH>/plugpack.yaml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl ProjectArgs {
    /// Canonical project root and its configuration.
    pub fn load(&self) -> Result<(PathBuf, PlugpackConfig)> {
        let root = self
            .path
            .canonicalize()
            .with_context(|| format!("project directory {} not found", self.path.display()))?;
        let config = match &self.config {
            Some(file) => config::load_file(file)
                .with_context(|| format!("failed to load config {}", file.display()))?,
            None => config::load_at(&root)
                .with_context(|| format!("failed to load config in {}", root.display()))?,
        };
        tracing::debug!(root = %root.display(), ?config, "loaded project");
        Ok((root, config))
    }
}

/// `1.2 MB`-style size.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
