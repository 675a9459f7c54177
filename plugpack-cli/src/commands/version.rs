//! `plugpack version`: show the resolved slug and version.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use plugpack_core::{BuildContext, ToolAvailability};

use super::ProjectArgs;

/// Arguments for `plugpack version`.
#[derive(Args, Debug)]
pub struct VersionArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

impl VersionArgs {
    pub fn run(self) -> Result<ExitCode> {
        let (root, config) = self.project.load()?;
        let ctx = BuildContext::new(&root, config, ToolAvailability::default(), None)
            .context("invalid project configuration")?;
        println!("{} {} ({})", ctx.slug, ctx.version(), ctx.version.source);
        Ok(ExitCode::SUCCESS)
    }
}
