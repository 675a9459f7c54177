//! Auxiliary-file reconciliation.
//!
//! Copies root-level files (license, readme, main plugin file) into the build
//! output when the delegated build did not already place them there. Existing
//! destination files are never touched, so repeated runs are no-ops.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{io_err, PipelineError};

/// What happened to each requested file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Copied from the project root into the build output.
    pub copied: Vec<String>,
    /// Already present in the build output; left as-is.
    pub already_present: Vec<String>,
    /// Not present at the project root either.
    pub unavailable: Vec<String>,
}

/// Copy each of `names` from `project_root` into `build_dir` if absent there.
pub fn reconcile_files(
    project_root: &Path,
    build_dir: &Path,
    names: &[String],
) -> Result<ReconcileSummary, PipelineError> {
    let mut summary = ReconcileSummary::default();
    for name in names {
        let dest = build_dir.join(name);
        if dest.exists() {
            summary.already_present.push(name.clone());
            continue;
        }
        let src = project_root.join(name);
        if !src.is_file() {
            summary.unavailable.push(name.clone());
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::copy(&src, &dest).map_err(|e| io_err(&src, e))?;
        tracing::debug!(file = %name, "reconciled into build output");
        summary.copied.push(name.clone());
    }
    Ok(summary)
}
