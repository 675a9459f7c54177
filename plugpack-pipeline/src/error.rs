//! Error types for plugpack-pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use plugpack_detector::GateError;

/// Errors from filesystem and archive operations inside a step.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Reading or writing a ZIP archive failed.
    #[error("archive error at {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// An exclusion glob is not a valid pattern.
    #[error("invalid exclusion glob '{glob}': {source}")]
    Glob {
        glob: String,
        #[source]
        source: glob::PatternError,
    },

    /// Refusing to delete a directory that contains the project itself.
    #[error("refusing to clean {path}: it contains the project root")]
    UnsafeClean { path: PathBuf },
}

/// Errors from spawning and waiting on external processes.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed while waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {}s and was killed", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("unknown user '{user}'")]
    UnknownUser { user: String },

    #[error("failed to look up user '{user}': {message}")]
    UserLookup { user: String, message: String },

    #[error("failed to hand {path} to '{user}': {message}")]
    Ownership {
        path: PathBuf,
        user: String,
        message: String,
    },

    #[error("failed to start process runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Why a step action did not succeed.
///
/// The executor turns this into a fallback attempt, a skipped step or an
/// aborted pipeline depending on the step descriptor.
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Gate(#[from] GateError),

    /// A tool ran but exited unsuccessfully.
    #[error("{command} exited with {status}{}", tail_suffix(.output_tail))]
    ToolFailed {
        command: String,
        status: String,
        output_tail: String,
    },

    /// The action ran but a precondition or expected output is missing.
    #[error("{0}")]
    Unmet(String),
}

fn tail_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {tail}")
    }
}

/// Convenience constructor for [`PipelineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`PipelineError::Archive`].
pub(crate) fn zip_err(path: impl Into<PathBuf>, source: zip::result::ZipError) -> PipelineError {
    PipelineError::Archive {
        path: path.into(),
        source,
    }
}
