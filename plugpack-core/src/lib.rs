//! plugpack core library.
//!
//! - [`config`]: `plugpack.yaml` loading and defaults
//! - [`version`]: version and slug resolution
//! - [`context`]: the immutable [`BuildContext`]
//! - [`types`]: tool availability and artifact types
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod context;
pub mod error;
pub mod types;
pub mod version;

pub use config::PlugpackConfig;
pub use context::BuildContext;
pub use error::ConfigError;
pub use types::{Artifact, ArtifactKind, ToolAvailability};
pub use version::{resolve_version, ResolvedVersion, VersionSource, FALLBACK_VERSION};
