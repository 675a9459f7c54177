//! Directory-tree helpers shared by the build fallback and the archiver.

use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{io_err, PipelineError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

// ---------------------------------------------------------------------------
// Exclusion globs
// ---------------------------------------------------------------------------

/// A set of exclusion globs matched against paths relative to a tree root.
///
/// A path is excluded when it, or any of its ancestor directories, matches one
/// of the globs. `node_modules` therefore excludes the whole directory, and
/// `**/.DS_Store` excludes the file at any depth.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    pub fn new<I, S>(globs: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        for glob in globs {
            let glob = glob.as_ref().trim().trim_end_matches('/');
            if glob.is_empty() {
                continue;
            }
            let pattern = Pattern::new(glob).map_err(|source| PipelineError::Glob {
                glob: glob.to_string(),
                source,
            })?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    /// Add a literal relative path (escaped, so `[` and `*` are not special).
    pub fn with_path(mut self, relative: &Path) -> Self {
        let normalized = to_slash(relative);
        if !normalized.is_empty() {
            if let Ok(pattern) = Pattern::new(&Pattern::escape(&normalized)) {
                self.patterns.push(pattern);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_excluded(&self, relative: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let mut prefix = String::new();
        for component in relative.components() {
            let Component::Normal(part) = component else {
                continue;
            };
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(&part.to_string_lossy());
            if self
                .patterns
                .iter()
                .any(|p| p.matches_with(&prefix, MATCH_OPTIONS))
            {
                return true;
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Tree operations
// ---------------------------------------------------------------------------

/// One entry yielded by [`walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub absolute: PathBuf,
    pub relative: PathBuf,
    pub is_dir: bool,
}

/// Walk `root` in sorted order, pruning excluded paths and anything in `skip`.
///
/// Symlinks to files are reported as files; symlinks to directories are
/// not followed.
pub fn walk(
    root: &Path,
    excludes: &ExcludeSet,
    skip: &[PathBuf],
) -> Result<Vec<TreeEntry>, PipelineError> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let path = e.path();
            if skip.iter().any(|s| path == s || path.starts_with(s)) {
                return false;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            !excludes.is_excluded(relative)
        });

    for entry in walker {
        let entry = entry.map_err(|source| PipelineError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let absolute = entry.path().to_path_buf();
        let relative = absolute
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| absolute.clone());

        let file_type = entry.file_type();
        let is_dir = if file_type.is_symlink() {
            match fs::metadata(&absolute) {
                Ok(meta) if meta.is_file() => false,
                _ => {
                    tracing::debug!(path = %absolute.display(), "skipping symlink");
                    continue;
                }
            }
        } else {
            file_type.is_dir()
        };

        entries.push(TreeEntry {
            absolute,
            relative,
            is_dir,
        });
    }
    Ok(entries)
}

/// Copy `src` into `dest`, skipping excluded paths and `dest` itself.
///
/// Returns the number of files copied.
pub fn copy_tree(src: &Path, dest: &Path, excludes: &ExcludeSet) -> Result<usize, PipelineError> {
    fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
    let skip = vec![dest.to_path_buf()];
    let mut copied = 0;
    for entry in walk(src, excludes, &skip)? {
        let target = dest.join(&entry.relative);
        if entry.is_dir {
            fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            fs::copy(&entry.absolute, &target).map_err(|e| io_err(&entry.absolute, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Relative paths of every file under `root`, sorted.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    Ok(walk(root, &ExcludeSet::default(), &[])?
        .into_iter()
        .filter(|e| !e.is_dir)
        .map(|e| e.relative)
        .collect())
}

/// `true` when `path` is a directory with at least one entry.
pub fn has_entries(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Delete `path` (if present) and recreate it empty.
///
/// Refuses to delete a directory that is, or contains, `guard`.
pub fn reset_dir(path: &Path, guard: &Path) -> Result<(), PipelineError> {
    if guard.starts_with(path) {
        return Err(PipelineError::UnsafeClean {
            path: path.to_path_buf(),
        });
    }
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| io_err(path, e))?;
    }
    fs::create_dir_all(path).map_err(|e| io_err(path, e))
}

/// Remove a file if it exists.
pub fn remove_file_if_exists(path: &Path) -> Result<bool, PipelineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

/// `path` relative to `root`, if it lives inside it.
pub fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    path.strip_prefix(root)
        .ok()
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
}

/// Forward-slash form of a relative path, dropping `.` components.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn excludes(globs: &[&str]) -> ExcludeSet {
        ExcludeSet::new(globs.iter().copied()).expect("globs")
    }

    #[rstest]
    #[case::directory_name("node_modules", "node_modules", true)]
    #[case::directory_descendant("node_modules", "node_modules/grunt/index.js", true)]
    #[case::name_prefix_only("node_modules", "src/node_modules_helper.php", false)]
    #[case::star_at_top("*.zip", "plugin-1.0.0.zip", true)]
    #[case::star_stays_in_segment("*.zip", "assets/fixtures/sample.zip", false)]
    #[case::double_star_top("**/.DS_Store", ".DS_Store", true)]
    #[case::double_star_nested("**/.DS_Store", "assets/img/.DS_Store", true)]
    #[case::any_depth_directory("**/node_modules", "blocks/node_modules/react/index.js", true)]
    #[case::any_depth_directory_at_top("**/node_modules", "node_modules/grunt/index.js", true)]
    #[case::any_depth_extension("**/*.zip", "assets/fixtures/sample.zip", true)]
    #[case::trailing_slash("vendor/", "vendor/autoload.php", true)]
    fn exclusion_matching(#[case] glob: &str, #[case] path: &str, #[case] excluded: bool) {
        let set = excludes(&[glob, "  "]);
        assert_eq!(set.is_excluded(Path::new(path)), excluded);
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = ExcludeSet::new(["a/**b"]).unwrap_err();
        assert!(matches!(err, PipelineError::Glob { .. }));
    }

    #[test]
    fn literal_path_is_escaped() {
        let set = ExcludeSet::default().with_path(Path::new("out[1]"));
        assert!(set.is_excluded(Path::new("out[1]/file")));
        assert!(!set.is_excluded(Path::new("out1/file")));
    }

    #[test]
    fn copy_tree_skips_destination_inside_source() {
        let root = TempDir::new().expect("tempdir");
        fs::write(root.path().join("plugin.php"), "<?php").expect("write");
        fs::create_dir_all(root.path().join("includes")).expect("mkdir");
        fs::write(root.path().join("includes/a.php"), "<?php").expect("write");
        let dest = root.path().join("out");

        let copied = copy_tree(root.path(), &dest, &ExcludeSet::default()).expect("copy");
        assert_eq!(copied, 2);
        assert!(!dest.join("out").exists(), "destination must not copy into itself");

        let copied_again = copy_tree(root.path(), &dest, &ExcludeSet::default()).expect("copy");
        assert_eq!(copied_again, 2);
        assert_eq!(
            list_files(&dest).expect("list"),
            vec![PathBuf::from("includes/a.php"), PathBuf::from("plugin.php")]
        );
    }

    #[test]
    fn reset_dir_refuses_project_ancestor() {
        let root = TempDir::new().expect("tempdir");
        let project = root.path().join("project");
        fs::create_dir_all(&project).expect("mkdir");
        let err = reset_dir(root.path(), &project).unwrap_err();
        assert!(matches!(err, PipelineError::UnsafeClean { .. }));
        assert!(project.exists());
    }

    #[test]
    fn reset_dir_empties_existing_directory() {
        let root = TempDir::new().expect("tempdir");
        let build = root.path().join("build");
        fs::create_dir_all(build.join("stale")).expect("mkdir");
        reset_dir(&build, root.path()).expect("reset");
        assert!(build.is_dir());
        assert!(!has_entries(&build));
    }
}
