//! Direct ZIP archiver.
//!
//! Every archive nests its content under a single top-level folder named after
//! the plugin slug, so extracting it into `wp-content/plugins/` needs no
//! rename. The archive is written to `<dest>.tmp` and renamed over `<dest>`;
//! a failed run never leaves a half-written archive at the final path.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use plugpack_core::{Artifact, ArtifactKind};

use crate::error::{io_err, zip_err, PipelineError};
use crate::tree::{self, to_slash, ExcludeSet};

/// Result of writing one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub files: usize,
    pub directories: usize,
}

/// Archive `src_dir` into `dest`, nesting entries under `<folder>/`.
///
/// `dest` and its temporary sibling are never archived, even when they live
/// inside `src_dir`.
pub fn build_archive(
    src_dir: &Path,
    dest: &Path,
    folder: &str,
    excludes: &ExcludeSet,
) -> Result<ArchiveSummary, PipelineError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = tmp_path(dest);
    let skip = vec![dest.to_path_buf(), tmp.clone()];
    let entries = tree::walk(src_dir, excludes, &skip)?;

    let result = write_entries(&tmp, folder, &entries);
    let (files, directories) = match result {
        Ok(counts) => counts,
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
    };

    if let Err(e) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(dest, e));
    }

    tracing::info!(archive = %dest.display(), files, "wrote archive");
    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        files,
        directories,
    })
}

fn write_entries(
    tmp: &Path,
    folder: &str,
    entries: &[tree::TreeEntry],
) -> Result<(usize, usize), PipelineError> {
    let file = File::create(tmp).map_err(|e| io_err(tmp, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    zip.add_directory(format!("{folder}/"), dir_options())
        .map_err(|e| zip_err(tmp, e))?;

    let mut files = 0;
    let mut directories = 0;
    for entry in entries {
        let name = format!("{folder}/{}", to_slash(&entry.relative));
        if entry.is_dir {
            zip.add_directory(format!("{name}/"), dir_options())
                .map_err(|e| zip_err(tmp, e))?;
            directories += 1;
            continue;
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file_mode(&entry.absolute));
        zip.start_file(name, options).map_err(|e| zip_err(tmp, e))?;
        let mut reader = File::open(&entry.absolute).map_err(|e| io_err(&entry.absolute, e))?;
        io::copy(&mut reader, &mut zip).map_err(|e| io_err(&entry.absolute, e))?;
        files += 1;
    }

    zip.finish().map_err(|e| zip_err(tmp, e))?;
    Ok((files, directories))
}

/// Entry names of an existing archive, in archive order.
pub fn archive_entries(path: &Path) -> Result<Vec<String>, PipelineError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let archive = ZipArchive::new(BufReader::new(file)).map_err(|e| zip_err(path, e))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// `true` when the archive is non-empty and every entry lives under `<folder>/`.
pub fn entries_nested_under(entries: &[String], folder: &str) -> bool {
    let prefix = format!("{folder}/");
    !entries.is_empty() && entries.iter().all(|e| e.starts_with(&prefix))
}

/// Size and SHA-256 of a finished archive.
pub fn describe_artifact(
    path: &Path,
    kind: ArtifactKind,
    version: &str,
) -> Result<Artifact, PipelineError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let size_bytes = io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(Artifact {
        path: path.to_path_buf(),
        kind,
        version_tag: version.to_string(),
        size_bytes,
        sha256: hex::encode(hasher.finalize()),
    })
}

fn dir_options() -> SimpleFileOptions {
    SimpleFileOptions::default().unix_permissions(0o755)
}

fn tmp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive.zip".to_string());
    dest.with_file_name(format!("{name}.tmp"))
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    match fs::metadata(path) {
        Ok(meta) if meta.permissions().mode() & 0o111 != 0 => 0o755,
        _ => 0o644,
    }
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    0o644
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
