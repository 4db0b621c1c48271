//! In-place extraction of downloaded ZIP archives.
//!
//! An archive at `/roms/SNES/Game.zip` is unpacked into `/roms/SNES/` and
//! removed afterwards. Entries whose normalized path would escape the target
//! directory are skipped.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// File extension (without the dot) that triggers extraction after download.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Errors that can occur while extracting an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file is missing or is not a readable ZIP archive.
    #[error("cannot open archive {path}: {source}")]
    Open {
        /// Archive path.
        path: PathBuf,
        /// The underlying ZIP error.
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry could not be read from the archive.
    #[error("cannot read entry {entry} in {archive}: {source}")]
    Entry {
        /// Archive path.
        archive: PathBuf,
        /// Name of the entry as stored in the archive.
        entry: String,
        /// The underlying ZIP error.
        #[source]
        source: zip::result::ZipError,
    },

    /// Creating a directory or writing an extracted file failed.
    #[error("IO error extracting to {path}: {source}")]
    Io {
        /// The file system path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Every entry was extracted but the archive itself could not be removed.
    #[error("extracted {archive} into {extracted_into} but could not remove the archive: {source}")]
    Cleanup {
        /// Archive path that is still on disk.
        archive: PathBuf,
        /// Directory the contents were written to.
        extracted_into: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the extraction directory when the contents did land on disk.
    ///
    /// Only [`ExtractError::Cleanup`] carries one.
    #[must_use]
    pub fn extracted_into(&self) -> Option<&Path> {
        match self {
            Self::Cleanup { extracted_into, .. } => Some(extracted_into),
            _ => None,
        }
    }

    /// Whether repeating the download could plausibly fix this error.
    ///
    /// A failed cleanup leaves correct output behind, so it is reported but
    /// never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cleanup { .. })
    }
}

/// Returns true when `path` has the archive extension (case-insensitive).
#[must_use]
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Extracts `archive_path` into its containing directory, then deletes it.
///
/// Returns the directory the contents were written into.
///
/// # Errors
///
/// - [`ExtractError::Open`] if the file is not a valid archive
/// - [`ExtractError::Entry`] / [`ExtractError::Io`] on the first entry that
///   fails; entries written before it stay on disk and the archive is kept
/// - [`ExtractError::Cleanup`] if extraction succeeded but the archive could
///   not be removed
pub fn extract_in_place(archive_path: &Path) -> Result<PathBuf, ExtractError> {
    let dest_dir = archive_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    debug!(archive = %archive_path.display(), dest = %dest_dir.display(), "extracting archive");

    let file = File::open(archive_path).map_err(|e| ExtractError::Open {
        path: archive_path.to_path_buf(),
        source: zip::result::ZipError::Io(e),
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| ExtractError::Open {
        path: archive_path.to_path_buf(),
        source: e,
    })?;

    let mut extracted = 0usize;
    let mut skipped = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| ExtractError::Entry {
            archive: archive_path.to_path_buf(),
            entry: format!("#{index}"),
            source: e,
        })?;

        let Some(relative) = normalized_entry_path(entry.name()) else {
            warn!(entry = %entry.name(), "skipping archive entry outside target directory");
            skipped += 1;
            continue;
        };
        let out_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| ExtractError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
        }

        let mut out_file = File::create(&out_path).map_err(|e| ExtractError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| ExtractError::io(&out_path, e))?;
        apply_mode(&out_file, entry.unix_mode()).map_err(|e| ExtractError::io(&out_path, e))?;
        extracted += 1;
    }

    info!(
        archive = %archive_path.display(),
        dest = %dest_dir.display(),
        extracted,
        skipped,
        "archive extracted"
    );

    // Release the handle before removal (required on Windows).
    drop(archive);

    fs::remove_file(archive_path).map_err(|e| ExtractError::Cleanup {
        archive: archive_path.to_path_buf(),
        extracted_into: dest_dir.clone(),
        source: e,
    })?;

    Ok(dest_dir)
}

/// Lexically normalizes an entry name into a relative path.
///
/// Returns `None` if the name is empty after normalization or climbs above
/// its starting directory. Root and drive prefixes are dropped so absolute
/// names land inside the target directory.
fn normalized_entry_path(name: &str) -> Option<PathBuf> {
    let unified = name.replace('\\', "/");
    let mut normalized = PathBuf::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    (!normalized.as_os_str().is_empty()).then_some(normalized)
}

#[cfg(unix)]
fn apply_mode(file: &File, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(mode) if mode & 0o777 != 0 => {
            file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
        }
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_mode(_file: &File, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}
