//! Writing archive entries to disk
//!
//! Two flavors: [`write_unique`] drops a single matched entry into a flat
//! output directory without ever overwriting an existing file, and
//! [`extract_archive`] unpacks a whole archive while keeping (or
//! flattening) its directory layout.

use crate::detect::detect_archive_format;
use crate::error::ArchiveError;
use crate::mime::get_mime_type;
use crate::reader::{open_bytes, open_path, ArchiveSource, EntryInfo, Walk};
use filetime::FileTime;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

/// Sanitize a path to prevent path traversal attacks (e.g., ../../../etc/passwd)
///
/// This function removes:
/// - Parent directory references (..)
/// - Current directory references (.)
/// - Absolute path prefixes (/)
/// - Drive letters (C:\)
///
/// Returns None if the path is entirely invalid (e.g., just "..")
#[inline]
fn sanitize_path(path: &str) -> Option<PathBuf> {
    let path = Path::new(path);
    let mut sanitized = PathBuf::new();

    for component in path.components() {
        if let Component::Normal(part) = component {
            sanitized.push(part);
        }
    }

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Last path component of an archive entry name.
///
/// Archive names always use `/`, but archives created on Windows sometimes
/// carry `\` as well.
#[must_use]
pub fn entry_base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// `report.txt` -> `report_{counter}.txt`; the counter goes before the last
/// extension only (`a.tar.gz` -> `a.tar_1.gz`).
fn numbered_name(file_name: &str, counter: usize) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().to_string());
    match path.extension() {
        Some(ext) => format!("{stem}_{counter}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{counter}"),
    }
}

/// Write `bytes` into `directory` under the entry's base name, renaming on
/// collision. Returns the path actually written.
///
/// The directory is created if needed. Files are created with `create_new`,
/// so an existing file is never overwritten even if it appears concurrently.
pub fn write_unique(directory: &Path, entry_name: &str, bytes: &[u8]) -> Result<PathBuf, ArchiveError> {
    fs::create_dir_all(directory)?;

    let base = match entry_base_name(entry_name) {
        "" | "." | ".." => "unnamed",
        base => base,
    };

    let mut candidate = base.to_string();
    let mut counter = 1;
    loop {
        let target = directory.join(&candidate);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(mut file) => {
                io::Write::write_all(&mut file, bytes)?;
                if candidate != base {
                    debug!("Extracted {entry_name} as {candidate} (name already taken)");
                } else {
                    debug!("Extracted {entry_name} to {}", target.display());
                }
                return Ok(target);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                candidate = numbered_name(base, counter);
                counter += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Options for [`extract_archive`]
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Drop the directory hierarchy and write every file directly into the
    /// destination. Later files overwrite earlier ones with the same name.
    pub files_without_directories: bool,
    /// Strip the first path component (`pkg-1.0/bin/tool` -> `bin/tool`)
    pub remove_first_directory: bool,
}

fn relative_target(name: &str, options: &ExtractOptions) -> Option<PathBuf> {
    let relative = if options.files_without_directories {
        entry_base_name(name)
    } else if options.remove_first_directory {
        name.split_once('/').map_or(name, |(_, rest)| rest)
    } else {
        name
    };
    sanitize_path(relative)
}

fn default_destination(source: ArchiveSource<'_>) -> Result<PathBuf, ArchiveError> {
    match source {
        ArchiveSource::Path(path) => {
            let stem = path.file_stem().ok_or_else(|| {
                ArchiveError::InvalidArgument(format!("no file name in {}", path.display()))
            })?;
            Ok(path.with_file_name(stem))
        }
        ArchiveSource::Bytes(_) => Err(ArchiveError::InvalidArgument(
            "an extraction directory is required for in-memory archives".to_string(),
        )),
    }
}

/// Extract every file of a ZIP or 7Z archive to disk
///
/// Modification times recorded in the archive are restored on the
/// extracted files. Entries whose path is unusable after sanitization are
/// skipped with a warning.
///
/// # Arguments
///
/// * `source` - The archive
/// * `destination` - Output directory; defaults to a directory next to the
///   archive named after its file stem
/// * `options` - Layout options
///
/// # Returns
///
/// The directory the files were extracted to
///
/// # Errors
///
/// Returns `ArchiveError` if:
/// - The source is not a ZIP or 7Z archive
/// - Archive is invalid, corrupted or password-protected
/// - An output file cannot be written
///
/// # Examples
///
/// ```no_run
/// use archive_search::{extract_archive, ArchiveSource, ExtractOptions};
/// use std::path::Path;
///
/// let dir = extract_archive(
///     ArchiveSource::Path(Path::new("package.zip")),
///     None,
///     &ExtractOptions { remove_first_directory: true, ..Default::default() },
/// )
/// .unwrap();
/// println!("Extracted to {}", dir.display());
/// ```
pub fn extract_archive(
    source: ArchiveSource<'_>,
    destination: Option<&Path>,
    options: &ExtractOptions,
) -> Result<PathBuf, ArchiveError> {
    let destination = match destination {
        Some(dir) => dir.to_path_buf(),
        None => default_destination(source)?,
    };

    let Some(format) = detect_archive_format(source)? else {
        return Err(ArchiveError::UnknownArchiveType {
            mime: get_mime_type(source)?,
        });
    };

    debug!("Extracting {format} archive to {}", destination.display());
    fs::create_dir_all(&destination)?;

    let mut write_entry = |info: &EntryInfo, data: &mut dyn Read| -> Result<Walk, ArchiveError> {
        if info.is_dir {
            return Ok(Walk::Continue);
        }
        let Some(relative) = relative_target(&info.name, options) else {
            warn!("Skipping invalid path: {} (path traversal attempt or empty)", info.name);
            return Ok(Walk::Continue);
        };

        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("Extracting: {}", info.name);
        let mut out = File::create(&target)?;
        io::copy(data, &mut out)?;
        drop(out);

        if let Some(modified) = info.modified {
            let mtime = FileTime::from_unix_time(modified.and_utc().timestamp(), 0);
            filetime::set_file_mtime(&target, mtime)?;
        }
        Ok(Walk::Continue)
    };

    match source {
        ArchiveSource::Path(path) => open_path(path, format)?.for_each_entry(&mut write_entry)?,
        ArchiveSource::Bytes(bytes) => open_bytes(bytes, format)?.for_each_entry(&mut write_entry)?,
    }

    Ok(destination)
}
