//! Packing a directory tree into a ZIP archive

use crate::error::ArchiveError;
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// Compression used for every file written by [`archive_directory`]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression
    Store,
    /// Standard ZIP compression
    #[default]
    Deflate,
    /// Better ratio than Deflate, slower, not understood by every ZIP tool
    Bzip2,
}

impl Compression {
    /// Parse a method name (`store`, `deflate`, `bzip2`)
    pub fn from_name(name: &str) -> Result<Self, ArchiveError> {
        match name.to_ascii_lowercase().as_str() {
            "store" => Ok(Compression::Store),
            "deflate" => Ok(Compression::Deflate),
            "bzip2" => Ok(Compression::Bzip2),
            other => Err(ArchiveError::UnsupportedCompression(other.to_string())),
        }
    }

    fn method(self) -> CompressionMethod {
        match self {
            Compression::Store => CompressionMethod::Stored,
            Compression::Deflate => CompressionMethod::Deflated,
            Compression::Bzip2 => CompressionMethod::Bzip2,
        }
    }
}

/// Options for [`archive_directory`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ArchiveDirectoryOptions {
    /// Compression method
    pub compression: Compression,
    /// Prefix entry names with the directory's own name, as most archivers do
    pub include_root_directory: bool,
    /// Delete the directory once the archive is written
    pub remove_original: bool,
}

impl Default for ArchiveDirectoryOptions {
    fn default() -> Self {
        ArchiveDirectoryOptions {
            compression: Compression::default(),
            include_root_directory: true,
            remove_original: false,
        }
    }
}

/// Entry name of `path` relative to `base`, always with `/` separators
fn entry_name(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Archive every file under `directory` into `<directory>.zip`, written next
/// to the directory. The returned path is canonical.
///
/// # Returns
///
/// Path of the written archive
///
/// # Errors
///
/// Returns `ArchiveError` if the directory cannot be walked or the archive
/// cannot be written.
pub fn archive_directory(
    directory: &Path,
    options: &ArchiveDirectoryOptions,
) -> Result<PathBuf, ArchiveError> {
    if !directory.is_dir() {
        return Err(ArchiveError::InvalidArgument(format!(
            "{} is not a directory",
            directory.display()
        )));
    }

    // `project/`, `.` and symlinks all resolve to a named directory
    let directory = fs::canonicalize(directory)?;
    let (Some(parent), Some(dir_name)) = (directory.parent(), directory.file_name()) else {
        return Err(ArchiveError::InvalidArgument(format!(
            "cannot archive {}",
            directory.display()
        )));
    };
    let archive_path = parent.join(format!("{}.zip", dir_name.to_string_lossy()));

    // Entry names are relative to the parent when the root is included
    let base = if options.include_root_directory {
        parent
    } else {
        directory.as_path()
    };

    let file_options = SimpleFileOptions::default().compression_method(options.compression.method());
    let mut zip = ZipWriter::new(BufWriter::new(File::create(&archive_path)?));

    for entry in WalkDir::new(&directory).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry_name(entry.path(), base) else {
            continue;
        };
        debug!("Archiving {name}");
        zip.start_file(name, file_options)?;
        io::copy(&mut File::open(entry.path())?, &mut zip)?;
    }
    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;

    if options.remove_original {
        fs::remove_dir_all(&directory)?;
    }

    Ok(archive_path)
}
