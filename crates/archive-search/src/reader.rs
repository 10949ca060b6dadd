//! Format-agnostic read access to ZIP and 7Z archives
//!
//! [`ArchiveReader`] is opened once per archive level and hides the
//! differences between the `zip` and `sevenz-rust` readers. The search
//! driver only ever sees [`EntryInfo`] values and a `Read` over the
//! entry's uncompressed contents.

use crate::detect::detect_archive_format;
use crate::error::ArchiveError;
use crate::mime::get_mime_type;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader};
use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

/// Seconds between 1601-01-01 (Windows FILETIME epoch) and 1970-01-01
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

/// FILETIME ticks (100 ns) per second
const FILETIME_TICKS_PER_SEC: u64 = 10_000_000;

/// Where archive bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveSource<'a> {
    /// Archive stored on disk
    Path(&'a Path),
    /// Archive already held in memory
    Bytes(&'a [u8]),
}

impl<'a> ArchiveSource<'a> {
    /// Short label used in log messages
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveSource::Path(_) => "path",
            ArchiveSource::Bytes(_) => "bytes",
        }
    }

    /// Read at most `len` bytes from the start of the source.
    ///
    /// For paths only the requested prefix is read from disk.
    pub fn read_prefix(&self, len: usize) -> Result<Cow<'a, [u8]>, ArchiveError> {
        match *self {
            ArchiveSource::Bytes(bytes) => Ok(Cow::Borrowed(&bytes[..bytes.len().min(len)])),
            ArchiveSource::Path(path) => {
                let file = File::open(path)?;
                let mut prefix = Vec::with_capacity(len);
                file.take(len as u64).read_to_end(&mut prefix)?;
                Ok(Cow::Owned(prefix))
            }
        }
    }
}

impl<'a> From<&'a Path> for ArchiveSource<'a> {
    fn from(path: &'a Path) -> Self {
        ArchiveSource::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for ArchiveSource<'a> {
    fn from(path: &'a PathBuf) -> Self {
        ArchiveSource::Path(path.as_path())
    }
}

impl<'a> From<&'a [u8]> for ArchiveSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        ArchiveSource::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for ArchiveSource<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        ArchiveSource::Bytes(bytes.as_slice())
    }
}

/// Container formats understood by the reader
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ArchiveFormat {
    /// PKZIP container
    Zip,
    /// 7-Zip container
    SevenZip,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Zip => f.write_str("zip"),
            ArchiveFormat::SevenZip => f.write_str("7z"),
        }
    }
}

/// Metadata of one archive entry (no contents)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EntryInfo {
    /// Relative path of the entry inside the archive
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Last modification time, when the archive records one
    pub modified: Option<NaiveDateTime>,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

impl EntryInfo {
    fn from_sevenz(entry: &SevenZArchiveEntry) -> Self {
        let modified = if entry.has_last_modified_date {
            filetime_to_chrono(u64::from(entry.last_modified_date()))
        } else {
            None
        };
        EntryInfo {
            name: entry.name().to_string(),
            size: entry.size(),
            modified,
            is_dir: entry.is_directory(),
        }
    }
}

/// Whether an entry walk should go on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Visit the next entry
    Continue,
    /// Stop the walk without visiting further entries
    Stop,
}

fn zip_datetime_to_chrono(value: zip::DateTime) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(
        value.year().into(),
        value.month().into(),
        value.day().into(),
    )?;
    let time = NaiveTime::from_hms_opt(
        value.hour().into(),
        value.minute().into(),
        value.second().into(),
    )?;
    Some(NaiveDateTime::new(date, time))
}

/// Convert a Windows FILETIME tick count to a UTC timestamp
fn filetime_to_chrono(ticks: u64) -> Option<NaiveDateTime> {
    let secs = i64::try_from(ticks / FILETIME_TICKS_PER_SEC).ok()? - FILETIME_UNIX_OFFSET_SECS;
    let nanos = u32::try_from((ticks % FILETIME_TICKS_PER_SEC) * 100).ok()?;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

fn map_zip_error(err: ZipError) -> ArchiveError {
    match err {
        ZipError::UnsupportedArchive(msg) if msg.contains("assword") => {
            ArchiveError::PasswordProtected
        }
        ZipError::InvalidPassword => ArchiveError::PasswordProtected,
        other => ArchiveError::InvalidZip(other),
    }
}

/// An open, read-only archive of either supported format
pub enum ArchiveReader<R: Read + Seek> {
    /// ZIP archive
    Zip(ZipArchive<R>),
    /// 7Z archive
    SevenZip(SevenZReader<R>),
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Open `reader` (of total length `len`) as an archive of the given format
    pub fn new(reader: R, len: u64, format: ArchiveFormat) -> Result<Self, ArchiveError> {
        match format {
            ArchiveFormat::Zip => Ok(ArchiveReader::Zip(
                ZipArchive::new(reader).map_err(map_zip_error)?,
            )),
            ArchiveFormat::SevenZip => {
                // Empty password: encrypted archives error out here
                let sz = SevenZReader::new(reader, len, Password::empty())
                    .map_err(|e| ArchiveError::from_sevenz(&e))?;
                Ok(ArchiveReader::SevenZip(sz))
            }
        }
    }

    /// Format of the underlying container
    #[must_use]
    pub fn format(&self) -> ArchiveFormat {
        match self {
            ArchiveReader::Zip(_) => ArchiveFormat::Zip,
            ArchiveReader::SevenZip(_) => ArchiveFormat::SevenZip,
        }
    }

    /// Visit every entry in archive order.
    ///
    /// `visit` receives the entry metadata and a reader over its uncompressed
    /// contents; the contents are only decoded if `visit` reads them. Errors
    /// returned by `visit` abort the walk and are returned unchanged.
    pub fn for_each_entry<F>(&mut self, mut visit: F) -> Result<(), ArchiveError>
    where
        F: FnMut(&EntryInfo, &mut dyn Read) -> Result<Walk, ArchiveError>,
    {
        match self {
            ArchiveReader::Zip(archive) => {
                for i in 0..archive.len() {
                    let mut zip_file = archive.by_index(i).map_err(map_zip_error)?;

                    if zip_file.encrypted() {
                        return Err(ArchiveError::PasswordProtected);
                    }

                    let info = EntryInfo {
                        name: zip_file.name().to_string(),
                        size: zip_file.size(),
                        modified: zip_file.last_modified().and_then(zip_datetime_to_chrono),
                        is_dir: zip_file.is_dir(),
                    };

                    if visit(&info, &mut zip_file)? == Walk::Stop {
                        break;
                    }
                }
                Ok(())
            }
            ArchiveReader::SevenZip(sz) => {
                // sevenz-rust drives the iteration and only accepts its own
                // error type, so a failure from `visit` is parked here and the
                // walk is aborted with a placeholder.
                let mut failure: Option<ArchiveError> = None;

                let walked = sz.for_each_entries(|entry, reader| {
                    let info = EntryInfo::from_sevenz(entry);
                    match visit(&info, reader) {
                        Ok(Walk::Continue) => Ok(true),
                        Ok(Walk::Stop) => Ok(false),
                        Err(e) => {
                            failure = Some(e);
                            Err(sevenz_rust::Error::other("entry visitor failed"))
                        }
                    }
                });

                if let Some(err) = failure {
                    return Err(err);
                }
                walked.map_err(|e| ArchiveError::from_sevenz(&e))
            }
        }
    }

    /// Collect metadata of every entry, directories included
    pub fn entries(&mut self) -> Result<Vec<EntryInfo>, ArchiveError> {
        match self {
            ArchiveReader::Zip(archive) => {
                let mut infos = Vec::with_capacity(archive.len());
                for i in 0..archive.len() {
                    // Raw access reads the central directory only, so this
                    // also works for encrypted entries.
                    let zip_file = archive.by_index_raw(i)?;
                    infos.push(EntryInfo {
                        name: zip_file.name().to_string(),
                        size: zip_file.size(),
                        modified: zip_file.last_modified().and_then(zip_datetime_to_chrono),
                        is_dir: zip_file.is_dir(),
                    });
                }
                Ok(infos)
            }
            // Entry headers are parsed on open; no folder is decoded here
            ArchiveReader::SevenZip(sz) => {
                Ok(sz.archive().files.iter().map(EntryInfo::from_sevenz).collect())
            }
        }
    }
}

/// Open an archive file on disk
pub fn open_path(
    path: &Path,
    format: ArchiveFormat,
) -> Result<ArchiveReader<BufReader<File>>, ArchiveError> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    debug!("Opening {format} archive from path {}", path.display());
    ArchiveReader::new(BufReader::new(file), len, format)
}

/// Open an archive held in memory
pub fn open_bytes(
    bytes: &[u8],
    format: ArchiveFormat,
) -> Result<ArchiveReader<Cursor<&[u8]>>, ArchiveError> {
    debug!("Opening {format} archive from {} in-memory bytes", bytes.len());
    ArchiveReader::new(Cursor::new(bytes), bytes.len() as u64, format)
}

/// List the entries of a ZIP or 7Z archive without extracting contents
///
/// # Errors
///
/// Returns [`ArchiveError::UnknownArchiveType`] if the source is neither a
/// ZIP nor a 7Z archive, or the underlying error if the archive is corrupt.
///
/// # Examples
///
/// ```no_run
/// use archive_search::{list_archive_entries, ArchiveSource};
/// use std::path::Path;
///
/// let entries = list_archive_entries(ArchiveSource::Path(Path::new("archive.7z"))).unwrap();
/// for entry in entries {
///     println!("{} - {} bytes", entry.name, entry.size);
/// }
/// ```
#[must_use = "this function returns archive file listing that should be processed"]
pub fn list_archive_entries(source: ArchiveSource<'_>) -> Result<Vec<EntryInfo>, ArchiveError> {
    let Some(format) = detect_archive_format(source)? else {
        return Err(ArchiveError::UnknownArchiveType {
            mime: get_mime_type(source)?,
        });
    };

    match source {
        ArchiveSource::Path(path) => open_path(path, format)?.entries(),
        ArchiveSource::Bytes(bytes) => open_bytes(bytes, format)?.entries(),
    }
}
