//! MIME pre-check for top-level archive sources
//!
//! Self-extracting executables and archives with unusual headers are
//! sniffed as something other than `application/zip`, so the allow-list
//! also admits executables and unknown binary content. The actual format
//! decision is made afterwards by [`crate::detect`].

use crate::error::ArchiveError;
use crate::reader::ArchiveSource;

/// MIME type reported for content the sniffer does not recognize
pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME types accepted as possible archives
pub const SUPPORTED_ARCHIVE_MIME_TYPES: [&str; 5] = [
    "application/zip",
    "application/x-7z-compressed",
    "application/x-dosexec",
    OCTET_STREAM,
    "application/vnd.microsoft.portable-executable",
];

/// Whether `mime` is in [`SUPPORTED_ARCHIVE_MIME_TYPES`]
#[inline]
#[must_use]
pub fn is_supported_mime(mime: &str) -> bool {
    SUPPORTED_ARCHIVE_MIME_TYPES.contains(&mime)
}

/// Content-based MIME type detection
pub trait MimeSniffer {
    /// Return the MIME type of the source's content
    fn sniff(&self, source: ArchiveSource<'_>) -> Result<String, ArchiveError>;
}

/// Magic-byte sniffer backed by the `infer` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct InferSniffer;

impl MimeSniffer for InferSniffer {
    fn sniff(&self, source: ArchiveSource<'_>) -> Result<String, ArchiveError> {
        let detected = match source {
            ArchiveSource::Path(path) => infer::get_from_path(path)?,
            ArchiveSource::Bytes(bytes) => infer::get(bytes),
        };
        Ok(detected.map_or(OCTET_STREAM, |t| t.mime_type()).to_string())
    }
}

/// Sniff `source` with [`InferSniffer`]
pub fn get_mime_type(source: ArchiveSource<'_>) -> Result<String, ArchiveError> {
    InferSniffer.sniff(source)
}
