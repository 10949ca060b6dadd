//! Error types for archive search and extraction

use thiserror::Error;

/// Errors that can occur while detecting, searching or extracting archives
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// IO error during archive operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid ZIP archive format
    #[error("Invalid ZIP archive: {0}")]
    InvalidZip(#[from] zip::result::ZipError),

    /// The 7Z library rejected the archive or one of its entries
    #[error("Invalid 7Z archive: {0}")]
    SevenZip(String),

    /// Archive is password-protected
    #[error("Archive is password-protected")]
    PasswordProtected,

    /// The caller supplied an unusable combination of arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The MIME type is not an archive type, or no format detector recognized the bytes
    #[error("Unknown archive type (detected MIME type: {mime})")]
    UnknownArchiveType {
        /// MIME type reported by the sniffer
        mime: String,
    },

    /// Archive nesting exceeds depth limit
    #[error("Archive nesting too deep (max depth {max})")]
    TooDeep {
        /// Maximum allowed nesting depth
        max: usize,
    },

    /// File within archive exceeds size limit
    #[error("File '{name}' is too large ({size} bytes, max {max} bytes)")]
    FileTooLarge {
        /// Name of the file that exceeded the limit
        name: String,
        /// Actual file size in bytes
        size: u64,
        /// Maximum allowed file size in bytes
        max: u64,
    },

    /// Unsupported compression method
    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(String),
}

impl ArchiveError {
    /// Classify an error reported by `sevenz_rust`.
    ///
    /// The library only exposes encryption failures through its message text.
    pub(crate) fn from_sevenz(err: &sevenz_rust::Error) -> Self {
        let err_str = err.to_string();
        if err_str.contains("password") || err_str.contains("encrypted") {
            ArchiveError::PasswordProtected
        } else {
            ArchiveError::SevenZip(err_str)
        }
    }
}
